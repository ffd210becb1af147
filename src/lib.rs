#![doc = include_str!("../README.md")]

//! A parser-combinator toolkit whose grammars are first-class, inspectable,
//! and rewritable values: parsers are built by composing small primitive
//! recognizers with algebraic combinators into a graph that can be
//! traversed, transformed, and rewired after construction, including to
//! tie recursive knots and to attach semantic actions post-hoc.

/// The reflectable parser graph node trait, the `ParserRef` handle type,
/// structural equality, and the fluent combinator surface.
pub mod parser;

/// Concrete combinator nodes: sequence, choice, lookahead, map, trim,
/// flatten, token, separated-by.
pub mod combinator;

/// Leaf recognizers: `any`, `epsilon`, `failure`, `predicate`, `string`,
/// and the character-class family built on [`char_matcher`].
pub mod primitive;

/// The `CharMatcher` sum type and the `whitespace` code-point set.
pub mod char_matcher;

/// The bracket-expression pattern compiler, self-bootstrapped from the
/// library's own combinators.
pub mod pattern;

/// Possessive, greedy, and lazy repetition.
pub mod repeat;

/// The mutable single-slot indirection node used to tie recursive knots.
pub mod setable;

/// The named, mutually-recursive composite grammar builder.
pub mod composite;

/// Reachable-parser enumeration, pure transform, setable removal,
/// deduplication, and the debug/progress/profile continuation wrappers.
pub mod reflect;

/// The untyped `(buffer, position)` parse context and its `Success`/
/// `Failure`/`ParseResult` outcomes.
pub mod context;

/// The closed value type every parser produces.
pub mod value;

/// The source-span wrapper produced by `.token()`.
pub mod token;

/// Error types raised during grammar construction and parse failure.
pub mod error;

pub use crate::context::{Context, Failure, ParseResult, Success};
pub use crate::error::{GrammarError, ParserError};
pub use crate::parser::{structural_eq, Parser, ParserExt, ParserRef, UNBOUNDED};
pub use crate::setable::Setable;
pub use crate::token::Token;
pub use crate::value::Value;

/// Commonly used functions, traits, and types.
pub mod prelude {
    pub use crate::char_matcher::CharMatcher;
    pub use crate::composite::{build_composite, build_composite_with_override, CompositeBuilder};
    pub use crate::context::{Context, ParseResult};
    pub use crate::error::{GrammarError, ParserError};
    pub use crate::parser::{structural_eq, Parser, ParserExt, ParserRef, UNBOUNDED};
    pub use crate::pattern::pattern;
    pub use crate::primitive::{
        any_char as any, any_in, char_parser as char, digit, epsilon, failure_parser as failure,
        letter, lowercase, predicate, range, string, string_ignore_case, uppercase, whitespace,
        word,
    };
    pub use crate::reflect::{
        all_parsers, debug, profile, progress, remove_duplicates, remove_setables, transform,
    };
    pub use crate::setable::Setable;
    pub use crate::token::Token;
    pub use crate::value::Value;

    /// An unset production placeholder, ready for `Setable::set`.
    pub fn undefined_(message: impl Into<String>) -> std::rc::Rc<Setable> {
        Setable::undefined(message)
    }
}
