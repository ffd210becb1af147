use std::any::Any;
use std::rc::Rc;

use crate::char_matcher::{whitespace_matcher, CharMatcher};
use crate::context::{Context, ParseResult};
use crate::error::GrammarError;
use crate::parser::{Parser, ParserRef};
use crate::value::Value;

/// Consumes one element if available, else fails (`spec.md` §4.2).
pub struct AnyParser {
    pub message: String,
}

impl Parser for AnyParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        match ctx.peek() {
            Some(c) => ctx.success(Value::Char(c), Some(ctx.position() + 1)),
            None => ctx.failure(self.message.clone(), None),
        }
    }

    fn copy(&self) -> ParserRef {
        Rc::new(AnyParser {
            message: self.message.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<AnyParser>()
            .map(|o| o.message == self.message)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "any".to_string()
    }
}

/// Consumes nothing, always succeeds with a fixed result value.
pub struct EpsilonParser {
    pub result: Value,
}

impl Parser for EpsilonParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        ctx.success(self.result.clone(), Some(ctx.position()))
    }

    fn copy(&self) -> ParserRef {
        Rc::new(EpsilonParser {
            result: self.result.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<EpsilonParser>().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "epsilon".to_string()
    }
}

/// Always fails with a fixed message. Used as a placeholder for
/// uninitialized productions (see [`crate::setable::Setable`]).
pub struct FailureParser {
    pub message: String,
}

impl Parser for FailureParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        ctx.failure(self.message.clone(), None)
    }

    fn copy(&self) -> ParserRef {
        Rc::new(FailureParser {
            message: self.message.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<FailureParser>()
            .map(|o| o.message == self.message)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "failure".to_string()
    }
}

/// Reads `length` characters and succeeds with them if `pred` accepts the
/// slice. Backs `string()`/`string_ignore_case()`.
pub struct PredicateParser {
    pub length: usize,
    pub pred: Rc<dyn Fn(&[char]) -> bool>,
    pub message: String,
}

impl Parser for PredicateParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let pos = ctx.position();
        if pos + self.length > ctx.len() {
            return ctx.failure(self.message.clone(), None);
        }
        let slice = &ctx.buffer()[pos..pos + self.length];
        if (self.pred)(slice) {
            ctx.success(Value::string(slice.iter().collect::<String>()), Some(pos + self.length))
        } else {
            ctx.failure(self.message.clone(), None)
        }
    }

    fn copy(&self) -> ParserRef {
        Rc::new(PredicateParser {
            length: self.length,
            pred: self.pred.clone(),
            message: self.message.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<PredicateParser>()
            .map(|o| o.length == self.length && Rc::ptr_eq(&o.pred, &self.pred))
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "predicate".to_string()
    }
}

/// A leaf recognizer over a [`CharMatcher`] (`spec.md` §4.2): `char`,
/// `range`, `digit`, `letter`, `whitespace`, etc. are all instances of this
/// one node type, distinguished only by which matcher they hold.
pub struct CharacterParser {
    pub matcher: CharMatcher,
    pub message: String,
}

impl Parser for CharacterParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        match ctx.peek() {
            Some(c) if self.matcher.matches(c) => {
                ctx.success(Value::Char(c), Some(ctx.position() + 1))
            }
            _ => ctx.failure(self.message.clone(), None),
        }
    }

    fn copy(&self) -> ParserRef {
        Rc::new(CharacterParser {
            matcher: self.matcher.clone(),
            message: self.message.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<CharacterParser>()
            .map(|o| o.matcher == self.matcher && o.message == self.message)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "char".to_string()
    }
}

pub fn any_char(msg: impl Into<String>) -> ParserRef {
    Rc::new(AnyParser {
        message: msg.into(),
    })
}

pub fn epsilon(result: Value) -> ParserRef {
    Rc::new(EpsilonParser { result })
}

pub fn failure_parser(msg: impl Into<String>) -> ParserRef {
    Rc::new(FailureParser {
        message: msg.into(),
    })
}

pub fn predicate(
    length: usize,
    pred: impl Fn(&[char]) -> bool + 'static,
    msg: impl Into<String>,
) -> ParserRef {
    Rc::new(PredicateParser {
        length,
        pred: Rc::new(pred),
        message: msg.into(),
    })
}

pub fn char_parser(c: char) -> ParserRef {
    Rc::new(CharacterParser {
        matcher: CharMatcher::Single(c),
        message: format!("{c:?} expected"),
    })
}

pub fn range(lo: char, hi: char) -> Result<ParserRef, GrammarError> {
    if lo > hi {
        return Err(GrammarError::Argument(format!(
            "inverted range: {lo:?}..{hi:?}"
        )));
    }
    Ok(Rc::new(CharacterParser {
        matcher: CharMatcher::Range(lo, hi),
        message: format!("{lo:?}..{hi:?} expected"),
    }))
}

pub fn digit() -> ParserRef {
    Rc::new(CharacterParser {
        matcher: CharMatcher::Range('0', '9'),
        message: "digit expected".to_string(),
    })
}

pub fn letter() -> ParserRef {
    Rc::new(CharacterParser {
        matcher: CharMatcher::Alt(vec![
            CharMatcher::Range('a', 'z'),
            CharMatcher::Range('A', 'Z'),
        ]),
        message: "letter expected".to_string(),
    })
}

pub fn lowercase() -> ParserRef {
    Rc::new(CharacterParser {
        matcher: CharMatcher::Range('a', 'z'),
        message: "lowercase letter expected".to_string(),
    })
}

pub fn uppercase() -> ParserRef {
    Rc::new(CharacterParser {
        matcher: CharMatcher::Range('A', 'Z'),
        message: "uppercase letter expected".to_string(),
    })
}

pub fn whitespace() -> ParserRef {
    Rc::new(CharacterParser {
        matcher: whitespace_matcher(),
        message: "whitespace expected".to_string(),
    })
}

pub fn word() -> ParserRef {
    Rc::new(CharacterParser {
        matcher: CharMatcher::Alt(vec![
            CharMatcher::Range('a', 'z'),
            CharMatcher::Range('A', 'Z'),
            CharMatcher::Range('0', '9'),
            CharMatcher::Single('_'),
        ]),
        message: "word character expected".to_string(),
    })
}

pub fn any_in(elements: &[char]) -> ParserRef {
    let mut sorted = elements.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    Rc::new(CharacterParser {
        matcher: CharMatcher::Set(sorted),
        message: "character in set expected".to_string(),
    })
}

pub fn string(s: &str) -> ParserRef {
    let target: Vec<char> = s.chars().collect();
    let len = target.len();
    let message = format!("{s:?} expected");
    predicate(len, move |slice| slice == target.as_slice(), message)
}

pub fn string_ignore_case(s: &str) -> ParserRef {
    let target: Vec<char> = s.chars().flat_map(char::to_lowercase).collect();
    let len = s.chars().count();
    let message = format!("{s:?} expected (case-insensitive)");
    predicate(
        len,
        move |slice| {
            let lowered: Vec<char> = slice.iter().flat_map(|c| c.to_lowercase()).collect();
            lowered == target
        },
        message,
    )
}

#[cfg(test)]
mod tests {
    use crate::parser::ParserExt;

    use super::*;

    #[test]
    fn any_consumes_one_char() {
        let result = any_char("any expected").parse("x");
        assert!(result.is_success());
        assert_eq!(result.position(), 1);
    }

    #[test]
    fn any_fails_on_empty() {
        let result = any_char("any expected").parse("");
        assert!(result.is_failure());
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        assert!(range('z', 'a').is_err());
        assert!(range('a', 'z').is_ok());
    }

    #[test]
    fn string_ignore_case_matches_mixed_case() {
        let p = string_ignore_case("Hello");
        assert!(p.accept("HELLO"));
        assert!(p.accept("hello"));
        assert!(!p.accept("helo"));
    }
}
