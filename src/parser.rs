use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::combinator::{
    AndParser, ChoiceParser, EndParser, FlattenParser, MapParser, NotParser, OptionalParser,
    SeparatedByParser, SequenceParser, TokenParser, TrimParser,
};
use crate::context::{Context, ParseResult};
use crate::primitive::any_char;
use crate::repeat::{GreedyRepeat, LazyRepeat, PossessiveRepeat};
use crate::setable::Setable;
use crate::value::Value;

/// A node in the parser graph (`spec.md` §3).
///
/// Every concrete combinator implements this trait. The four graph-protocol
/// methods (`children`, `replace`, `copy`, `match_scalar`) back the
/// reflection/transform subsystem in [`crate::reflect`]; `parse_on` is the
/// actual semantic action.
pub trait Parser: Any {
    /// Run this parser against `ctx`, producing a `Success` or `Failure`.
    fn parse_on(&self, ctx: &Context) -> ParseResult;

    /// Direct children, in declared order. May contain duplicates.
    fn children(&self) -> Vec<ParserRef> {
        Vec::new()
    }

    /// Replace a child reference (identity-compared) in place. Leaves no-op.
    fn replace(&self, _source: &ParserRef, _target: &ParserRef) {}

    /// A shallow clone: same configuration, children shared by reference.
    fn copy(&self) -> ParserRef;

    /// Scalar (non-child) equality against another node already known to be
    /// the same concrete kind. Implementations downcast `other` to `Self`.
    fn match_scalar(&self, other: &dyn Any) -> bool;

    /// Enables downcasting a `&dyn Parser` back to its concrete type.
    fn as_any(&self) -> &dyn Any;

    /// A short label used by the debug/progress/profile reflection wrappers.
    fn label(&self) -> String {
        "parser".to_string()
    }
}

/// A shared, type-erased handle to a parser graph node.
pub type ParserRef = Rc<dyn Parser>;

/// Structural equality with cycle termination, per `spec.md` §3/§4.5.
///
/// Two nodes are equal if they are the same concrete kind, have equal scalar
/// configuration (via [`Parser::match_scalar`]), and have pairwise
/// structurally-equal children. A pair of nodes already under comparison is
/// treated as equal, so cyclic graphs built with `Setable` terminate.
pub fn structural_eq(a: &ParserRef, b: &ParserRef, seen: &mut HashSet<(usize, usize)>) -> bool {
    let key = (Rc::as_ptr(a) as *const () as usize, Rc::as_ptr(b) as *const () as usize);
    if Rc::ptr_eq(a, b) {
        return true;
    }
    if !seen.insert(key) {
        return true;
    }
    if !a.match_scalar(b.as_any()) {
        return false;
    }
    let a_children = a.children();
    let b_children = b.children();
    if a_children.len() != b_children.len() {
        return false;
    }
    a_children
        .iter()
        .zip(b_children.iter())
        .all(|(ac, bc)| structural_eq(ac, bc, seen))
}

/// The fluent combinator surface from `spec.md` §4.1, implemented once for
/// any parser graph handle.
pub trait ParserExt {
    fn seq(&self, other: ParserRef) -> ParserRef;
    fn or(&self, other: ParserRef) -> ParserRef;
    fn optional(&self, otherwise: Value) -> ParserRef;
    fn and(&self) -> ParserRef;
    fn not(&self, msg: impl Into<String>) -> ParserRef;
    fn neg(&self, msg: impl Into<String>) -> ParserRef;
    fn end(&self, msg: impl Into<String>) -> ParserRef;
    fn flatten(&self) -> ParserRef;
    fn token(&self) -> ParserRef;
    fn trim(&self, trimmer: ParserRef) -> ParserRef;
    fn map(&self, f: impl Fn(Value) -> Value + 'static) -> ParserRef;
    fn pick(&self, index: isize) -> ParserRef;
    fn permute(&self, indices: Vec<isize>) -> ParserRef;

    fn repeat(&self, min: usize, max: usize) -> ParserRef;
    fn star(&self) -> ParserRef;
    fn plus(&self) -> ParserRef;
    fn times(&self, n: usize) -> ParserRef;

    fn repeat_greedy(&self, limit: ParserRef, min: usize, max: usize) -> ParserRef;
    fn star_greedy(&self, limit: ParserRef) -> ParserRef;
    fn plus_greedy(&self, limit: ParserRef) -> ParserRef;

    fn repeat_lazy(&self, limit: ParserRef, min: usize, max: usize) -> ParserRef;
    fn star_lazy(&self, limit: ParserRef) -> ParserRef;
    fn plus_lazy(&self, limit: ParserRef) -> ParserRef;

    fn separated_by(
        &self,
        sep: ParserRef,
        include_separators: bool,
        optional_sep_at_end: bool,
    ) -> ParserRef;

    fn setable(&self) -> Rc<Setable>;

    fn parse(&self, input: &str) -> ParseResult;
    fn accept(&self, input: &str) -> bool;
    fn matches(&self, input: &str) -> Vec<Value>;
    fn matches_skipping(&self, input: &str) -> Vec<Value>;
}

/// Unbounded repetition sentinel. `spec.md` §4.1 notes the historical
/// `65536` literal is a historical artifact; this crate treats `max` as
/// effectively unbounded by using the largest representable count.
pub const UNBOUNDED: usize = usize::MAX;

impl ParserExt for ParserRef {
    fn seq(&self, other: ParserRef) -> ParserRef {
        let mut parts = Vec::new();
        if let Some(seq) = self.as_any().downcast_ref::<SequenceParser>() {
            parts.extend(seq.parts.borrow().iter().cloned());
        } else {
            parts.push(self.clone());
        }
        parts.push(other);
        Rc::new(SequenceParser::new(parts))
    }

    fn or(&self, other: ParserRef) -> ParserRef {
        let mut alts = Vec::new();
        if let Some(choice) = self.as_any().downcast_ref::<ChoiceParser>() {
            alts.extend(choice.alts.borrow().iter().cloned());
        } else {
            alts.push(self.clone());
        }
        alts.push(other);
        Rc::new(ChoiceParser::new(alts))
    }

    fn optional(&self, otherwise: Value) -> ParserRef {
        Rc::new(OptionalParser {
            delegate: RefCell::new(self.clone()),
            otherwise,
        })
    }

    fn and(&self) -> ParserRef {
        Rc::new(AndParser {
            delegate: RefCell::new(self.clone()),
        })
    }

    fn not(&self, msg: impl Into<String>) -> ParserRef {
        Rc::new(NotParser {
            delegate: RefCell::new(self.clone()),
            message: msg.into(),
        })
    }

    fn neg(&self, msg: impl Into<String>) -> ParserRef {
        self.not(msg).seq(any_char("input expected")).pick(1)
    }

    fn end(&self, msg: impl Into<String>) -> ParserRef {
        Rc::new(EndParser {
            delegate: RefCell::new(self.clone()),
            message: msg.into(),
        })
    }

    fn flatten(&self) -> ParserRef {
        Rc::new(FlattenParser {
            delegate: RefCell::new(self.clone()),
        })
    }

    fn token(&self) -> ParserRef {
        Rc::new(TokenParser {
            delegate: RefCell::new(self.clone()),
        })
    }

    fn trim(&self, trimmer: ParserRef) -> ParserRef {
        Rc::new(TrimParser {
            delegate: RefCell::new(self.clone()),
            trimmer: RefCell::new(trimmer),
        })
    }

    fn map(&self, f: impl Fn(Value) -> Value + 'static) -> ParserRef {
        Rc::new(MapParser {
            delegate: RefCell::new(self.clone()),
            action: Rc::new(f),
        })
    }

    fn pick(&self, index: isize) -> ParserRef {
        self.map(move |v| pick_index(v, index))
    }

    fn permute(&self, indices: Vec<isize>) -> ParserRef {
        self.map(move |v| {
            let items = v.as_list().map(|s| s.to_vec()).unwrap_or_default();
            let len = items.len() as isize;
            Value::List(
                indices
                    .iter()
                    .map(|&i| {
                        let idx = if i < 0 { len + i } else { i };
                        items
                            .get(idx.max(0) as usize)
                            .cloned()
                            .unwrap_or(Value::Unit)
                    })
                    .collect(),
            )
        })
    }

    fn repeat(&self, min: usize, max: usize) -> ParserRef {
        Rc::new(PossessiveRepeat {
            delegate: RefCell::new(self.clone()),
            min,
            max,
        })
    }

    fn star(&self) -> ParserRef {
        self.repeat(0, UNBOUNDED)
    }

    fn plus(&self) -> ParserRef {
        self.repeat(1, UNBOUNDED)
    }

    fn times(&self, n: usize) -> ParserRef {
        self.repeat(n, n)
    }

    fn repeat_greedy(&self, limit: ParserRef, min: usize, max: usize) -> ParserRef {
        Rc::new(GreedyRepeat {
            delegate: RefCell::new(self.clone()),
            limit: RefCell::new(limit),
            min,
            max,
        })
    }

    fn star_greedy(&self, limit: ParserRef) -> ParserRef {
        self.repeat_greedy(limit, 0, UNBOUNDED)
    }

    fn plus_greedy(&self, limit: ParserRef) -> ParserRef {
        self.repeat_greedy(limit, 1, UNBOUNDED)
    }

    fn repeat_lazy(&self, limit: ParserRef, min: usize, max: usize) -> ParserRef {
        Rc::new(LazyRepeat {
            delegate: RefCell::new(self.clone()),
            limit: RefCell::new(limit),
            min,
            max,
        })
    }

    fn star_lazy(&self, limit: ParserRef) -> ParserRef {
        self.repeat_lazy(limit, 0, UNBOUNDED)
    }

    fn plus_lazy(&self, limit: ParserRef) -> ParserRef {
        self.repeat_lazy(limit, 1, UNBOUNDED)
    }

    fn separated_by(
        &self,
        sep: ParserRef,
        include_separators: bool,
        optional_sep_at_end: bool,
    ) -> ParserRef {
        Rc::new(SeparatedByParser {
            item: RefCell::new(self.clone()),
            sep: RefCell::new(sep),
            include_separators,
            optional_sep_at_end,
        })
    }

    fn setable(&self) -> Rc<Setable> {
        Setable::new(self.clone())
    }

    fn parse(&self, input: &str) -> ParseResult {
        self.parse_on(&Context::from_str(input))
    }

    fn accept(&self, input: &str) -> bool {
        self.parse(input).is_success()
    }

    fn matches(&self, input: &str) -> Vec<Value> {
        let found: Rc<std::cell::RefCell<Vec<Value>>> = Rc::new(std::cell::RefCell::new(Vec::new()));
        let push_found = found.clone();
        // and().map(push).seq(any()).or(any()).star(): at every position, try a
        // zero-width lookahead match of `self`, record it, then always advance
        // one character. Overlapping matches are all recorded.
        let recorder = self
            .and()
            .map(move |v| {
                push_found.borrow_mut().push(v.clone());
                v
            })
            .seq(any_char("any input"));
        let scanner = recorder.or(any_char("any input")).star();
        let _ = scanner.parse(input);
        found.borrow().clone()
    }

    fn matches_skipping(&self, input: &str) -> Vec<Value> {
        let found: Rc<std::cell::RefCell<Vec<Value>>> = Rc::new(std::cell::RefCell::new(Vec::new()));
        let push_found = found.clone();
        // map(push).or(any()).star(): a real (consuming) match of `self` is
        // recorded and consumed in full, so matches never overlap.
        let recorder = self.clone().map(move |v| {
            push_found.borrow_mut().push(v.clone());
            v
        });
        let scanner = recorder.or(any_char("any input")).star();
        let _ = scanner.parse(input);
        found.borrow().clone()
    }
}

fn pick_index(v: Value, index: isize) -> Value {
    let items = v.into_list().unwrap_or_default();
    let len = items.len() as isize;
    let idx = if index < 0 { len + index } else { index };
    items.into_iter().nth(idx.max(0) as usize).unwrap_or(Value::Unit)
}
