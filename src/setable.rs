use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, ParseResult};
use crate::parser::{Parser, ParserRef};
use crate::primitive::failure_parser;

/// An indirection node: delegates to whatever it currently points at.
///
/// `Setable` is how this crate expresses forward references and cycles in
/// an otherwise-immutable `Rc` graph (`spec.md` §4.4). A grammar production
/// that refers to itself or to a rule declared later starts out pointing at
/// a stub [`crate::primitive::FailureParser`] and is redirected in place
/// once the real rule is known, via [`Setable::set`].
pub struct Setable {
    target: RefCell<ParserRef>,
}

impl Setable {
    pub fn new(target: ParserRef) -> Rc<Self> {
        Rc::new(Setable {
            target: RefCell::new(target),
        })
    }

    /// An undefined placeholder: fails with `message` until [`Setable::set`]
    /// points it somewhere real.
    pub fn undefined(message: impl Into<String>) -> Rc<Self> {
        Setable::new(failure_parser(message))
    }

    /// Redirects this node to `target` in place.
    pub fn set(&self, target: ParserRef) {
        *self.target.borrow_mut() = target;
    }

    pub fn delegate(&self) -> ParserRef {
        self.target.borrow().clone()
    }

    /// True while this is still pointing at an unset placeholder.
    pub fn is_undefined(&self) -> bool {
        self.target
            .borrow()
            .as_any()
            .downcast_ref::<crate::primitive::FailureParser>()
            .is_some()
    }
}

impl Parser for Setable {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        self.target.borrow().parse_on(ctx)
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.target.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        let matches = Rc::ptr_eq(&*self.target.borrow(), source);
        if matches {
            *self.target.borrow_mut() = target.clone();
        }
    }

    fn copy(&self) -> ParserRef {
        Rc::new(Setable {
            target: RefCell::new(self.target.borrow().clone()),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<Setable>().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "setable".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserExt;
    use crate::primitive::char_parser;

    #[test]
    fn undefined_setable_fails_until_set() {
        let s = Setable::undefined("rule not yet defined");
        let handle: ParserRef = s.clone();
        assert!(handle.parse("a").is_failure());
        s.set(char_parser('a'));
        assert!(handle.parse("a").is_success());
    }

    #[test]
    fn set_rewires_existing_graph() {
        let s = Setable::undefined("x");
        let handle: ParserRef = s.clone();
        let wrapped = handle.clone().star();
        s.set(char_parser('a'));
        assert!(wrapped.accept("aaa"));
    }
}
