use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::GrammarError;
use crate::parser::{ParserExt, ParserRef};
use crate::setable::Setable;
use crate::value::Value;

/// Builds a named, mutually-recursive grammar out of productions.
///
/// Call `def`/`ref_`/`redef`/`action` from an `initialize` closure passed to
/// [`build_composite`]; the builder resolves every forward reference and
/// freezes itself once that closure returns.
pub struct CompositeBuilder {
    definitions: RefCell<HashMap<String, ParserRef>>,
    placeholders: RefCell<HashMap<String, Rc<Setable>>>,
    completed: Cell<bool>,
}

impl CompositeBuilder {
    fn new() -> Self {
        CompositeBuilder {
            definitions: RefCell::new(HashMap::new()),
            placeholders: RefCell::new(HashMap::new()),
            completed: Cell::new(false),
        }
    }

    /// Registers a production. Errors on a duplicate name or on a builder
    /// that has already completed.
    pub fn def(&self, name: &str, p: ParserRef) -> Result<(), GrammarError> {
        if self.completed.get() {
            return Err(GrammarError::CompletedParser);
        }
        let mut defs = self.definitions.borrow_mut();
        if defs.contains_key(name) {
            return Err(GrammarError::RedefinedProduction(name.to_string()));
        }
        defs.insert(name.to_string(), p);
        Ok(())
    }

    /// A usable reference to `name`, valid before `name` is defined.
    ///
    /// Before completion this is a stable `Setable` placeholder (the same
    /// identity on every call for a given `name`, so forward cycles tie
    /// correctly); after completion it is the production's final
    /// definition, returned directly.
    pub fn ref_(&self, name: &str) -> ParserRef {
        if self.completed.get() {
            if let Some(def) = self.definitions.borrow().get(name) {
                return def.clone();
            }
        }
        let mut placeholders = self.placeholders.borrow_mut();
        placeholders
            .entry(name.to_string())
            .or_insert_with(|| Setable::undefined(format!("Uninitialized production: {name}")))
            .clone()
    }

    /// Replaces an existing production. Errors if `name` was never `def`ined
    /// or the builder has already completed.
    pub fn redef(&self, name: &str, p: ParserRef) -> Result<(), GrammarError> {
        if self.completed.get() {
            return Err(GrammarError::CompletedParser);
        }
        let mut defs = self.definitions.borrow_mut();
        if !defs.contains_key(name) {
            return Err(GrammarError::UndefinedProduction(name.to_string()));
        }
        defs.insert(name.to_string(), p);
        Ok(())
    }

    /// `action(name, f)` is `redef(name, def(name).map(f))`.
    pub fn action(&self, name: &str, f: impl Fn(Value) -> Value + 'static) -> Result<(), GrammarError> {
        let current = self
            .definitions
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| GrammarError::UndefinedProduction(name.to_string()))?;
        self.redef(name, current.map(f))
    }

    /// Ties off every outstanding forward reference and returns the
    /// composite as a single parser delegating to the `start` production.
    fn complete(&self) -> Result<ParserRef, GrammarError> {
        let self_delegate = Setable::undefined("composite not yet completed");
        let start = self.ref_("start");
        self_delegate.set(start);

        let outstanding: Vec<(String, Rc<Setable>)> = self
            .placeholders
            .borrow()
            .iter()
            .map(|(name, setable)| (name.clone(), setable.clone()))
            .collect();
        for (name, setable) in outstanding {
            let def = self
                .definitions
                .borrow()
                .get(&name)
                .cloned()
                .ok_or_else(|| GrammarError::UndefinedProduction(name.clone()))?;
            setable.set(def);
        }

        self.completed.set(true);
        Ok(self_delegate)
    }
}

/// Runs `initialize` over a fresh [`CompositeBuilder`] and completes it,
/// the non-subclassing equivalent of instantiating a composite grammar and
/// letting its `initialize()` hook run.
pub fn build_composite(
    initialize: impl FnOnce(&CompositeBuilder) -> Result<(), GrammarError>,
) -> Result<ParserRef, GrammarError> {
    let builder = CompositeBuilder::new();
    initialize(&builder)?;
    builder.complete()
}

/// Runs a base `initialize` closure, then an `overrides` closure that may
/// `redef`/`action` productions the base already `def`ined, before
/// completing.
pub fn build_composite_with_override(
    initialize: impl FnOnce(&CompositeBuilder) -> Result<(), GrammarError>,
    overrides: impl FnOnce(&CompositeBuilder) -> Result<(), GrammarError>,
) -> Result<ParserRef, GrammarError> {
    let builder = CompositeBuilder::new();
    initialize(&builder)?;
    overrides(&builder)?;
    builder.complete()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserExt;
    use crate::primitive::char_parser;
    use crate::value::Value;

    #[test]
    fn forward_reference_ties_a_recursive_knot() {
        let grammar = build_composite(|b| {
            // expr := 'a' expr | 'a'
            let expr_ref = b.ref_("expr");
            b.def(
                "expr",
                char_parser('a').seq(expr_ref.clone()).or(char_parser('a')),
            )?;
            b.def("start", b.ref_("expr"))?;
            Ok(())
        })
        .unwrap();

        assert!(grammar.accept("aaa"));
    }

    #[test]
    fn redefining_unknown_production_errors() {
        let result = build_composite(|b| {
            b.def("start", char_parser('a'))?;
            b.redef("missing", char_parser('b'))?;
            Ok(())
        });
        assert!(matches!(result, Err(GrammarError::UndefinedProduction(_))));
    }

    #[test]
    fn duplicate_definition_errors() {
        let result = build_composite(|b| {
            b.def("start", char_parser('a'))?;
            b.def("start", char_parser('b'))?;
            Ok(())
        });
        assert!(matches!(result, Err(GrammarError::RedefinedProduction(_))));
    }

    #[test]
    fn missing_start_errors_on_completion() {
        let result = build_composite(|b| {
            b.def("helper", char_parser('a'))?;
            Ok(())
        });
        assert!(matches!(result, Err(GrammarError::UndefinedProduction(_))));
    }

    #[test]
    fn action_wraps_existing_production_with_a_map() {
        let grammar = build_composite(|b| {
            b.def("start", char_parser('a'))?;
            b.action("start", |v| match v {
                Value::Char(c) => Value::Char(c.to_ascii_uppercase()),
                other => other,
            })?;
            Ok(())
        })
        .unwrap();
        assert_eq!(grammar.parse("a").value().unwrap(), Value::Char('A'));
    }

    #[test]
    fn override_redefines_a_base_production() {
        let grammar = build_composite_with_override(
            |b| {
                b.def("start", char_parser('a'))?;
                Ok(())
            },
            |b| b.redef("start", char_parser('b')),
        )
        .unwrap();
        assert!(grammar.accept("b"));
        assert!(!grammar.accept("a"));
    }
}
