use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::char_matcher::CharMatcher;
use crate::error::GrammarError;
use crate::parser::{ParserExt, ParserRef};
use crate::primitive::{any_char, char_parser, CharacterParser};
use crate::value::Value;

thread_local! {
    static GRAMMAR: OnceCell<ParserRef> = OnceCell::new();
}

/// Compiles a bracket-expression like `"a-z^0-9"` or `"^aeiou"` into a
/// [`CharMatcher`], wrapped as a [`CharacterParser`] (`spec.md` §4.2).
///
/// The grammar recognizing these expressions is itself built with this
/// library's own combinators, and built exactly once per thread, behind
/// [`OnceCell`].
pub fn pattern(expr: &str, msg: impl Into<String>) -> Result<ParserRef, GrammarError> {
    let message = msg.into();
    let grammar = GRAMMAR.with(|cell| cell.get_or_init(build_grammar).clone());

    let value = grammar
        .parse(expr)
        .value()
        .map_err(|e| GrammarError::Argument(format!("invalid pattern {expr:?}: {e}")))?;

    let parts = value
        .into_list()
        .ok_or_else(|| GrammarError::Argument(format!("invalid pattern {expr:?}")))?;
    let negated = matches!(parts.first(), Some(Value::Char('^')));
    let matchers = parts
        .get(1)
        .and_then(|v| v.downcast_ref::<Vec<CharMatcher>>())
        .cloned()
        .ok_or_else(|| GrammarError::Argument(format!("invalid pattern {expr:?}")))?;

    for m in &matchers {
        if let CharMatcher::Range(lo, hi) = m {
            if lo > hi {
                return Err(GrammarError::Argument(format!(
                    "inverted range in pattern {expr:?}: {lo:?}..{hi:?}"
                )));
            }
        }
    }

    let combined = match matchers.len() {
        0 => return Err(GrammarError::Argument(format!("empty pattern {expr:?}"))),
        1 => matchers.into_iter().next().unwrap(),
        _ => CharMatcher::Alt(matchers),
    };
    let combined = if negated { combined.negate() } else { combined };

    Ok(Rc::new(CharacterParser {
        matcher: combined,
        message,
    }))
}

fn build_grammar() -> ParserRef {
    let range_item = any_char("character expected")
        .seq(char_parser('-'))
        .seq(any_char("character expected"))
        .map(|v| {
            let items = v.into_list().unwrap_or_default();
            let lo = items[0].as_char().unwrap_or('\0');
            let hi = items[2].as_char().unwrap_or('\0');
            Value::dyn_value(CharMatcher::Range(lo, hi))
        });
    let single_item = any_char("character expected").map(|v| {
        let c = v.as_char().unwrap_or('\0');
        Value::dyn_value(CharMatcher::Single(c))
    });
    let item = range_item.or(single_item);

    let body = item.plus().map(|v| {
        let matchers: Vec<CharMatcher> = v
            .into_list()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| entry.downcast_ref::<CharMatcher>().cloned())
            .collect();
        Value::dyn_value(matchers)
    });

    char_parser('^')
        .optional(Value::Unit)
        .seq(body)
        .end("unexpected trailing characters in pattern")
}

#[cfg(test)]
mod tests {
    use crate::parser::ParserExt;

    use super::*;

    #[test]
    fn single_chars_and_ranges_compose() {
        let p = pattern("a-z09", "expected").unwrap();
        assert!(p.accept("m"));
        assert!(p.accept("0"));
        assert!(!p.accept("Z"));
    }

    #[test]
    fn leading_caret_negates() {
        let p = pattern("^a-z", "expected").unwrap();
        assert!(p.accept("Z"));
        assert!(!p.accept("m"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(pattern("z-a", "expected").is_err());
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(pattern("", "expected").is_err());
    }
}
