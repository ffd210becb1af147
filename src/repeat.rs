use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, Failure, ParseResult};
use crate::parser::{Parser, ParserRef};
use crate::value::Value;

fn replace_slot(slot: &RefCell<ParserRef>, source: &ParserRef, target: &ParserRef) {
    let matches = Rc::ptr_eq(&*slot.borrow(), source);
    if matches {
        *slot.borrow_mut() = target.clone();
    }
}

/// Blind (possessive) repetition: run `delegate` until it fails, with no
/// backtracking (`spec.md` §4.3). `min`/`max` bound the accepted count.
pub struct PossessiveRepeat {
    pub delegate: RefCell<ParserRef>,
    pub min: usize,
    pub max: usize,
}

impl Parser for PossessiveRepeat {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let delegate = self.delegate.borrow().clone();
        let mut values = Vec::new();
        let mut cur = ctx.clone();
        let mut last_failure: Option<Failure> = None;
        while values.len() < self.max {
            match delegate.parse_on(&cur) {
                ParseResult::Success(s) if s.position > cur.position() || values.len() < self.min => {
                    cur = Context::new(s.buffer.clone(), s.position);
                    values.push(s.value);
                }
                ParseResult::Failure(f) => {
                    last_failure = Some(f);
                    break;
                }
                _ => break,
            }
        }
        if values.len() < self.min {
            return match last_failure {
                Some(f) => ParseResult::Failure(f),
                None => ctx.failure(
                    format!("expected at least {} repetitions, got {}", self.min, values.len()),
                    Some(cur.position()),
                ),
            };
        }
        ctx.success(Value::List(values), Some(cur.position()))
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(PossessiveRepeat {
            delegate: RefCell::new(self.delegate.borrow().clone()),
            min: self.min,
            max: self.max,
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<PossessiveRepeat>()
            .map(|o| o.min == self.min && o.max == self.max)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "repeat".to_string()
    }
}

/// Greedy repetition bounded by a `limit` parser: repeatedly try `delegate`
/// vs. `limit` at each position, preferring `delegate`; when neither count
/// nor `limit` exhausts first, backtrack on the recorded `delegate`
/// successes one at a time until `limit` accepts, per `spec.md` §4.3.
///
/// Each accepted `delegate` match records the `Context` at which `limit` was
/// retried and failed, so backtracking can resume a shorter match without
/// re-running `delegate` from scratch, and the deepest-position `limit`
/// failure seen while backtracking is kept as the final diagnostic if
/// backtracking is exhausted without `limit` ever succeeding.
pub struct GreedyRepeat {
    pub delegate: RefCell<ParserRef>,
    pub limit: RefCell<ParserRef>,
    pub min: usize,
    pub max: usize,
}

impl Parser for GreedyRepeat {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let delegate = self.delegate.borrow().clone();
        let limit = self.limit.borrow().clone();

        let mut values = Vec::new();
        let mut positions = vec![ctx.position()];
        let mut cur = ctx.clone();
        let mut delegate_failure: Option<Failure> = None;

        while values.len() < self.max {
            match delegate.parse_on(&cur) {
                ParseResult::Success(s) if s.position > cur.position() => {
                    cur = Context::new(s.buffer.clone(), s.position);
                    values.push(s.value);
                    positions.push(cur.position());
                }
                ParseResult::Failure(f) => {
                    delegate_failure = Some(f);
                    break;
                }
                _ => break,
            }
        }

        let mut first_limit_failure = None;
        while values.len() >= self.min {
            match limit.parse_on(&cur) {
                ParseResult::Success(_) => {
                    return ctx.success(Value::List(values), Some(cur.position()));
                }
                ParseResult::Failure(f) => {
                    if first_limit_failure.is_none() {
                        first_limit_failure = Some(f);
                    }
                    if values.is_empty() {
                        break;
                    }
                    values.pop();
                    positions.pop();
                    cur = Context::new(cur.buffer().clone(), *positions.last().unwrap());
                }
            }
        }

        match first_limit_failure.or(delegate_failure) {
            Some(f) => ParseResult::Failure(f),
            None => ctx.failure(
                format!("expected at least {} repetitions before limit", self.min),
                Some(cur.position()),
            ),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone(), self.limit.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
        replace_slot(&self.limit, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(GreedyRepeat {
            delegate: RefCell::new(self.delegate.borrow().clone()),
            limit: RefCell::new(self.limit.borrow().clone()),
            min: self.min,
            max: self.max,
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<GreedyRepeat>()
            .map(|o| o.min == self.min && o.max == self.max)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "repeat_greedy".to_string()
    }
}

/// Lazy repetition bounded by a `limit` parser: at each position, try
/// `limit` first and stop as soon as it (and the accepted count) allow;
/// only consume another `delegate` match when `limit` has not yet succeeded
/// or the minimum count has not yet been reached (`spec.md` §4.3).
pub struct LazyRepeat {
    pub delegate: RefCell<ParserRef>,
    pub limit: RefCell<ParserRef>,
    pub min: usize,
    pub max: usize,
}

impl Parser for LazyRepeat {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let delegate = self.delegate.borrow().clone();
        let limit = self.limit.borrow().clone();

        let mut values = Vec::new();
        let mut cur = ctx.clone();
        let mut last_limit_failure: Option<Failure> = None;

        loop {
            if values.len() >= self.min {
                match limit.parse_on(&cur) {
                    ParseResult::Success(_) => {
                        return ctx.success(Value::List(values), Some(cur.position()));
                    }
                    ParseResult::Failure(f) => last_limit_failure = Some(f),
                }
            }
            if values.len() >= self.max {
                return match last_limit_failure {
                    Some(f) => ParseResult::Failure(f),
                    None => ctx.failure(
                        "limit never matched within the repetition bound".to_string(),
                        Some(cur.position()),
                    ),
                };
            }
            match delegate.parse_on(&cur) {
                ParseResult::Success(s) if s.position > cur.position() || values.len() < self.min => {
                    cur = Context::new(s.buffer.clone(), s.position);
                    values.push(s.value);
                }
                ParseResult::Failure(f) => return ParseResult::Failure(f),
                _ => {
                    return match last_limit_failure {
                        Some(f) => ParseResult::Failure(f),
                        None => ctx.failure(
                            "repetition stalled without reaching the limit".to_string(),
                            Some(cur.position()),
                        ),
                    };
                }
            }
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone(), self.limit.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
        replace_slot(&self.limit, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(LazyRepeat {
            delegate: RefCell::new(self.delegate.borrow().clone()),
            limit: RefCell::new(self.limit.borrow().clone()),
            min: self.min,
            max: self.max,
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<LazyRepeat>()
            .map(|o| o.min == self.min && o.max == self.max)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "repeat_lazy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ParserExt;
    use crate::primitive::char_parser;

    #[test]
    fn possessive_star_collects_all_matches() {
        let p = char_parser('a').star();
        let result = p.parse("aaab");
        assert!(result.is_success());
        assert_eq!(result.position(), 3);
    }

    #[test]
    fn possessive_plus_requires_one() {
        let p = char_parser('a').plus();
        assert!(p.parse("").is_failure());
        assert!(p.parse("a").is_success());
    }

    #[test]
    fn greedy_backtracks_to_satisfy_limit() {
        let p = char_parser('a').star_greedy(char_parser('a').seq(char_parser('b')).pick(0));
        let result = p.parse("aaab");
        assert!(result.is_success());
        assert_eq!(result.position(), 2);
    }

    #[test]
    fn lazy_stops_as_soon_as_limit_matches() {
        let p = char_parser('a').star_lazy(char_parser('b'));
        let result = p.parse("aaab");
        assert!(result.is_success());
        assert_eq!(result.position(), 3);
    }
}
