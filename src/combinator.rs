use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Context, ParseResult};
use crate::parser::{Parser, ParserRef};
use crate::token::Token;
use crate::value::Value;

/// Swaps `source` for `target` in a `RefCell<ParserRef>` slot, if it
/// currently holds `source` (identity-compared). Shared by every
/// single-child combinator node's `replace` implementation.
fn replace_slot(slot: &RefCell<ParserRef>, source: &ParserRef, target: &ParserRef) {
    let matches = Rc::ptr_eq(&*slot.borrow(), source);
    if matches {
        *slot.borrow_mut() = target.clone();
    }
}

/// Swaps every occurrence of `source` for `target` in a `RefCell<Vec<ParserRef>>`.
fn replace_in_list(slot: &RefCell<Vec<ParserRef>>, source: &ParserRef, target: &ParserRef) {
    for child in slot.borrow_mut().iter_mut() {
        if Rc::ptr_eq(child, source) {
            *child = target.clone();
        }
    }
}

/// Runs its parts left-to-right, succeeding with the ordered list of their
/// values. `p.seq(q)` flattens into this rather than nesting when `p` is
/// already a `SequenceParser` (`spec.md` §4.1).
pub struct SequenceParser {
    pub parts: RefCell<Vec<ParserRef>>,
}

impl SequenceParser {
    pub fn new(parts: Vec<ParserRef>) -> Self {
        SequenceParser {
            parts: RefCell::new(parts),
        }
    }
}

impl Parser for SequenceParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let parts = self.parts.borrow().clone();
        let mut values = Vec::with_capacity(parts.len());
        let mut cur = ctx.clone();
        for part in &parts {
            match part.parse_on(&cur) {
                ParseResult::Success(s) => {
                    cur = Context::new(s.buffer.clone(), s.position);
                    values.push(s.value);
                }
                ParseResult::Failure(f) => return ParseResult::Failure(f),
            }
        }
        ctx.success(Value::List(values), Some(cur.position()))
    }

    fn children(&self) -> Vec<ParserRef> {
        self.parts.borrow().clone()
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_in_list(&self.parts, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(SequenceParser::new(self.parts.borrow().clone()))
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<SequenceParser>()
            .map(|o| o.parts.borrow().len() == self.parts.borrow().len())
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "seq".to_string()
    }
}

/// Tries each alternative in declared order, returning the first success or
/// the last-attempted failure. Flattens the same way `SequenceParser` does.
pub struct ChoiceParser {
    pub alts: RefCell<Vec<ParserRef>>,
}

impl ChoiceParser {
    pub fn new(alts: Vec<ParserRef>) -> Self {
        ChoiceParser {
            alts: RefCell::new(alts),
        }
    }
}

impl Parser for ChoiceParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let alts = self.alts.borrow().clone();
        let mut last_failure = None;
        for alt in &alts {
            match alt.parse_on(ctx) {
                ParseResult::Success(s) => return ParseResult::Success(s),
                ParseResult::Failure(f) => last_failure = Some(f),
            }
        }
        match last_failure {
            Some(f) => ParseResult::Failure(f),
            None => ctx.failure("no alternatives", None),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        self.alts.borrow().clone()
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_in_list(&self.alts, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(ChoiceParser::new(self.alts.borrow().clone()))
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<ChoiceParser>()
            .map(|o| o.alts.borrow().len() == self.alts.borrow().len())
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "or".to_string()
    }
}

/// Succeeds with `delegate`'s value, or with `otherwise` consuming nothing.
pub struct OptionalParser {
    pub delegate: RefCell<ParserRef>,
    pub otherwise: Value,
}

impl Parser for OptionalParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        match self.delegate.borrow().parse_on(ctx) {
            ParseResult::Success(s) => ParseResult::Success(s),
            ParseResult::Failure(_) => ctx.success(self.otherwise.clone(), Some(ctx.position())),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(OptionalParser {
            delegate: RefCell::new(self.delegate.borrow().clone()),
            otherwise: self.otherwise.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<OptionalParser>().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "optional".to_string()
    }
}

/// Positive lookahead: succeeds like `delegate`, but never consumes input.
pub struct AndParser {
    pub delegate: RefCell<ParserRef>,
}

impl Parser for AndParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        match self.delegate.borrow().parse_on(ctx) {
            ParseResult::Success(s) => ctx.success(s.value, Some(ctx.position())),
            ParseResult::Failure(f) => ParseResult::Failure(f),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(AndParser {
            delegate: RefCell::new(self.delegate.borrow().clone()),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<AndParser>().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "and".to_string()
    }
}

/// Negative lookahead: succeeds with `Value::Unit` iff `delegate` fails.
/// Never consumes input.
pub struct NotParser {
    pub delegate: RefCell<ParserRef>,
    pub message: String,
}

impl Parser for NotParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        match self.delegate.borrow().parse_on(ctx) {
            ParseResult::Success(_) => ctx.failure(self.message.clone(), Some(ctx.position())),
            ParseResult::Failure(_) => ctx.success(Value::Unit, Some(ctx.position())),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(NotParser {
            delegate: RefCell::new(self.delegate.borrow().clone()),
            message: self.message.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<NotParser>()
            .map(|o| o.message == self.message)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "not".to_string()
    }
}

/// Succeeds iff `delegate` succeeds and consumes the entire remaining input.
pub struct EndParser {
    pub delegate: RefCell<ParserRef>,
    pub message: String,
}

impl Parser for EndParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        match self.delegate.borrow().parse_on(ctx) {
            ParseResult::Success(s) => {
                if s.position == s.buffer.len() {
                    ParseResult::Success(s)
                } else {
                    let pos = s.position;
                    ctx.failure(self.message.clone(), Some(pos))
                }
            }
            ParseResult::Failure(f) => ParseResult::Failure(f),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(EndParser {
            delegate: RefCell::new(self.delegate.borrow().clone()),
            message: self.message.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<EndParser>()
            .map(|o| o.message == self.message)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "end".to_string()
    }
}

/// On success, replaces the value with `action(value)`. Backs `.map()`,
/// `.pick()`, and `.permute()`.
///
/// Equality of two `MapParser`s requires identity equality of their action
/// closures (`spec.md` §9 design note), since two distinct closures cannot
/// be compared for behavioural equality in general.
pub struct MapParser {
    pub delegate: RefCell<ParserRef>,
    pub action: Rc<dyn Fn(Value) -> Value>,
}

impl Parser for MapParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        match self.delegate.borrow().parse_on(ctx) {
            ParseResult::Success(s) => ctx.success((self.action)(s.value), Some(s.position)),
            ParseResult::Failure(f) => ParseResult::Failure(f),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(MapParser {
            delegate: RefCell::new(self.delegate.borrow().clone()),
            action: self.action.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<MapParser>()
            .map(|o| Rc::ptr_eq(&o.action, &self.action))
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "map".to_string()
    }
}

/// On success, replaces the value with the matched substring `[start, stop)`.
pub struct FlattenParser {
    pub delegate: RefCell<ParserRef>,
}

impl Parser for FlattenParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let start = ctx.position();
        match self.delegate.borrow().parse_on(ctx) {
            ParseResult::Success(s) => {
                let slice = s.buffer[start..s.position].iter().collect::<String>();
                ctx.success(Value::string(slice), Some(s.position))
            }
            ParseResult::Failure(f) => ParseResult::Failure(f),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(FlattenParser {
            delegate: RefCell::new(self.delegate.borrow().clone()),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<FlattenParser>().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "flatten".to_string()
    }
}

/// On success, wraps the value in a [`Token`] capturing `[start, stop)`.
pub struct TokenParser {
    pub delegate: RefCell<ParserRef>,
}

impl Parser for TokenParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let start = ctx.position();
        match self.delegate.borrow().parse_on(ctx) {
            ParseResult::Success(s) => {
                let token = Token::new(s.value, s.buffer.clone(), start, s.position);
                ctx.success(Value::Token(token), Some(s.position))
            }
            ParseResult::Failure(f) => ParseResult::Failure(f),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(TokenParser {
            delegate: RefCell::new(self.delegate.borrow().clone()),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<TokenParser>().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "token".to_string()
    }
}

/// Consumes zero-or-more `trimmer` before and after `delegate`, returning
/// `delegate`'s value.
pub struct TrimParser {
    pub delegate: RefCell<ParserRef>,
    pub trimmer: RefCell<ParserRef>,
}

impl Parser for TrimParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let trimmer = self.trimmer.borrow().clone();
        let delegate = self.delegate.borrow().clone();
        let cur = skip_all(&trimmer, ctx);
        match delegate.parse_on(&cur) {
            ParseResult::Success(s) => {
                let after = skip_all(&trimmer, &Context::new(s.buffer.clone(), s.position));
                ctx.success(s.value, Some(after.position()))
            }
            ParseResult::Failure(f) => ParseResult::Failure(f),
        }
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone(), self.trimmer.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.delegate, source, target);
        replace_slot(&self.trimmer, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(TrimParser {
            delegate: RefCell::new(self.delegate.borrow().clone()),
            trimmer: RefCell::new(self.trimmer.borrow().clone()),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<TrimParser>().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "trim".to_string()
    }
}

fn skip_all(trimmer: &ParserRef, ctx: &Context) -> Context {
    let mut cur = ctx.clone();
    loop {
        match trimmer.parse_on(&cur) {
            ParseResult::Success(s) if s.position > cur.position() => {
                cur = Context::new(s.buffer.clone(), s.position);
            }
            _ => break,
        }
    }
    cur
}

/// Parses `item (sep item)*` optionally followed by a trailing `sep`,
/// returning a flat list (`spec.md` §4.1).
pub struct SeparatedByParser {
    pub item: RefCell<ParserRef>,
    pub sep: RefCell<ParserRef>,
    pub include_separators: bool,
    pub optional_sep_at_end: bool,
}

impl Parser for SeparatedByParser {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let item = self.item.borrow().clone();
        let sep = self.sep.borrow().clone();
        let mut items = Vec::new();
        let mut cur = match item.parse_on(ctx) {
            ParseResult::Success(s) => {
                let next = Context::new(s.buffer.clone(), s.position);
                items.push(s.value);
                next
            }
            ParseResult::Failure(f) => return ParseResult::Failure(f),
        };
        loop {
            let sep_success = match sep.parse_on(&cur) {
                ParseResult::Success(s) => s,
                ParseResult::Failure(_) => break,
            };
            let after_sep = Context::new(sep_success.buffer.clone(), sep_success.position);
            match item.parse_on(&after_sep) {
                ParseResult::Success(item_success) => {
                    if self.include_separators {
                        items.push(sep_success.value.clone());
                    }
                    items.push(item_success.value);
                    cur = Context::new(item_success.buffer.clone(), item_success.position);
                }
                ParseResult::Failure(_) => {
                    if self.optional_sep_at_end {
                        if self.include_separators {
                            items.push(sep_success.value.clone());
                        }
                        cur = after_sep;
                    }
                    break;
                }
            }
        }
        ctx.success(Value::List(items), Some(cur.position()))
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.item.borrow().clone(), self.sep.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        replace_slot(&self.item, source, target);
        replace_slot(&self.sep, source, target);
    }

    fn copy(&self) -> ParserRef {
        Rc::new(SeparatedByParser {
            item: RefCell::new(self.item.borrow().clone()),
            sep: RefCell::new(self.sep.borrow().clone()),
            include_separators: self.include_separators,
            optional_sep_at_end: self.optional_sep_at_end,
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<SeparatedByParser>()
            .map(|o| {
                o.include_separators == self.include_separators
                    && o.optional_sep_at_end == self.optional_sep_at_end
            })
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        "separated_by".to_string()
    }
}
