use std::rc::Rc;

use crate::error::ParserError;
use crate::value::Value;

/// An immutable `(buffer, position)` pair, per `spec.md` §3.
///
/// The buffer holds Unicode scalar values rather than raw bytes, so every
/// combinator indexes into it by code point.
#[derive(Clone)]
pub struct Context {
    buffer: Rc<[char]>,
    position: usize,
}

impl Context {
    pub fn from_str(input: &str) -> Self {
        let buffer: Rc<[char]> = input.chars().collect::<Vec<_>>().into();
        Context {
            buffer,
            position: 0,
        }
    }

    pub fn new(buffer: Rc<[char]>, position: usize) -> Self {
        Context { buffer, position }
    }

    pub fn buffer(&self) -> &Rc<[char]> {
        &self.buffer
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn at_end(&self) -> bool {
        self.position >= self.buffer.len()
    }

    /// The single remaining character at the current position, if any.
    pub fn peek(&self) -> Option<char> {
        self.buffer.get(self.position).copied()
    }

    pub fn slice(&self, start: usize, stop: usize) -> Rc<str> {
        self.buffer[start..stop].iter().collect::<String>().into()
    }

    /// Build a `Success` rooted at this context's buffer.
    ///
    /// `new_pos` resolves to the caller-supplied position if given, otherwise
    /// the current position.
    pub fn success(&self, value: Value, new_pos: Option<usize>) -> ParseResult {
        ParseResult::Success(Success {
            buffer: self.buffer.clone(),
            position: new_pos.unwrap_or(self.position),
            value,
        })
    }

    pub fn failure(&self, message: impl Into<String>, pos: Option<usize>) -> ParseResult {
        ParseResult::Failure(Failure {
            buffer: self.buffer.clone(),
            position: pos.unwrap_or(self.position),
            message: message.into(),
        })
    }
}

/// A successful parse: a new position plus the produced value.
#[derive(Clone)]
pub struct Success {
    pub buffer: Rc<[char]>,
    pub position: usize,
    pub value: Value,
}

/// A failed parse: the position it failed at, plus a diagnostic message.
#[derive(Clone)]
pub struct Failure {
    pub buffer: Rc<[char]>,
    pub position: usize,
    pub message: String,
}

/// `Success | Failure`. A `Result` inherits the `Context` contract (`spec.md`
/// §3): any combinator can feed a `ParseResult` back in as the input to the
/// next parser, via [`ParseResult::context`].
#[derive(Clone)]
pub enum ParseResult {
    Success(Success),
    Failure(Failure),
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ParseResult::Failure(_))
    }

    pub fn position(&self) -> usize {
        match self {
            ParseResult::Success(s) => s.position,
            ParseResult::Failure(f) => f.position,
        }
    }

    pub fn buffer(&self) -> &Rc<[char]> {
        match self {
            ParseResult::Success(s) => &s.buffer,
            ParseResult::Failure(f) => &f.buffer,
        }
    }

    /// The context at this result's position, usable as the starting point
    /// for the next parse.
    pub fn context(&self) -> Context {
        Context::new(self.buffer().clone(), self.position())
    }

    /// The produced value, or a [`ParserError`] if this is a `Failure`.
    ///
    /// This is the sole promotion point from the in-band failure channel to
    /// the exception-like channel described in `spec.md` §7.
    pub fn value(self) -> Result<Value, ParserError> {
        match self {
            ParseResult::Success(s) => Ok(s.value),
            ParseResult::Failure(f) => Err(ParserError {
                position: f.position,
                message: f.message,
            }),
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            ParseResult::Failure(f) => Some(f),
            _ => None,
        }
    }
}
