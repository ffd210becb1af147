/// Errors raised immediately during grammar construction (see `spec.md` §7).
///
/// These are distinct from parse failures, which stay in-band as `Failure` values
/// (see [`crate::context::ParseResult`]) and are only ever promoted to a
/// [`ParserError`] at the single point described in §7.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("production already defined: {0}")]
    RedefinedProduction(String),
    #[error("undefined production: {0}")]
    UndefinedProduction(String),
    #[error("composite grammar already completed")]
    CompletedParser,
    #[error("invalid argument: {0}")]
    Argument(String),
}

/// Raised when the value of a [`Failure`](crate::context::Failure) is requested.
///
/// This is the one place where the in-band parse-failure channel is promoted
/// to an exception-like error, per `spec.md` §7.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("parse error at position {position}: {message}")]
pub struct ParserError {
    pub position: usize,
    pub message: String,
}
