use thiserror::Error;

use crate::token::Token;

/// Parse failure: a message plus the offending token, when one is known.
///
/// Parsing stops at the first error. The only exception is the pair of
/// stacked block diagnostics (missing separator and missing closer) that
/// `si`/`mientras` bodies may accumulate before reporting.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct ParserError {
    pub message: String,
    pub token: Option<Token>,
}

impl ParserError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            token: None,
        }
    }

    pub(crate) fn at(message: impl Into<String>, token: Token) -> Self {
        Self {
            message: message.into(),
            token: Some(token),
        }
    }
}
