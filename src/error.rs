//! Structured parse errors with source positions
//!
//! Every failure from the tokenizer or parser carries the byte offset,
//! line and column where it was detected, plus the first byte of the
//! previously emitted token to aid debugging of malformed manifests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the opening delimiter of an unterminated literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenerPos {
    pub line: u32,
    pub column: u32,
}

/// A fatal tokenizer or parser error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    /// Human-readable message from a closed set (e.g. `unterminated string`).
    pub message: String,
    /// Byte offset where the error was detected.
    pub offset: usize,
    /// 1-based line of the error.
    pub line: u32,
    /// 1-based column of the error.
    pub column: u32,
    /// First byte of the previously emitted token, 0 if none.
    pub prev: u8,
    /// Position of the opening quote/delimiter for unterminated literals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opener: Option<OpenerPos>,
}

impl ParseError {
    pub fn new(
        message: impl Into<String>,
        offset: usize,
        line: u32,
        column: u32,
        prev: u8,
    ) -> Self {
        ParseError {
            message: message.into(),
            offset,
            line,
            column,
            prev,
            opener: None,
        }
    }

    /// Attach the position of the opening delimiter.
    pub fn with_opener(mut self, line: u32, column: u32) -> Self {
        self.opener = Some(OpenerPos { line, column });
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @{}:{} prev=0x{:02x}",
            self.message, self.line, self.column, self.prev
        )?;
        if let Some(opener) = self.opener {
            write!(f, " opener@{}:{}", opener.line, opener.column)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
