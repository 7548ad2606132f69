// Runplan
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Parse and evaluation error types

use crate::position::Position;
use thiserror::Error;

/// Result type for lexing and parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for evaluating expressions
pub type EvalResult<T> = Result<T, EvalError>;

/// Error raised while turning expression text into an AST
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at {position}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, position: Position, message: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            message: message.into(),
        }
    }
}

/// Categories of parse errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("Invalid character")]
    InvalidCharacter,

    #[error("Invalid number")]
    InvalidNumber,

    #[error("Unterminated string")]
    UnterminatedString,

    #[error("Unexpected token")]
    UnexpectedToken,

    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Recursion limit exceeded")]
    RecursionLimitExceeded,
}

/// Error raised while evaluating a single global's expression.
///
/// `Expansion` is kept apart from the other variants: it marks a value that
/// evaluated fine but cannot be expanded the way its tag asks for.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("SyntaxError: {0}")]
    Syntax(#[from] ParseError),

    #[error("NameError: name '{name}' is not defined")]
    Name { name: String },

    #[error("TypeError: {message}")]
    Type { message: String },

    #[error("ValueError: {message}")]
    Value { message: String },

    #[error("ZeroDivisionError: {message}")]
    ZeroDivision { message: String },

    #[error("IndexError: {message}")]
    Index { message: String },

    #[error("ExpansionError: {message}")]
    Expansion { message: String },

    #[error("ValueError: global '{name}' is defined in multiple active groups: {}", .groups.join(", "))]
    MultiplyDefined { name: String, groups: Vec<String> },

    #[error("ValueError: iterator is longer than {limit} elements, possibly infinite; cannot create an unbounded number of shots")]
    TooLong { limit: usize },
}

impl EvalError {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name { name: name.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type { message: message.into() }
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::Value { message: message.into() }
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::ZeroDivision { message: message.into() }
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::Index { message: message.into() }
    }

    pub fn expansion(message: impl Into<String>) -> Self {
        Self::Expansion { message: message.into() }
    }

    /// True for the expansion-mode mismatch subtype
    pub fn is_expansion_error(&self) -> bool {
        matches!(self, Self::Expansion { .. })
    }

    /// Short class-like name used when listing errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "SyntaxError",
            Self::Name { .. } => "NameError",
            Self::Type { .. } => "TypeError",
            Self::Value { .. } | Self::MultiplyDefined { .. } | Self::TooLong { .. } => "ValueError",
            Self::ZeroDivision { .. } => "ZeroDivisionError",
            Self::Index { .. } => "IndexError",
            Self::Expansion { .. } => "ExpansionError",
        }
    }
}
