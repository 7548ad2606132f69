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

//! Runplan Expression Language
//!
//! A small numeric expression language used to write globals: literals,
//! arrays and tuples, arithmetic with array broadcasting, comparisons,
//! conditionals, comprehensions and a preloaded helper library.

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod value;

pub use ast::AstNode;
pub use builtins::Builtin;
pub use error::{EvalError, EvalResult, ParseError, ParseErrorKind, ParseResult};
pub use interpreter::{DEFAULT_MAX_ITERATOR_LENGTH, Interpreter, Namespace, Scope, evaluate};
pub use lexer::{is_valid_identifier, tokenize, tokenize_with_comments};
pub use parser::parse;
pub use value::{Generator, Value};
