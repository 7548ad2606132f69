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

use crate::lexer::Operator;

#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Identifier(String),
    Array(Vec<AstNode>),
    Tuple(Vec<AstNode>),
    Unary {
        op: UnaryOp,
        operand: Box<AstNode>,
    },
    BinaryOp {
        left: Box<AstNode>,
        op: Operator,
        right: Box<AstNode>,
    },
    /// `a < b <= c`, evaluated pairwise with short circuit
    Compare {
        first: Box<AstNode>,
        rest: Vec<(Operator, AstNode)>,
    },
    And(Box<AstNode>, Box<AstNode>),
    Or(Box<AstNode>, Box<AstNode>),
    Conditional {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Box<AstNode>,
    },
    FunctionCall {
        callee: Box<AstNode>,
        args: Vec<AstNode>,
        kwargs: Vec<(String, AstNode)>,
    },
    Index {
        target: Box<AstNode>,
        index: Box<AstNode>,
    },
    Slice {
        target: Box<AstNode>,
        start: Option<Box<AstNode>>,
        stop: Option<Box<AstNode>>,
    },
    Comprehension {
        kind: ComprehensionKind,
        element: Box<AstNode>,
        variable: String,
        iterable: Box<AstNode>,
        condition: Option<Box<AstNode>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    /// `[x for x in ...]`
    Array,
    /// `(x for x in ...)`
    Generator,
}
