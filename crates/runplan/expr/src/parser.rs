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

//! Recursive descent parser for global expressions
//!
//! Precedence, loosest first: conditional, `or`, `and`, `not`, comparisons,
//! `+ -`, `* / // %`, unary `- +`, `**`, then calls/indexing on atoms.

use crate::ast::{AstNode, ComprehensionKind, UnaryOp};
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::lexer::{Keyword, Operator, Spanned, Token, tokenize};

const MAX_DEPTH: usize = 200;

/// Parse a complete expression
pub fn parse(source: &str) -> ParseResult<AstNode> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, current: 0, depth: 0 };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        _ => Err(parser.unexpected("end of expression")),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    current: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof
        &self.tokens[self.current.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.current + offset).min(self.tokens.len() - 1)].token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> ParseResult<()> {
        if self.eat(token) { Ok(()) } else { Err(self.unexpected(what)) }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let spanned = &self.tokens[self.current.min(self.tokens.len() - 1)];
        if spanned.token == Token::Eof {
            ParseError::new(ParseErrorKind::UnexpectedEof, spanned.position, format!("expected {expected}"))
        } else {
            ParseError::new(ParseErrorKind::UnexpectedToken, spanned.position, format!("expected {expected}, found '{}'", spanned.lexeme))
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let position = self.tokens[self.current.min(self.tokens.len() - 1)].position;
            return Err(ParseError::new(ParseErrorKind::RecursionLimitExceeded, position, format!("nesting deeper than {MAX_DEPTH}")));
        }
        Ok(())
    }

    fn parse_expression(&mut self) -> ParseResult<AstNode> {
        self.enter()?;
        let result = self.parse_conditional();
        self.depth -= 1;
        result
    }

    fn parse_conditional(&mut self) -> ParseResult<AstNode> {
        let then_branch = self.parse_or()?;
        if !self.eat(&Token::Keyword(Keyword::If)) {
            return Ok(then_branch);
        }
        let condition = self.parse_or()?;
        self.expect(&Token::Keyword(Keyword::Else), "'else'")?;
        let else_branch = self.parse_expression()?;
        Ok(AstNode::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_or(&mut self) -> ParseResult<AstNode> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Keyword(Keyword::Or)) {
            let right = self.parse_and()?;
            left = AstNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<AstNode> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::Keyword(Keyword::And)) {
            let right = self.parse_not()?;
            left = AstNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<AstNode> {
        if self.eat(&Token::Keyword(Keyword::Not)) {
            self.enter()?;
            let operand = self.parse_not();
            self.depth -= 1;
            return Ok(AstNode::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<AstNode> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();
        while let Token::Operator(op @ (Operator::Equal | Operator::NotEqual | Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual)) =
            *self.peek()
        {
            self.advance();
            rest.push((op, self.parse_additive()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(AstNode::Compare { first: Box::new(first), rest })
        }
    }

    fn parse_additive(&mut self) -> ParseResult<AstNode> {
        let mut left = self.parse_multiplicative()?;
        while let Token::Operator(op @ (Operator::Plus | Operator::Minus)) = *self.peek() {
            self.advance();
            let right = self.parse_multiplicative()?;
            left = AstNode::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<AstNode> {
        let mut left = self.parse_unary()?;
        while let Token::Operator(op @ (Operator::Star | Operator::Slash | Operator::DoubleSlash | Operator::Percent)) = *self.peek() {
            self.advance();
            let right = self.parse_unary()?;
            left = AstNode::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<AstNode> {
        let op = match self.peek() {
            Token::Operator(Operator::Minus) => UnaryOp::Negate,
            Token::Operator(Operator::Plus) => UnaryOp::Plus,
            _ => return self.parse_power(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary();
        self.depth -= 1;
        Ok(AstNode::Unary { op, operand: Box::new(operand?) })
    }

    fn parse_power(&mut self) -> ParseResult<AstNode> {
        let base = self.parse_postfix()?;
        if !self.eat(&Token::Operator(Operator::Power)) {
            return Ok(base);
        }
        // Right associative, and the exponent may carry its own sign
        let exponent = self.parse_unary()?;
        Ok(AstNode::BinaryOp {
            left: Box::new(base),
            op: Operator::Power,
            right: Box::new(exponent),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<AstNode> {
        let mut node = self.parse_atom()?;
        loop {
            if self.eat(&Token::LeftParen) {
                node = self.parse_call(node)?;
            } else if self.eat(&Token::LeftBracket) {
                node = self.parse_subscript(node)?;
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_call(&mut self, callee: AstNode) -> ParseResult<AstNode> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !self.check(&Token::RightParen) {
            let keyword = match (self.peek(), self.peek_at(1)) {
                (Token::Identifier(name), Token::Operator(Operator::Assign)) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.advance();
                self.advance();
                kwargs.push((name, self.parse_expression()?));
            } else if !kwargs.is_empty() {
                return Err(self.unexpected("keyword argument after keyword arguments"));
            } else {
                args.push(self.parse_expression()?);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RightParen, "')'")?;
        Ok(AstNode::FunctionCall {
            callee: Box::new(callee),
            args,
            kwargs,
        })
    }

    fn parse_subscript(&mut self, target: AstNode) -> ParseResult<AstNode> {
        let start = if self.check(&Token::Colon) { None } else { Some(Box::new(self.parse_expression()?)) };
        if !self.eat(&Token::Colon) {
            self.expect(&Token::RightBracket, "']'")?;
            let index = start.ok_or_else(|| self.unexpected("index"))?;
            return Ok(AstNode::Index {
                target: Box::new(target),
                index,
            });
        }
        let stop = if self.check(&Token::RightBracket) { None } else { Some(Box::new(self.parse_expression()?)) };
        self.expect(&Token::RightBracket, "']'")?;
        Ok(AstNode::Slice {
            target: Box::new(target),
            start,
            stop,
        })
    }

    fn parse_atom(&mut self) -> ParseResult<AstNode> {
        let node = match self.peek().clone() {
            Token::Int(value) => AstNode::Int(value),
            Token::Float(value) => AstNode::Float(value),
            Token::Str(_) => {
                // Adjacent literals concatenate
                let mut value = String::new();
                while let Token::Str(next) = self.peek().clone() {
                    self.advance();
                    value.push_str(&next);
                }
                return Ok(AstNode::Str(value));
            }
            Token::Identifier(name) => AstNode::Identifier(name),
            Token::Keyword(Keyword::True) => AstNode::Bool(true),
            Token::Keyword(Keyword::False) => AstNode::Bool(false),
            Token::Keyword(Keyword::None) => AstNode::None,
            Token::LeftParen => {
                self.advance();
                return self.parse_parenthesized();
            }
            Token::LeftBracket => {
                self.advance();
                return self.parse_bracketed();
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(node)
    }

    fn parse_parenthesized(&mut self) -> ParseResult<AstNode> {
        if self.eat(&Token::RightParen) {
            return Ok(AstNode::Tuple(Vec::new()));
        }
        let first = self.parse_expression()?;
        if self.check(&Token::Keyword(Keyword::For)) {
            let node = self.parse_comprehension(ComprehensionKind::Generator, first)?;
            self.expect(&Token::RightParen, "')'")?;
            return Ok(node);
        }
        if self.eat(&Token::RightParen) {
            return Ok(first);
        }
        self.expect(&Token::Comma, "',' or ')'")?;
        let mut items = vec![first];
        while !self.check(&Token::RightParen) {
            items.push(self.parse_expression()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RightParen, "')'")?;
        Ok(AstNode::Tuple(items))
    }

    fn parse_bracketed(&mut self) -> ParseResult<AstNode> {
        if self.eat(&Token::RightBracket) {
            return Ok(AstNode::Array(Vec::new()));
        }
        let first = self.parse_expression()?;
        if self.check(&Token::Keyword(Keyword::For)) {
            let node = self.parse_comprehension(ComprehensionKind::Array, first)?;
            self.expect(&Token::RightBracket, "']'")?;
            return Ok(node);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.check(&Token::RightBracket) {
                break;
            }
            items.push(self.parse_expression()?);
        }
        self.expect(&Token::RightBracket, "']'")?;
        Ok(AstNode::Array(items))
    }

    fn parse_comprehension(&mut self, kind: ComprehensionKind, element: AstNode) -> ParseResult<AstNode> {
        self.expect(&Token::Keyword(Keyword::For), "'for'")?;
        let variable = match self.advance() {
            Token::Identifier(name) => name,
            _ => {
                self.current = self.current.saturating_sub(1);
                return Err(self.unexpected("loop variable"));
            }
        };
        self.expect(&Token::Keyword(Keyword::In), "'in'")?;
        let iterable = self.parse_or()?;
        let condition = if self.eat(&Token::Keyword(Keyword::If)) { Some(Box::new(self.parse_or()?)) } else { None };
        Ok(AstNode::Comprehension {
            kind,
            element: Box::new(element),
            variable,
            iterable: Box::new(iterable),
            condition,
        })
    }
}
