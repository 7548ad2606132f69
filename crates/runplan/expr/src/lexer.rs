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

//! Tokenizer for global expressions

use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::position::{Position, PositionTracker};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Identifier(String),
    Keyword(Keyword),
    Operator(Operator),
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Comment(String),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    True,
    False,
    None,
    And,
    Or,
    Not,
    If,
    Else,
    For,
    In,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        let keyword = match word {
            "True" => Self::True,
            "False" => Self::False,
            "None" => Self::None,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "if" => Self::If,
            "else" => Self::Else,
            "for" => Self::For,
            "in" => Self::In,
            _ => return None,
        };
        Some(keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Power,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Assign,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::DoubleSlash => "//",
            Self::Percent => "%",
            Self::Power => "**",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Assign => "=",
        };
        f.write_str(symbol)
    }
}

/// A token together with where it started and the text that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub lexeme: String,
    pub position: Position,
    /// Byte offset of the lexeme in the source
    pub offset: usize,
}

/// Tokenize an expression, dropping comments
pub fn tokenize(input: &str) -> ParseResult<Vec<Spanned>> {
    Ok(tokenize_with_comments(input)?.into_iter().filter(|t| !matches!(t.token, Token::Comment(_))).collect())
}

/// Tokenize an expression, keeping `#` comments as tokens
pub fn tokenize_with_comments(input: &str) -> ParseResult<Vec<Spanned>> {
    let mut tracker = PositionTracker::new(input);
    let mut tokens = Vec::new();

    loop {
        tracker.skip_whitespace();
        let start = tracker.byte_offset();
        let position = tracker.position();

        let Some(ch) = tracker.next_char() else {
            tokens.push(Spanned {
                token: Token::Eof,
                lexeme: String::new(),
                position,
                offset: start,
            });
            return Ok(tokens);
        };

        let token = match ch {
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '[' => Token::LeftBracket,
            ']' => Token::RightBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '+' => Token::Operator(Operator::Plus),
            '-' => Token::Operator(Operator::Minus),
            '%' => Token::Operator(Operator::Percent),
            '*' => {
                if tracker.peek_char() == Some('*') {
                    tracker.next_char();
                    Token::Operator(Operator::Power)
                } else {
                    Token::Operator(Operator::Star)
                }
            }
            '/' => {
                if tracker.peek_char() == Some('/') {
                    tracker.next_char();
                    Token::Operator(Operator::DoubleSlash)
                } else {
                    Token::Operator(Operator::Slash)
                }
            }
            '=' => {
                if tracker.peek_char() == Some('=') {
                    tracker.next_char();
                    Token::Operator(Operator::Equal)
                } else {
                    Token::Operator(Operator::Assign)
                }
            }
            '!' => {
                if tracker.peek_char() == Some('=') {
                    tracker.next_char();
                    Token::Operator(Operator::NotEqual)
                } else {
                    return Err(ParseError::new(ParseErrorKind::InvalidCharacter, position, "'!' must be followed by '='"));
                }
            }
            '<' => {
                if tracker.peek_char() == Some('=') {
                    tracker.next_char();
                    Token::Operator(Operator::LessEqual)
                } else {
                    Token::Operator(Operator::Less)
                }
            }
            '>' => {
                if tracker.peek_char() == Some('=') {
                    tracker.next_char();
                    Token::Operator(Operator::GreaterEqual)
                } else {
                    Token::Operator(Operator::Greater)
                }
            }
            '#' => {
                while let Some(next) = tracker.peek_char() {
                    if next == '\n' {
                        break;
                    }
                    tracker.next_char();
                }
                Token::Comment(tracker.slice(start, tracker.byte_offset()).to_string())
            }
            '"' | '\'' => scan_string(&mut tracker, ch, position)?,
            '.' if tracker.peek_char().is_some_and(|c| c.is_ascii_digit()) => scan_number(&mut tracker, start, position)?,
            c if c.is_ascii_digit() => scan_number(&mut tracker, start, position)?,
            c if is_identifier_start(c) => {
                while tracker.peek_char().is_some_and(is_identifier_continue) {
                    tracker.next_char();
                }
                let word = tracker.slice(start, tracker.byte_offset());
                match Keyword::from_word(word) {
                    Some(keyword) => Token::Keyword(keyword),
                    None => Token::Identifier(word.to_string()),
                }
            }
            other => {
                return Err(ParseError::new(ParseErrorKind::InvalidCharacter, position, format!("unexpected character '{other}'")));
            }
        };

        tokens.push(Spanned {
            token,
            lexeme: tracker.slice(start, tracker.byte_offset()).to_string(),
            position,
            offset: start,
        });
    }
}

fn scan_number(tracker: &mut PositionTracker<'_>, start: usize, position: Position) -> ParseResult<Token> {
    let mut is_float = tracker.slice(start, tracker.byte_offset()) == ".";

    while tracker.peek_char().is_some_and(|c| c.is_ascii_digit()) {
        tracker.next_char();
    }
    if !is_float && tracker.peek_char() == Some('.') {
        is_float = true;
        tracker.next_char();
        while tracker.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            tracker.next_char();
        }
    }
    if matches!(tracker.peek_char(), Some('e') | Some('E')) {
        let signed = matches!(tracker.peek_second(), Some('+') | Some('-'));
        tracker.next_char();
        if signed {
            tracker.next_char();
        }
        if !tracker.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            return Err(ParseError::new(ParseErrorKind::InvalidNumber, position, "exponent has no digits"));
        }
        while tracker.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            tracker.next_char();
        }
        is_float = true;
    }
    if tracker.peek_char().is_some_and(is_identifier_start) {
        return Err(ParseError::new(ParseErrorKind::InvalidNumber, position, "invalid decimal literal"));
    }

    let text = tracker.slice(start, tracker.byte_offset());
    if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|e| ParseError::new(ParseErrorKind::InvalidNumber, position, e.to_string()))
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|e| ParseError::new(ParseErrorKind::InvalidNumber, position, e.to_string()))
    }
}

fn scan_string(tracker: &mut PositionTracker<'_>, quote: char, position: Position) -> ParseResult<Token> {
    let mut value = String::new();
    loop {
        match tracker.next_char() {
            None | Some('\n') => {
                return Err(ParseError::new(ParseErrorKind::UnterminatedString, position, "string literal is not terminated"));
            }
            Some(c) if c == quote => return Ok(Token::Str(value)),
            Some('\\') => match tracker.next_char() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('\\') => value.push('\\'),
                Some('\'') => value.push('\''),
                Some('"') => value.push('"'),
                Some(other) => {
                    value.push('\\');
                    value.push(other);
                }
                None => {
                    return Err(ParseError::new(ParseErrorKind::UnterminatedString, position, "string literal is not terminated"));
                }
            },
            Some(c) => value.push(c),
        }
    }
}

/// Check if a character is a valid identifier start
pub fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Check if a character is a valid identifier continuation
pub fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when `name` lexes to exactly one identifier token.
///
/// Whitespace is rejected up front since a trailing newline would otherwise
/// vanish in the tokenizer.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.chars().any(char::is_whitespace) {
        return false;
    }
    match tokenize(name) {
        Ok(tokens) => matches!(tokens.as_slice(), [Spanned { token: Token::Identifier(_), .. }, Spanned { token: Token::Eof, .. }]),
        Err(_) => false,
    }
}
