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

//! Source position tracking for expression parsing

use std::fmt;

/// Represents a position in an expression's source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
}

impl Position {
    /// Create a new position
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Create a position at the beginning of the source
    pub fn start() -> Self {
        Self::new(1, 1)
    }

    /// Advance by a character (handles newlines)
    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

/// Utility for tracking position while scanning source text
#[derive(Debug, Clone)]
pub struct PositionTracker<'a> {
    position: Position,
    source: &'a str,
    byte_offset: usize,
}

impl<'a> PositionTracker<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            position: Position::start(),
            source,
            byte_offset: 0,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn is_at_end(&self) -> bool {
        self.byte_offset >= self.source.len()
    }

    /// Peek at the current character without advancing
    pub fn peek_char(&self) -> Option<char> {
        self.source[self.byte_offset..].chars().next()
    }

    /// Peek one character past the current one
    pub fn peek_second(&self) -> Option<char> {
        self.source[self.byte_offset..].chars().nth(1)
    }

    /// Advance by one character and return it
    pub fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position.advance(ch);
        self.byte_offset += ch.len_utf8();
        Some(ch)
    }

    /// Skip whitespace, returning the number of characters skipped
    pub fn skip_whitespace(&mut self) -> usize {
        let mut count = 0;
        while let Some(ch) = self.peek_char() {
            if !ch.is_whitespace() {
                break;
            }
            self.next_char();
            count += 1;
        }
        count
    }

    /// Get a slice of the source text
    pub fn slice(&self, start_offset: usize, end_offset: usize) -> &'a str {
        &self.source[start_offset..end_offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_advance() {
        let mut pos = Position::start();
        pos.advance('a');
        assert_eq!(pos, Position::new(1, 2));
        pos.advance('\n');
        assert_eq!(pos, Position::new(2, 1));
    }

    #[test]
    fn test_tracker_walks_source() {
        let mut tracker = PositionTracker::new("  ab\nc");
        assert_eq!(tracker.skip_whitespace(), 2);
        assert_eq!(tracker.next_char(), Some('a'));
        assert_eq!(tracker.peek_second(), Some('\n'));
        tracker.next_char();
        tracker.next_char();
        assert_eq!(tracker.position(), Position::new(2, 1));
        assert_eq!(tracker.slice(2, 4), "ab");
        tracker.next_char();
        assert!(tracker.is_at_end());
    }
}
