//! Position-tracking replay over raw markup

use std::iter::Peekable;
use std::str::Chars;

/// Reads text one character at a time, keeping the 1-based line, column and
/// character position of the next character.
#[derive(Debug)]
pub struct PositionTracker<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    position: usize,
}

impl<'a> PositionTracker<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
            column: 1,
            position: 1,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn read(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.position += 1;
        Some(c)
    }

    fn at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    /// Advance until the next character is at `(line, column)`.
    /// Returns false when the text ends first or the position was passed.
    pub fn read_to_line_column(&mut self, line: usize, column: usize, mut on_read: impl FnMut(char)) -> bool {
        while self.line < line && !self.at_end() {
            if let Some(c) = self.read() {
                on_read(c);
            }
        }
        while self.line == line && self.column < column && !self.at_end() {
            if let Some(c) = self.read() {
                on_read(c);
            }
        }
        self.line == line && self.column == column
    }

    /// Advance until the next character is at character position `position`
    pub fn read_to_offset(&mut self, position: usize, mut on_read: impl FnMut(char)) -> bool {
        while self.position < position && !self.at_end() {
            if let Some(c) = self.read() {
                on_read(c);
            }
        }
        self.position == position
    }
}

/// Position tracker that remembers the run of whitespace read most recently
#[derive(Debug)]
pub struct WhitespaceTracker<'a> {
    inner: PositionTracker<'a>,
    preceding: String,
}

impl<'a> WhitespaceTracker<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            inner: PositionTracker::new(text),
            preceding: String::new(),
        }
    }

    /// Whitespace between the last non-whitespace character and the
    /// current position
    pub fn preceding_whitespace(&self) -> &str {
        &self.preceding
    }

    pub fn read_to_line_column(&mut self, line: usize, column: usize) -> bool {
        let preceding = &mut self.preceding;
        self.inner
            .read_to_line_column(line, column, |c| track(preceding, c))
    }

    pub fn read_to_offset(&mut self, position: usize) -> bool {
        let preceding = &mut self.preceding;
        self.inner.read_to_offset(position, |c| track(preceding, c))
    }
}

fn track(preceding: &mut String, c: char) {
    if c.is_whitespace() {
        preceding.push(c);
    } else {
        preceding.clear();
    }
}
