//! Scanner for the raw text of a single start tag

/// An attribute as it appears in start tag text
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScannedAttribute {
    pub name: String,
    /// `name="value"` exactly as written
    pub raw: String,
    /// Text between the quotes, still escaped
    pub raw_value: String,
    /// 1-based line of the name, relative to the tag
    pub line: usize,
    /// 1-based column of the name, relative to the tag
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScannedTag {
    pub name: String,
    pub attributes: Vec<ScannedAttribute>,
    /// 1-based character position of `/` in `/>`, or of `>`
    pub terminal: usize,
    pub self_closing: bool,
}

struct Cursor<'a> {
    text: &'a str,
    byte: usize,
    line: usize,
    column: usize,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.byte..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.byte += c.len_utf8();
        self.position += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_name(&mut self) -> &'a str {
        let start = self.byte;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && c != '=' && c != '/' && c != '>')
        {
            self.bump();
        }
        &self.text[start..self.byte]
    }
}

/// Enumerate the attributes of `<name a="1" ...>` or `<name .../>`.
///
/// Returns `None` when the text is not a single well-formed start tag.
pub(crate) fn scan_start_tag(tag: &str) -> Option<ScannedTag> {
    let mut cursor = Cursor {
        text: tag,
        byte: 0,
        line: 1,
        column: 1,
        position: 1,
    };
    if cursor.bump()? != '<' {
        return None;
    }
    let name = cursor.take_name().to_string();
    if name.is_empty() {
        return None;
    }

    let mut attributes = Vec::new();
    loop {
        cursor.skip_whitespace();
        match cursor.peek()? {
            '>' => {
                return Some(ScannedTag {
                    name,
                    attributes,
                    terminal: cursor.position,
                    self_closing: false,
                });
            }
            '/' => {
                let terminal = cursor.position;
                cursor.bump();
                if cursor.peek()? != '>' {
                    return None;
                }
                return Some(ScannedTag {
                    name,
                    attributes,
                    terminal,
                    self_closing: true,
                });
            }
            _ => {}
        }

        let (line, column, start) = (cursor.line, cursor.column, cursor.byte);
        let attr_name = cursor.take_name();
        if attr_name.is_empty() {
            return None;
        }
        cursor.skip_whitespace();
        if cursor.bump()? != '=' {
            return None;
        }
        cursor.skip_whitespace();
        let quote = cursor.bump()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let value_start = cursor.byte;
        while cursor.peek()? != quote {
            cursor.bump();
        }
        let value_end = cursor.byte;
        cursor.bump();
        attributes.push(ScannedAttribute {
            name: attr_name.to_string(),
            raw: tag[start..cursor.byte].to_string(),
            raw_value: tag[value_start..value_end].to_string(),
            line,
            column,
        });
    }
}
