//! Directive values: `Name` or `Name(arguments)`

use std::sync::OnceLock;

use regex::Regex;
use xdt_traits::{Error, Result};

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\A\s*(?P<name>\w+)(\s*\((?P<arguments>.*)\))?\s*\z")
            .expect("directive pattern is valid")
    })
}

/// A parsed `xdt:Transform` or `xdt:Locator` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    /// Text between the parentheses; `None` when absent or empty
    pub arguments: Option<String>,
}

impl Directive {
    pub fn parse(value: &str) -> Result<Self> {
        let captures = directive_regex()
            .captures(value)
            .ok_or_else(|| Error::BadArgumentSyntax(value.to_string()))?;
        let name = captures
            .name("name")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let arguments = captures
            .name("arguments")
            .map(|m| m.as_str())
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        Ok(Self { name, arguments })
    }
}

/// Split an argument string on top-level `,` or `;`.
///
/// Separators inside parentheses, brackets or quotes do not split. Every
/// argument is trimmed.
pub fn split_arguments(arguments: &str) -> Result<Vec<String>> {
    if arguments.trim().is_empty() {
        return Ok(Vec::new());
    }
    let bad = || Error::BadArgumentSyntax(arguments.to_string());

    let mut result = Vec::new();
    let mut closers: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, c) in arguments.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => closers.push(')'),
            '[' => closers.push(']'),
            ')' | ']' => {
                if closers.pop() != Some(c) {
                    return Err(bad());
                }
            }
            ',' | ';' if closers.is_empty() => {
                result.push(arguments[start..index].trim().to_string());
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    if quote.is_some() || !closers.is_empty() {
        return Err(bad());
    }
    result.push(arguments[start..].trim().to_string());
    Ok(result)
}
