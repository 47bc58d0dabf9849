//! Keyword-deck reader for voxel-mesher `.inp` output.
//!
//! The mesher writes Abaqus-style decks: `*KEYWORD, PARAM=VALUE` header lines
//! followed by comma- or whitespace-separated data records. Any physical line
//! that ends with a trailing comma continues on the next line, so records are
//! merged into logical lines before they are grouped into cards.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub keyword: String,
    pub parameters: Vec<Parameter>,
    pub records: Vec<Record>,
    pub line_start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub key: String,
    pub value: Option<String>,
}

/// One logical data record, possibly merged from several physical lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number of the first physical line of the record.
    pub line: usize,
    pub text: String,
}

impl Record {
    /// Fields split on commas and whitespace, empty fields dropped.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        split_fields(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// A physical-line-merged record before it is attached to a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub line: usize,
    pub text: String,
}

impl Card {
    /// Value of a header parameter, matched case-insensitively.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(key))
            .and_then(|p| p.value.as_deref())
    }

    pub fn is(&self, keyword: &str) -> bool {
        normalized_keyword(&self.keyword) == normalized_keyword(keyword)
    }
}

impl Deck {
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ParseError {
            line: 0,
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::parse_str(&raw)
    }

    pub fn parse_str(raw: &str) -> Result<Self, ParseError> {
        let lines = merge_continuations(raw);
        let mut cards: Vec<Card> = Vec::new();

        for logical in lines {
            if let Some(header) = logical.text.strip_prefix('*') {
                let header = header.trim();
                if header.is_empty() {
                    // Some writers use a bare "*" as a visual separator.
                    continue;
                }
                let (keyword, parameters) = parse_header(header, logical.line)?;
                cards.push(Card {
                    keyword,
                    parameters,
                    records: Vec::new(),
                    line_start: logical.line,
                });
                continue;
            }

            match cards.last_mut() {
                Some(card) => card.records.push(Record {
                    line: logical.line,
                    text: logical.text,
                }),
                None => debug!("line {}: data before the first card ignored", logical.line),
            }
        }

        Ok(Deck { cards })
    }

    pub fn cards_named<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Card> + 'a {
        self.cards.iter().filter(move |card| card.is(keyword))
    }
}

/// Joins every physical line ending in `,` with the next non-blank line.
///
/// Blank lines and `**` comments are dropped first. The trailing comma is
/// removed and the pieces are joined with a single space, so
/// `1, 2,\n 3` and `1, 2 3` split into the same fields.
pub fn merge_continuations(raw: &str) -> Vec<LogicalLine> {
    let mut merged = Vec::new();
    let mut pending: Option<LogicalLine> = None;

    for (index, physical) in raw.lines().enumerate() {
        let trimmed = physical.trim();
        if trimmed.is_empty() || is_comment(trimmed) {
            continue;
        }

        let mut current = match pending.take() {
            Some(mut acc) => {
                acc.text.push(' ');
                acc.text.push_str(trimmed);
                acc
            }
            None => LogicalLine {
                line: index + 1,
                text: trimmed.to_string(),
            },
        };

        if current.text.ends_with(',') {
            let keep = current.text.trim_end_matches(',').trim_end().len();
            current.text.truncate(keep);
            pending = Some(current);
        } else {
            merged.push(current);
        }
    }

    if let Some(rest) = pending {
        merged.push(rest);
    }
    merged
}

/// Splits a record on commas and whitespace.
pub fn split_fields(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
}

fn is_comment(line: &str) -> bool {
    line.starts_with("**")
}

fn parse_header(header: &str, line: usize) -> Result<(String, Vec<Parameter>), ParseError> {
    let mut parts = header.split(',');
    let (keyword_raw, spilled) = split_spilled_parameter(parts.next().unwrap_or_default().trim());
    if keyword_raw.is_empty() {
        return Err(ParseError {
            line,
            message: "empty card keyword".to_string(),
        });
    }
    let keyword = keyword_raw.to_ascii_uppercase();
    let mut parameters = Vec::new();

    for part in spilled.into_iter().chain(parts) {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        if let Some((k, v)) = item.split_once('=') {
            parameters.push(Parameter {
                key: k.trim().to_ascii_uppercase(),
                value: Some(v.trim().to_string()),
            });
        } else {
            parameters.push(Parameter {
                key: item.to_ascii_uppercase(),
                value: None,
            });
        }
    }

    Ok((keyword, parameters))
}

/// A header continued after its keyword (`*Element,` / `Type=C3D8R`) is joined
/// with a space, so the first parameter follows the keyword without a comma.
fn split_spilled_parameter(head: &str) -> (&str, Option<&str>) {
    let Some(eq) = head.find('=') else {
        return (head, None);
    };
    let before = head[..eq].trim_end();
    match before.rfind(char::is_whitespace) {
        Some(ws) => (head[..ws].trim_end(), Some(head[ws..].trim())),
        None => (head, None),
    }
}

fn normalized_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect::<String>()
        .to_ascii_uppercase()
}
