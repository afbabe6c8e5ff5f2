use crate::ffmetadata::error::FfMetadataError;
use crate::ffmetadata::{FfMetadata, GLOBAL_SECTION};

const HEADER_PREFIX: &str = ";FFMETADATA";
const SUPPORTED_VERSION: &str = "1";
const ESCAPE: char = '\\';

pub(crate) fn parse_ffmetadata(src: &str) -> Result<FfMetadata, FfMetadataError> {
    let mut p = Parser {
        lines: src.lines().collect(),
        pos: 0,
    };
    p.parse_header()?;

    let mut metadata = FfMetadata::new();
    let mut current = GLOBAL_SECTION.to_string();
    while let Some(line) = p.next_logical_line()? {
        match line {
            Line::Section(name) => {
                metadata.ensure_section(&name);
                current = name;
            }
            Line::Entry(key, value) => {
                metadata.ensure_section(&current).insert(key, value);
            }
        }
    }
    Ok(metadata)
}

enum Line {
    Section(String),
    Entry(String, String),
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// 1-based number of the next physical line.
    fn line_no(&self) -> usize {
        self.pos + 1
    }

    fn bump(&mut self) -> Option<&'a str> {
        let line = self.lines.get(self.pos).copied();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    fn parse_header(&mut self) -> Result<(), FfMetadataError> {
        let line_no = self.line_no();
        let header = self.bump().unwrap_or_default();
        let version = header
            .strip_prefix(HEADER_PREFIX)
            .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| FfMetadataError::new(line_no, format!("invalid header '{header}'")))?;
        if version != SUPPORTED_VERSION {
            return Err(FfMetadataError::new(
                line_no,
                format!("unsupported version {version}"),
            ));
        }
        Ok(())
    }

    /// Next section header or entry, skipping comments and blank lines.
    fn next_logical_line(&mut self) -> Result<Option<Line>, FfMetadataError> {
        loop {
            let start = self.line_no();
            let Some(first) = self.bump() else {
                return Ok(None);
            };
            if is_comment(first) {
                continue;
            }
            let text = self.continue_line(start, first.to_string())?;
            return parse_line(start, &text).map(Some);
        }
    }

    /// Join physical lines while the accumulated text ends in an unescaped backslash.
    fn continue_line(&mut self, start: usize, mut acc: String) -> Result<String, FfMetadataError> {
        if !ends_with_unescaped_backslash(&acc) {
            return Ok(acc);
        }
        acc.pop();
        let next = self
            .bump()
            .ok_or_else(|| FfMetadataError::new(start, "line continuation at end of input"))?;
        acc.push_str(next);
        self.continue_line(start, acc)
    }
}

fn is_comment(line: &str) -> bool {
    line.is_empty() || line.starts_with(';') || line.starts_with('#')
}

fn ends_with_unescaped_backslash(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == ESCAPE).count() % 2 == 1
}

fn parse_line(line_no: usize, text: &str) -> Result<Line, FfMetadataError> {
    if let Some(name) = section_name(text) {
        return Ok(Line::Section(name.to_string()));
    }
    let (key, value) = split_entry(line_no, text)?;
    let key = unescape(line_no, key)?;
    if key.is_empty() {
        return Err(FfMetadataError::new(line_no, "empty key"));
    }
    Ok(Line::Entry(key, unescape(line_no, value)?))
}

fn section_name(text: &str) -> Option<&str> {
    text.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_uppercase()))
}

/// Split at the first unescaped `=`; any further unescaped delimiter is an error.
fn split_entry(line_no: usize, text: &str) -> Result<(&str, &str), FfMetadataError> {
    let mut split = None;
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            ESCAPE => {
                chars.next();
            }
            '=' if split.is_none() => split = Some(i),
            '=' | ';' | '#' => {
                return Err(FfMetadataError::new(
                    line_no,
                    format!("unescaped '{c}' at column {}", i + 1),
                ));
            }
            _ => {}
        }
    }
    let split = split.ok_or_else(|| {
        FfMetadataError::new(line_no, format!("expected key=value, found '{text}'"))
    })?;
    Ok((&text[..split], &text[split + 1..]))
}

fn unescape(line_no: usize, token: &str) -> Result<String, FfMetadataError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('=' | ';' | '#' | ESCAPE)) => out.push(escaped),
            Some(other) => {
                return Err(FfMetadataError::new(
                    line_no,
                    format!("invalid escape sequence '\\{other}'"),
                ));
            }
            None => return Err(FfMetadataError::new(line_no, "dangling escape character")),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/ffmetadata/parser.rs"]
mod tests;
