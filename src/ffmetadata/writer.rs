use std::fmt;

use crate::ffmetadata::{FfMetadata, FfSection, GLOBAL_SECTION};

impl fmt::Display for FfMetadata {
    /// Render as `;FFMETADATA1` text: global entries first, then each named section.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ";FFMETADATA1")?;
        if let Some(global) = self.global() {
            write_entries(f, global)?;
        }
        for (name, section) in self.iter().filter(|(name, _)| *name != GLOBAL_SECTION) {
            writeln!(f, "[{name}]")?;
            write_entries(f, section)?;
        }
        Ok(())
    }
}

fn write_entries(f: &mut fmt::Formatter<'_>, section: &FfSection) -> fmt::Result {
    for (key, value) in section {
        writeln!(f, "{}={}", escape(key), escape(value))?;
    }
    Ok(())
}

fn escape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/ffmetadata/writer.rs"]
mod tests;
