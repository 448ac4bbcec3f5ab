//! Identifier list input (`.csv` / `.txt`, optionally gzipped)

use std::io::{self, BufRead, Lines};
use std::path::Path;
use std::sync::atomic::Ordering;

use efdump_core::{ByteCounter, GzipReader, open_input};

use crate::vocab;

/// Identifier from one list line: the first `,` `;` or tab separated field.
///
/// Blank lines and `#` comments yield `None`.
pub fn parse_identifier_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let field = line.split([',', ';', '\t']).next()?;
    let id = vocab::strip_identifier(field);
    (!id.is_empty()).then_some(id)
}

/// Identifiers of one list file, in file order
pub struct IdentifierReader {
    lines: Lines<GzipReader>,
    counter: ByteCounter,
    total_bytes: u64,
}

impl IdentifierReader {
    /// Compressed bytes consumed so far
    pub fn bytes_read(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

impl Iterator for IdentifierReader {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) => {
                    if let Some(id) = parse_identifier_line(&line) {
                        return Some(Ok(id));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Open an identifier list; `.gz` files are decompressed.
pub fn read_identifiers(path: &Path) -> io::Result<IdentifierReader> {
    let (reader, counter, total_bytes) = open_input(path, efdump_core::is_gzip(path))?;
    Ok(IdentifierReader {
        lines: reader.lines(),
        counter,
        total_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_field_of_delimited_line() {
        assert_eq!(parse_identifier_line("118540238"), Some("118540238".into()));
        assert_eq!(
            parse_identifier_line("118540238,Goethe,1749"),
            Some("118540238".into())
        );
        assert_eq!(
            parse_identifier_line("4005728-8;Berlin"),
            Some("4005728-8".into())
        );
        assert_eq!(
            parse_identifier_line("\"118540238\"\tx"),
            Some("118540238".into())
        );
    }

    #[test]
    fn uri_is_reduced_to_identifier() {
        assert_eq!(
            parse_identifier_line("http://d-nb.info/gnd/118540238"),
            Some("118540238".into())
        );
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert_eq!(parse_identifier_line(""), None);
        assert_eq!(parse_identifier_line("   "), None);
        assert_eq!(parse_identifier_line("# exported 2018-05"), None);
        assert_eq!(parse_identifier_line(",x"), None);
    }

    #[test]
    fn reads_file_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.csv");
        std::fs::write(&path, "# header\n118540238,a\n\n4005728-8\r\n").unwrap();

        let reader = read_identifiers(&path).unwrap();
        assert_eq!(reader.total_bytes(), 33);
        let ids: Vec<String> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(ids, vec!["118540238", "4005728-8"]);
    }
}
