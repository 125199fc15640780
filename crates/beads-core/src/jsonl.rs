//! JSONL (JSON Lines) read/write support.
//!
//! Each line in a JSONL file is a complete JSON object. Generic over any
//! serializable row type so the same codec serves issues, dependencies,
//! labels, events, comments, and config rows during export/import/backup.

use std::io::{self, BufRead, Write};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Error type for JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
}

/// Result alias for JSONL operations.
pub type Result<T> = std::result::Result<T, JsonlError>;

/// Writes rows as JSONL to the given writer.
///
/// Each row is written as a single JSON line followed by a newline.
pub fn write_jsonl<W: Write, T: Serialize>(writer: &mut W, rows: &[T]) -> Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *writer, row)
            .map_err(|e| JsonlError::Json { line: 0, source: e })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Returns an iterator that reads rows of type `T` from a JSONL reader.
///
/// Each line is parsed as a JSON object. Empty lines are skipped.
pub fn read_jsonl<R: BufRead, T: DeserializeOwned>(reader: R) -> JsonlIter<R, T> {
    JsonlIter {
        reader,
        line_number: 0,
        _marker: PhantomData,
    }
}

/// Iterator over JSONL-encoded rows of type `T`.
pub struct JsonlIter<R, T> {
    reader: R,
    line_number: usize,
    _marker: PhantomData<T>,
}

impl<R: BufRead, T: DeserializeOwned> Iterator for JsonlIter<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None, // EOF
                Ok(_) => {
                    self.line_number += 1;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue; // skip empty lines
                    }
                    match serde_json::from_str::<T>(trimmed) {
                        Ok(row) => return Some(Ok(row)),
                        Err(e) => {
                            return Some(Err(JsonlError::Json {
                                line: self.line_number,
                                source: e,
                            }));
                        }
                    }
                }
                Err(e) => return Some(Err(JsonlError::Io(e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Issue, IssueBuilder};
    use std::io::BufReader;

    #[test]
    fn write_and_read_roundtrip() {
        let issues = vec![
            IssueBuilder::new("Issue 1")
                .id("bd-001")
                .priority(1)
                .build(),
            IssueBuilder::new("Issue 2")
                .id("bd-002")
                .priority(2)
                .build(),
        ];

        let mut buf = Vec::new();
        write_jsonl(&mut buf, &issues).unwrap();

        let reader = BufReader::new(buf.as_slice());
        let read_back: Vec<Issue> = read_jsonl(reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].title, "Issue 1");
        assert_eq!(read_back[1].title, "Issue 2");
    }

    #[test]
    fn read_skips_empty_lines() {
        let data = b"{\"title\":\"A\"}\n\n{\"title\":\"B\"}\n";
        let reader = BufReader::new(data.as_slice());
        let results: Vec<Issue> = read_jsonl(reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn read_reports_line_number_on_error() {
        let data = b"{\"title\":\"A\"}\nnot-json\n";
        let reader = BufReader::new(data.as_slice());
        let results: Vec<Result<Issue>> = read_jsonl(reader).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(JsonlError::Json { line, .. }) => assert_eq!(*line, 2),
            other => panic!("expected JSON error, got {:?}", other),
        }
    }

    #[test]
    fn write_and_read_generic_rows() {
        let rows: Vec<(String, String)> = vec![
            ("key.one".into(), "value one".into()),
            ("key.two".into(), "value two".into()),
        ];
        let mut buf = Vec::new();
        write_jsonl(&mut buf, &rows).unwrap();

        let reader = BufReader::new(buf.as_slice());
        let read_back: Vec<(String, String)> = read_jsonl(reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(read_back, rows);
    }
}
