//! CSV export and re-import.
//!
//! The export format is fixed by the downstream spreadsheets that consume it:
//!
//! ```text
//! Sl.no,Exam Date,Batch,Subject Code,Subject Name,Register Number,Student Name
//! 1,"12-05-2024","A1","CS101","Intro","REG001","Alice"
//! ```
//!
//! Text columns are always double-quoted with inner quotes doubled. The
//! serial number is written bare unless it contains a comma, quote or line
//! break. Lines end in `\n`. Export always covers the full record set; the
//! display filter never applies here.

use crate::error::ExamError;
use crate::record::{ExamRecord, COLUMN_HEADERS};
use std::path::Path;
use tracing::info;

/// The header line, without its terminator.
pub fn csv_header() -> String {
    COLUMN_HEADERS.join(",")
}

/// Render records as CSV text (header plus one line per record).
pub fn to_csv(records: &[ExamRecord]) -> String {
    let mut out = String::with_capacity(64 * (records.len() + 1));
    out.push_str(&csv_header());
    out.push('\n');
    for record in records {
        let fields = record.fields();
        let serial = fields[0];
        if needs_quoting(serial) {
            push_quoted(&mut out, serial);
        } else {
            out.push_str(serial);
        }
        for value in &fields[1..] {
            out.push(',');
            push_quoted(&mut out, value);
        }
        out.push('\n');
    }
    out
}

fn needs_quoting(value: &str) -> bool {
    value.contains([',', '"', '\n', '\r'])
}

fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    out.push_str(&value.replace('"', "\"\""));
    out.push('"');
}

/// Write records to `path` as CSV.
///
/// Uses atomic write (temp file + rename) to prevent partial files. Parent
/// directories are created as needed.
pub async fn write_csv(path: impl AsRef<Path>, records: &[ExamRecord]) -> Result<(), ExamError> {
    let path = path.as_ref();
    let write_err = |e: std::io::Error| ExamError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, to_csv(records))
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

/// Parse CSV produced by [`to_csv`] back into records.
///
/// Accepts RFC 4180 quoting (doubled quotes, embedded commas and line
/// breaks) and both `\n` and `\r\n` terminators. The header must match
/// exactly and every row must have seven fields.
pub fn parse_csv(text: &str) -> Result<Vec<ExamRecord>, ExamError> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut rows = CsvRows::new(text);

    let header = match rows.next() {
        Some(row) => row?,
        None => {
            return Err(ExamError::CsvParse {
                line: 1,
                detail: "missing header".into(),
            })
        }
    };
    if header.fields != COLUMN_HEADERS {
        return Err(ExamError::CsvParse {
            line: header.line,
            detail: format!("unexpected header: {}", header.fields.join(",")),
        });
    }

    let mut records = Vec::new();
    for row in rows {
        let row = row?;
        let count = row.fields.len();
        let fields: [String; 7] = row.fields.try_into().map_err(|_| ExamError::CsvParse {
            line: row.line,
            detail: format!("expected 7 fields, found {count}"),
        })?;
        records.push(ExamRecord::from_fields(fields));
    }
    Ok(records)
}

struct CsvRow {
    /// 1-based line on which the row starts.
    line: usize,
    fields: Vec<String>,
}

struct CsvRows<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> CsvRows<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn read_row(&mut self) -> Result<CsvRow, ExamError> {
        let start_line = self.line;
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut was_quoted = false;

        loop {
            let Some(c) = self.chars.next() else {
                if in_quotes {
                    return Err(ExamError::CsvParse {
                        line: start_line,
                        detail: "unterminated quoted field".into(),
                    });
                }
                fields.push(field);
                return Ok(CsvRow {
                    line: start_line,
                    fields,
                });
            };

            if in_quotes {
                match c {
                    '"' if self.chars.peek() == Some(&'"') => {
                        self.chars.next();
                        field.push('"');
                    }
                    '"' => in_quotes = false,
                    '\n' => {
                        self.line += 1;
                        field.push(c);
                    }
                    _ => field.push(c),
                }
                continue;
            }

            match c {
                '"' if field.is_empty() && !was_quoted => {
                    in_quotes = true;
                    was_quoted = true;
                }
                '"' => {
                    return Err(ExamError::CsvParse {
                        line: self.line,
                        detail: "stray quote in field".into(),
                    })
                }
                ',' => {
                    fields.push(std::mem::take(&mut field));
                    was_quoted = false;
                }
                '\r' if self.chars.peek() == Some(&'\n') => {}
                '\n' => {
                    self.line += 1;
                    fields.push(field);
                    return Ok(CsvRow {
                        line: start_line,
                        fields,
                    });
                }
                _ if was_quoted => {
                    return Err(ExamError::CsvParse {
                        line: self.line,
                        detail: "text after closing quote".into(),
                    })
                }
                _ => field.push(c),
            }
        }
    }
}

impl Iterator for CsvRows<'_> {
    type Item = Result<CsvRow, ExamError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Skip blank lines between rows (and the trailing newline).
        loop {
            match self.chars.peek() {
                None => return None,
                Some('\n') => {
                    self.chars.next();
                    self.line += 1;
                }
                Some('\r') => {
                    self.chars.next();
                }
                Some(_) => break,
            }
        }
        Some(self.read_row())
    }
}
