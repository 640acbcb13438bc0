//! Append-only CSV stores for sent and received records.
//!
//! Each store is a single CSV file with a fixed header row. Appends open
//! the file, write one row, and close it, so a concurrent reader sees an
//! eventually-consistent append-only view and never a torn row. Malformed
//! data rows are skipped with a warning on load; only a wrong header row
//! (a schema mismatch) is a hard error.

use crate::record::{RecordId, RecvRecord, SentRecord};
use crate::{Result, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const SENT_HEADER: &str = "id,timestamp,text,bits,attack_type";
pub const RECV_HEADER: &str = "id,timestamp,text,bits";

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Quote a field per RFC 4180 when it contains a delimiter, quote, or
/// line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split file contents into records. Quote state carries across line
/// breaks, so a quoted field may span physical lines; a newline outside
/// quotes terminates the record. Empty lines are skipped.
fn split_records(contents: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = contents.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut current)),
                '\r' if chars.peek() == Some(&'\n') => {}
                '\n' => {
                    if fields.is_empty() && current.is_empty() {
                        continue;
                    }
                    fields.push(std::mem::take(&mut current));
                    records.push(std::mem::take(&mut fields));
                }
                _ => current.push(c),
            }
        }
    }
    if !fields.is_empty() || !current.is_empty() {
        fields.push(current);
        records.push(fields);
    }
    records
}

/// Common header-validated CSV file handling behind both stores.
struct CsvFile {
    path: PathBuf,
    header: &'static str,
}

impl CsvFile {
    fn open(path: PathBuf, header: &'static str) -> Result<Self> {
        let file = Self { path, header };
        match fs::metadata(&file.path) {
            Ok(meta) if meta.len() > 0 => file.validate_header()?,
            _ => file.write_header()?,
        }
        Ok(file)
    }

    fn write_header(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, format!("{}\n", self.header))?;
        Ok(())
    }

    fn validate_header(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let found = contents.lines().next().unwrap_or("").trim_end();
        if found != self.header {
            return Err(StoreError::SchemaMismatch {
                path: self.path.clone(),
                expected: self.header,
                found: found.to_string(),
            });
        }
        Ok(())
    }

    fn append_row(&self, fields: &[&str]) -> Result<()> {
        let row = fields.iter().map(|f| escape(f)).collect::<Vec<_>>().join(",");
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{row}")?;
        Ok(())
    }

    /// All data rows, split into fields. The header row is skipped.
    fn rows(&self) -> Result<Vec<Vec<String>>> {
        let contents = fs::read_to_string(&self.path)?;
        let mut records = split_records(&contents);
        if !records.is_empty() {
            records.remove(0);
        }
        Ok(records)
    }

    fn reset(&self) -> Result<()> {
        self.write_header()
    }
}

/// Append-only store of transmitted payloads.
pub struct SentStore {
    file: CsvFile,
}

impl SentStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            file: CsvFile::open(path.into(), SENT_HEADER)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn append(&self, record: &SentRecord) -> Result<()> {
        self.file.append_row(&[
            &record.id.to_string(),
            &format_timestamp(record.timestamp),
            &record.text,
            &record.bits,
            &record.attack_type.to_string(),
        ])
    }

    pub fn load(&self) -> Result<Vec<SentRecord>> {
        let mut records = Vec::new();
        for fields in self.file.rows()? {
            let [id, ts, text, bits, attack] = match <[String; 5]>::try_from(fields) {
                Ok(f) => f,
                Err(bad) => {
                    warn!(path = %self.file.path.display(), fields = bad.len(), "skipping malformed sent row");
                    continue;
                }
            };
            let (Some(timestamp), Ok(attack_type)) = (parse_timestamp(&ts), attack.parse()) else {
                warn!(path = %self.file.path.display(), %id, "skipping unparseable sent row");
                continue;
            };
            records.push(SentRecord {
                id: RecordId::parse(&id),
                timestamp,
                text,
                bits,
                attack_type,
            });
        }
        Ok(records)
    }

    pub fn reset(&self) -> Result<()> {
        self.file.reset()
    }
}

/// Append-only store of recovered payloads.
pub struct RecvStore {
    file: CsvFile,
}

impl RecvStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            file: CsvFile::open(path.into(), RECV_HEADER)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn append(&self, record: &RecvRecord) -> Result<()> {
        self.file.append_row(&[
            &record.id.to_string(),
            &format_timestamp(record.timestamp),
            &record.text,
            &record.bits,
        ])
    }

    pub fn load(&self) -> Result<Vec<RecvRecord>> {
        let mut records = Vec::new();
        for fields in self.file.rows()? {
            let [id, ts, text, bits] = match <[String; 4]>::try_from(fields) {
                Ok(f) => f,
                Err(bad) => {
                    warn!(path = %self.file.path.display(), fields = bad.len(), "skipping malformed recv row");
                    continue;
                }
            };
            let Some(timestamp) = parse_timestamp(&ts) else {
                warn!(path = %self.file.path.display(), %id, "skipping unparseable recv row");
                continue;
            };
            records.push(RecvRecord {
                id: RecordId::parse(&id),
                timestamp,
                text,
                bits,
            });
        }
        Ok(records)
    }

    pub fn reset(&self) -> Result<()> {
        self.file.reset()
    }
}
