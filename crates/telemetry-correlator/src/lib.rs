//! Telemetry Correlation
//!
//! Persists every transmitted payload and every recovered payload, then
//! joins them by sequence id to classify each transmission as delivered
//! intact, corrupted, length-mismatched, or lost, with a bit error rate
//! over the compared bits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod record;
pub mod store;

pub use record::{RecordId, RecvRecord, SentRecord};
pub use store::{RecvStore, SentStore};

use attack_channel::AttackMode;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path}: header row {found:?} does not match schema {expected:?}")]
    SchemaMismatch {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Delivery classification of one sent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Ok,
    Corrupted,
    Lost,
    LengthMismatch,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Corrupted => "CORRUPTED",
            Self::Lost => "LOST",
            Self::LengthMismatch => "LENGTH_MISMATCH",
        };
        f.write_str(s)
    }
}

/// Bit error rate over the compared prefix of two bit strings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BerReport {
    pub ber: f64,
    pub compared_bits: usize,
    /// True when the bit strings differed in length and only the shorter
    /// prefix was compared.
    pub partial: bool,
}

/// Compare two '0'/'1' strings over `min(len)` bits. Two empty strings
/// compare as a degenerate zero-error match.
pub fn bit_error_rate(sent_bits: &str, recv_bits: &str) -> BerReport {
    let compared = sent_bits.len().min(recv_bits.len());
    let mismatched = sent_bits
        .bytes()
        .zip(recv_bits.bytes())
        .filter(|(a, b)| a != b)
        .count();
    BerReport {
        ber: if compared == 0 {
            0.0
        } else {
            mismatched as f64 / compared as f64
        },
        compared_bits: compared,
        partial: sent_bits.len() != recv_bits.len(),
    }
}

/// One joined sent/received pair (or an unanswered sent record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRow {
    pub id: RecordId,
    pub sent_text: String,
    pub recv_text: Option<String>,
    pub attack_type: AttackMode,
    pub status: DeliveryStatus,
    /// Absent for lost records.
    pub ber: Option<BerReport>,
    /// Wall-clock delta between the send and receive log entries, absent
    /// for lost records.
    pub rtt_ms: Option<i64>,
}

/// Joins the sent and received stores. Append-only: correlation reads both
/// stores fresh on each call and never deletes individual records.
pub struct Correlator {
    sent: SentStore,
    recv: RecvStore,
}

impl Correlator {
    pub fn open(sent_path: impl Into<PathBuf>, recv_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            sent: SentStore::open(sent_path)?,
            recv: RecvStore::open(recv_path)?,
        })
    }

    pub fn record_sent(&self, id: RecordId, text: &str, attack_type: AttackMode) -> Result<()> {
        self.sent.append(&SentRecord::new(id, text, attack_type))
    }

    pub fn record_received(&self, id: RecordId, text: &str) -> Result<()> {
        self.recv.append(&RecvRecord::new(id, text))
    }

    /// Correlate a single id. `None` when nothing was ever sent under it.
    pub fn correlate(&self, id: &RecordId) -> Result<Option<CorrelationRow>> {
        let sent = self.sent.load()?;
        let Some(sent_rec) = sent.iter().find(|r| &r.id == id) else {
            return Ok(None);
        };
        let recv = earliest_by_id(self.recv.load()?);
        Ok(Some(join(sent_rec, recv.get(id))))
    }

    /// Correlate every sent record, ordered by id (numeric ascending, then
    /// non-numeric ids).
    pub fn correlate_all(&self) -> Result<Vec<CorrelationRow>> {
        let mut sent = self.sent.load()?;
        sent.sort_by(|a, b| a.id.cmp(&b.id).then(a.timestamp.cmp(&b.timestamp)));
        let recv = earliest_by_id(self.recv.load()?);
        Ok(sent.iter().map(|s| join(s, recv.get(&s.id))).collect())
    }

    /// Truncate both stores back to their header rows.
    pub fn reset(&self) -> Result<()> {
        self.sent.reset()?;
        self.recv.reset()
    }
}

/// When an id was received more than once, the earliest receive wins.
fn earliest_by_id(records: Vec<RecvRecord>) -> HashMap<RecordId, RecvRecord> {
    let mut by_id: HashMap<RecordId, RecvRecord> = HashMap::new();
    for rec in records {
        match by_id.get(&rec.id) {
            Some(existing) if existing.timestamp <= rec.timestamp => {}
            _ => {
                by_id.insert(rec.id.clone(), rec);
            }
        }
    }
    by_id
}

fn join(sent: &SentRecord, recv: Option<&RecvRecord>) -> CorrelationRow {
    let Some(recv) = recv else {
        return CorrelationRow {
            id: sent.id.clone(),
            sent_text: sent.text.clone(),
            recv_text: None,
            attack_type: sent.attack_type,
            status: DeliveryStatus::Lost,
            ber: None,
            rtt_ms: None,
        };
    };

    let report = bit_error_rate(&sent.bits, &recv.bits);
    let status = if report.partial {
        DeliveryStatus::LengthMismatch
    } else if report.ber > 0.0 {
        DeliveryStatus::Corrupted
    } else {
        DeliveryStatus::Ok
    };
    CorrelationRow {
        id: sent.id.clone(),
        sent_text: sent.text.clone(),
        recv_text: Some(recv.text.clone()),
        attack_type: sent.attack_type,
        status,
        ber: Some(report),
        rtt_ms: Some(rtt_ms(sent.timestamp, recv.timestamp)),
    }
}

fn rtt_ms(sent: DateTime<Utc>, recv: DateTime<Utc>) -> i64 {
    (recv - sent).num_milliseconds()
}
