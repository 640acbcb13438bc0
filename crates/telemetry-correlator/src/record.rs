//! Typed send/receive records and their correlation id.

use attack_channel::AttackMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Correlation id of one record. Numeric ids sort ascending and before any
/// non-numeric id; non-numeric ids sort lexicographically after them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Numeric(u64),
    Text(String),
}

impl RecordId {
    pub fn parse(s: &str) -> Self {
        match s.parse::<u64>() {
            Ok(n) => Self::Numeric(n),
            Err(_) => Self::Text(s.to_string()),
        }
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        Self::Numeric(n)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One transmitted payload, logged before it enters the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// MSB-first '0'/'1' expansion of the text's byte encoding.
    pub bits: String,
    pub attack_type: AttackMode,
}

impl SentRecord {
    pub fn new(id: RecordId, text: &str, attack_type: AttackMode) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            text: text.to_string(),
            bits: frame_sync::bit_string(text.as_bytes()),
            attack_type,
        }
    }
}

/// One payload recovered on the receive side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecvRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub bits: String,
}

impl RecvRecord {
    pub fn new(id: RecordId, text: &str) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            text: text.to_string(),
            bits: frame_sync::bit_string(text.as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_ordering() {
        let mut ids = vec![
            RecordId::parse("beacon"),
            RecordId::parse("10"),
            RecordId::parse("2"),
            RecordId::parse("alpha"),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                RecordId::Numeric(2),
                RecordId::Numeric(10),
                RecordId::Text("alpha".into()),
                RecordId::Text("beacon".into()),
            ]
        );
    }

    #[test]
    fn test_sent_record_bits_match_text() {
        let rec = SentRecord::new(7.into(), "a", AttackMode::None);
        assert_eq!(rec.bits, "01100001");
        assert_eq!(rec.id.to_string(), "7");
    }
}
