//! Logger state snapshot files
//!
//! ```text
//! 123456789            <- device timestamp, ms
//! 2024-05-01.var       <- optional channel map file name
//! 0x10,0x04,1520,123456000,[51.5, -3.9]
//! 16,5,1520,123455900
//! ```
//! Rows are `source,channel,count,last[,value]`; integers may carry a `0x`,
//! `0o` or `0b` prefix.

use crate::types::{DecoderError, Result, Timestamp};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Statistics for one (source, channel) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateEntry {
    pub source: u8,
    pub channel: u8,
    pub count: u64,
    /// Device timestamp of the most recent message, ms
    pub last_timestamp: i64,
    pub value: Option<String>,
}

/// A [`StateEntry`] with its age resolved against the snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRow {
    #[serde(flatten)]
    pub entry: StateEntry,
    pub seconds_ago: f64,
    pub clock_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// Device timestamp when the snapshot was written, ms
    pub timestamp: i64,
    pub var_file: Option<String>,
    pub entries: Vec<StateEntry>,
    /// File modification time, used to anchor device time to wall-clock time
    pub modified: Option<Timestamp>,
}

impl StateSnapshot {
    /// Parse snapshot text
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(n, l)| (n + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        let (_, first) = lines
            .next()
            .ok_or_else(|| DecoderError::StateParseError("empty file".to_string()))?;
        let timestamp = parse_int(first).ok_or_else(|| {
            DecoderError::StateParseError(format!("invalid timestamp '{}'", first))
        })?;

        let mut var_file = None;
        let mut entries = Vec::new();
        for (index, (line_no, line)) in lines.enumerate() {
            if index == 0 && !line.contains(',') {
                var_file = Some(line.to_string());
                continue;
            }
            entries.push(parse_row(line_no, line)?);
        }

        log::debug!(
            "State snapshot at {} with {} entries",
            timestamp,
            entries.len()
        );
        Ok(Self {
            timestamp,
            var_file,
            entries,
            modified: None,
        })
    }

    /// Read and parse a snapshot file, recording its modification time
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut snapshot = Self::parse(&text)?;
        snapshot.modified = fs::metadata(path)?.modified().ok().map(DateTime::<Utc>::from);
        Ok(snapshot)
    }

    /// Seconds between the snapshot and the entry's last message (negative
    /// for messages before the snapshot)
    pub fn seconds_ago(&self, entry: &StateEntry) -> f64 {
        match entry.last_timestamp.checked_sub(self.timestamp) {
            Some(ms) => ms as f64 / 1000.0,
            None => (entry.last_timestamp as f64 - self.timestamp as f64) / 1000.0,
        }
    }

    /// Estimated wall-clock time of the entry's last message; `None` without
    /// a modification time or when the offset leaves chrono's range
    pub fn clock_time(&self, entry: &StateEntry) -> Option<Timestamp> {
        let modified = self.modified?;
        let offset = entry.last_timestamp.checked_sub(self.timestamp)?;
        modified.checked_add_signed(TimeDelta::try_milliseconds(offset)?)
    }

    pub fn rows(&self) -> Vec<StateRow> {
        self.entries
            .iter()
            .map(|entry| StateRow {
                entry: entry.clone(),
                seconds_ago: self.seconds_ago(entry),
                clock_time: self
                    .clock_time(entry)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            })
            .collect()
    }
}

fn parse_row(line_no: usize, line: &str) -> Result<StateEntry> {
    let bad = |what: &str| {
        DecoderError::StateParseError(format!("line {}: {} in '{}'", line_no, what, line))
    };

    let mut parts = line.splitn(5, ',').map(str::trim);
    let mut next_int = |name: &str| -> Result<i64> {
        let field = parts.next().ok_or_else(|| bad(&format!("missing {}", name)))?;
        parse_int(field).ok_or_else(|| bad(&format!("invalid {}", name)))
    };

    let source = next_int("source")?;
    let channel = next_int("channel")?;
    let count = next_int("count")?;
    let last_timestamp = next_int("last timestamp")?;
    let value = parts.next().filter(|v| !v.is_empty()).map(str::to_string);

    let source = u8::try_from(source).map_err(|_| bad("source out of range"))?;
    let channel = u8::try_from(channel).map_err(|_| bad("channel out of range"))?;
    let count = u64::try_from(count).map_err(|_| bad("negative count"))?;

    Ok(StateEntry {
        source,
        channel,
        count,
        last_timestamp,
        value,
    })
}

/// Integer with an optional base prefix
fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let lower = digits.to_ascii_lowercase();
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        lower.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "100000\n2024-05-01.var\n0x10,0x04,1520,99000,[51.5, -3.9]\n16,5,12,100500\n";

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0x10"), Some(16));
        assert_eq!(parse_int("16"), Some(16));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("-0x2"), Some(-2));
        assert_eq!(parse_int("ten"), None);
    }

    #[test]
    fn test_parse_snapshot() {
        let snapshot = StateSnapshot::parse(SAMPLE).unwrap();
        assert_eq!(snapshot.timestamp, 100_000);
        assert_eq!(snapshot.var_file.as_deref(), Some("2024-05-01.var"));
        assert_eq!(snapshot.entries.len(), 2);

        let first = &snapshot.entries[0];
        assert_eq!((first.source, first.channel, first.count), (0x10, 4, 1520));
        assert_eq!(first.value.as_deref(), Some("[51.5, -3.9]"));
        assert_eq!(snapshot.seconds_ago(first), -1.0);
        assert_eq!(snapshot.entries[1].value, None);
        assert_eq!(snapshot.seconds_ago(&snapshot.entries[1]), 0.5);
    }

    #[test]
    fn test_without_var_file() {
        let snapshot = StateSnapshot::parse("5\n1,3,1,5\n").unwrap();
        assert!(snapshot.var_file.is_none());
        assert_eq!(snapshot.entries.len(), 1);
    }

    #[test]
    fn test_clock_time() {
        let mut snapshot = StateSnapshot::parse(SAMPLE).unwrap();
        assert!(snapshot.clock_time(&snapshot.entries[0]).is_none());

        snapshot.modified = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single();
        let rows = snapshot.rows();
        assert_eq!(rows[0].clock_time.as_deref(), Some("2024-05-01 11:59:59"));
        assert_eq!(rows[1].seconds_ago, 0.5);
    }

    #[test]
    fn test_extreme_timestamps() {
        let mut snapshot = StateSnapshot::parse("0\n0x20,3,10,9223372036854775000,1\n").unwrap();
        snapshot.modified = Some(Utc::now());
        let rows = snapshot.rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].clock_time.is_none());
        assert!(rows[0].seconds_ago > 9.0e15);

        let snapshot =
            StateSnapshot::parse("-9223372036854775000\n0x20,3,10,9223372036854775000,1\n")
                .unwrap();
        let entry = &snapshot.entries[0];
        assert!(snapshot.seconds_ago(entry) > 1.8e16);
        assert!(snapshot.clock_time(entry).is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(StateSnapshot::parse("").is_err());
        assert!(StateSnapshot::parse("abc\n").is_err());
        assert!(StateSnapshot::parse("1\n1,2\n").is_err());
        assert!(StateSnapshot::parse("1\n300,2,1,1\n").is_err());
    }
}
