//! Group decoded N2K frames into timestamped rows
//!
//! Consecutive frames sharing a gateway timestamp merge into one row, later
//! values overwriting earlier ones. Address claims are left out by default.

use super::{AddressClaim, PgnRegistry};
use crate::formats::act::RawFrame;
use crate::types::{FieldValue, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// One row of the N2K timeseries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeseriesRow {
    /// Gateway timestamp shared by every frame in the row
    #[serde(rename = "_N2KTS")]
    pub timestamp: u32,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// Incremental row builder
pub struct TimeseriesBuilder<'r> {
    registry: &'r PgnRegistry,
    allowed: HashSet<u32>,
    current: Option<TimeseriesRow>,
}

impl<'r> TimeseriesBuilder<'r> {
    /// Accept every supported PGN except address claims
    pub fn new(registry: &'r PgnRegistry) -> Self {
        let allowed = registry
            .supported_pgns()
            .into_iter()
            .filter(|pgn| *pgn != AddressClaim::PGN)
            .collect();
        Self {
            registry,
            allowed,
            current: None,
        }
    }

    /// Accept only the listed PGNs
    pub fn with_pgns(registry: &'r PgnRegistry, pgns: &[u32]) -> Self {
        Self {
            registry,
            allowed: pgns.iter().copied().collect(),
            current: None,
        }
    }

    /// Add a frame, returning the previous row if this frame starts a new one
    pub fn push(&mut self, frame: &RawFrame) -> Option<TimeseriesRow> {
        if !self.allowed.contains(&frame.pgn) {
            return None;
        }
        let message = self.registry.decode(frame)?;

        let mut finished = None;
        let start_new = match &self.current {
            Some(row) => row.timestamp != frame.timestamp,
            None => true,
        };
        if start_new {
            finished = self.current.replace(TimeseriesRow {
                timestamp: frame.timestamp,
                fields: BTreeMap::new(),
            });
        }
        if let Some(row) = self.current.as_mut() {
            row.fields.extend(message.fields());
        }
        finished
    }

    /// Flush the row in progress
    pub fn finish(&mut self) -> Option<TimeseriesRow> {
        self.current.take()
    }
}

/// Iterator adapter producing rows from a frame stream
pub struct Timeseries<'r, I> {
    frames: I,
    builder: TimeseriesBuilder<'r>,
    done: bool,
}

impl<'r, I> Timeseries<'r, I>
where
    I: Iterator<Item = Result<RawFrame>>,
{
    pub fn new(frames: I, builder: TimeseriesBuilder<'r>) -> Self {
        Self {
            frames,
            builder,
            done: false,
        }
    }
}

impl<'r, I> Iterator for Timeseries<'r, I>
where
    I: Iterator<Item = Result<RawFrame>>,
{
    type Item = Result<TimeseriesRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.frames.next() {
                Some(Ok(frame)) => {
                    if let Some(row) = self.builder.push(&frame) {
                        return Some(Ok(row));
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.done = true;
                    return self.builder.finish().map(Ok);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wind(ts: u32, speed_raw: i16) -> RawFrame {
        let mut data = vec![0];
        data.extend_from_slice(&speed_raw.to_le_bytes());
        data.extend_from_slice(&[0, 0, 2]);
        RawFrame::new(2, 130306, 255, 1, ts, data)
    }

    fn depth(ts: u32) -> RawFrame {
        let mut data = vec![0];
        data.extend_from_slice(&500i32.to_le_bytes());
        data.extend_from_slice(&[0, 0, 1]);
        RawFrame::new(3, 128267, 255, 2, ts, data)
    }

    fn claim(ts: u32) -> RawFrame {
        RawFrame::new(6, 60928, 255, 3, ts, vec![0; 8])
    }

    #[test]
    fn test_rows_group_by_timestamp() {
        let registry = PgnRegistry::standard().unwrap();
        let frames = vec![wind(10, 100), depth(10), wind(10, 200), claim(20), wind(30, 300)];
        let rows: Vec<TimeseriesRow> = Timeseries::new(
            frames.into_iter().map(Ok),
            TimeseriesBuilder::new(&registry),
        )
        .collect::<Result<_>>()
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, 10);
        assert!((rows[0].fields["WindSpeed"].as_f64() - 2.0).abs() < 1e-9);
        assert!((rows[0].fields["Depth"].as_f64() - 5.0).abs() < 1e-9);
        assert_eq!(rows[1].timestamp, 30);
        assert!(!rows[1].fields.contains_key("ISO-ID"));
    }

    #[test]
    fn test_pgn_allow_list() {
        let registry = PgnRegistry::standard().unwrap();
        let mut builder = TimeseriesBuilder::with_pgns(&registry, &[AddressClaim::PGN]);
        assert!(builder.push(&wind(1, 1)).is_none());
        assert!(builder.push(&claim(1)).is_none());
        let row = builder.finish().unwrap();
        assert!(row.fields.contains_key("ISO-ID"));
        assert!(!row.fields.contains_key("WindSpeed"));
    }
}
