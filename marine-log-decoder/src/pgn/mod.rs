//! NMEA 2000 message decoding
//!
//! [`PgnRegistry`] maps parameter group numbers to decode functions. Each PGN
//! may be registered once; the standard registry covers every message type
//! defined in [`messages`].

pub mod fields;
pub mod messages;
pub mod timeseries;

pub use messages::{
    AddressClaim, BearingRef, CourseSpeed, DateTimeMessage, Environment, GnssPosition,
    Heading, HumiditySource, Orientation, PgnMessage, PositionRapid, RateOfTurn,
    TemperatureSource, WaterDepth, Wind, WindReference,
};
pub use timeseries::{Timeseries, TimeseriesBuilder, TimeseriesRow};

use crate::formats::act::{FrameHeader, RawFrame};
use crate::types::{DecoderError, FieldValue, Result};
use std::collections::HashMap;
use std::fmt;

/// Signature shared by every registered decoder
pub type DecodeFn = fn(&RawFrame) -> Option<DecodedMessage>;

/// A decoded frame, one variant per supported PGN
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    AddressClaim(AddressClaim),
    Heading(Heading),
    RateOfTurn(RateOfTurn),
    Orientation(Orientation),
    WaterDepth(WaterDepth),
    PositionRapid(PositionRapid),
    CourseSpeed(CourseSpeed),
    GnssPosition(GnssPosition),
    DateTime(DateTimeMessage),
    Wind(Wind),
    Environment(Environment),
}

impl DecodedMessage {
    /// Borrow the message through its common interface
    pub fn as_message(&self) -> &dyn PgnMessage {
        match self {
            DecodedMessage::AddressClaim(m) => m,
            DecodedMessage::Heading(m) => m,
            DecodedMessage::RateOfTurn(m) => m,
            DecodedMessage::Orientation(m) => m,
            DecodedMessage::WaterDepth(m) => m,
            DecodedMessage::PositionRapid(m) => m,
            DecodedMessage::CourseSpeed(m) => m,
            DecodedMessage::GnssPosition(m) => m,
            DecodedMessage::DateTime(m) => m,
            DecodedMessage::Wind(m) => m,
            DecodedMessage::Environment(m) => m,
        }
    }

    pub fn pgn(&self) -> u32 {
        self.as_message().pgn()
    }

    pub fn name(&self) -> &'static str {
        self.as_message().name()
    }

    pub fn header(&self) -> &FrameHeader {
        self.as_message().header()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.as_message().field_names()
    }

    pub fn field_values(&self) -> Vec<FieldValue> {
        self.as_message().field_values()
    }

    /// Field names paired with their values
    pub fn fields(&self) -> Vec<(String, FieldValue)> {
        self.field_names()
            .into_iter()
            .zip(self.field_values())
            .collect()
    }
}

impl fmt::Display for DecodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        write!(
            f,
            "{} (PGN {}) from 0x{:02x} at {}:",
            self.name(),
            self.pgn(),
            header.source,
            header.timestamp
        )?;
        for (name, value) in self.fields() {
            if value.is_missing() {
                write!(f, " {}=N/A", name)?;
            } else {
                write!(f, " {}={}", name, value)?;
            }
        }
        Ok(())
    }
}

/// Closed dispatch table from PGN to decoder
#[derive(Clone, Default)]
pub struct PgnRegistry {
    decoders: HashMap<u32, DecodeFn>,
}

impl fmt::Debug for PgnRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgnRegistry")
            .field("pgns", &self.supported_pgns())
            .finish()
    }
}

impl PgnRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in decoder
    pub fn standard() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(AddressClaim::PGN, |f| {
            AddressClaim::from_frame(f).map(DecodedMessage::AddressClaim)
        })?;
        registry.register(Heading::PGN, |f| Heading::from_frame(f).map(DecodedMessage::Heading))?;
        registry.register(RateOfTurn::PGN, |f| {
            RateOfTurn::from_frame(f).map(DecodedMessage::RateOfTurn)
        })?;
        registry.register(Orientation::PGN, |f| {
            Orientation::from_frame(f).map(DecodedMessage::Orientation)
        })?;
        registry.register(WaterDepth::PGN, |f| {
            WaterDepth::from_frame(f).map(DecodedMessage::WaterDepth)
        })?;
        registry.register(PositionRapid::PGN, |f| {
            PositionRapid::from_frame(f).map(DecodedMessage::PositionRapid)
        })?;
        registry.register(CourseSpeed::PGN, |f| {
            CourseSpeed::from_frame(f).map(DecodedMessage::CourseSpeed)
        })?;
        registry.register(GnssPosition::PGN, |f| {
            GnssPosition::from_frame(f).map(DecodedMessage::GnssPosition)
        })?;
        registry.register(DateTimeMessage::PGN, |f| {
            DateTimeMessage::from_frame(f).map(DecodedMessage::DateTime)
        })?;
        registry.register(Wind::PGN, |f| Wind::from_frame(f).map(DecodedMessage::Wind))?;
        registry.register(Environment::PGN, |f| {
            Environment::from_frame(f).map(DecodedMessage::Environment)
        })?;
        log::debug!("Registered {} PGN decoders", registry.len());
        Ok(registry)
    }

    /// Add a decoder; a second registration for the same PGN is an error
    pub fn register(&mut self, pgn: u32, decoder: DecodeFn) -> Result<()> {
        if self.decoders.contains_key(&pgn) {
            return Err(DecoderError::DuplicatePgn(pgn));
        }
        self.decoders.insert(pgn, decoder);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    pub fn supports(&self, pgn: u32) -> bool {
        self.decoders.contains_key(&pgn)
    }

    /// Registered PGNs in ascending order
    pub fn supported_pgns(&self) -> Vec<u32> {
        let mut pgns: Vec<u32> = self.decoders.keys().copied().collect();
        pgns.sort_unstable();
        pgns
    }

    /// Decode a frame; `None` if its PGN has no decoder
    pub fn decode(&self, frame: &RawFrame) -> Option<DecodedMessage> {
        match self.decoders.get(&frame.pgn) {
            Some(decode) => decode(frame),
            None => {
                log::trace!("No decoder for PGN {}", frame.pgn);
                None
            }
        }
    }
}
