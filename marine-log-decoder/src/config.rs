//! Decoder configuration types
//!
//! This module defines the configuration shared by the frame scanner, the
//! message sink and the record assembler. Validation happens once, up front,
//! so that a bad setting fails before any input is read.

use crate::ids;
use crate::types::{DecoderError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the decoder library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Source whose timestamp channel defines record boundaries
    #[serde(default = "default_clock_source")]
    pub clock_source: u8,

    /// Number of records per emitted batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Forward control and log messages from the sink as well as data
    #[serde(default)]
    pub include_internal: bool,

    /// Add the clock source's timestamp channel as a record field
    #[serde(default)]
    pub include_clock_timestamp: bool,

    /// Drop gateway frames whose checksum does not match (default: log only)
    #[serde(default)]
    pub strict_checksum: bool,

    /// Bytes read from a gateway capture per refill
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Refill the scan buffer when fewer than this many bytes remain
    #[serde(default = "default_low_water")]
    pub low_water: usize,

    /// `log` target used for text carried on the device log channels
    #[serde(default = "default_device_log_target")]
    pub device_log_target: String,
}

fn default_clock_source() -> u8 {
    ids::SOURCE_TIMER
}

fn default_batch_size() -> usize {
    100_000
}

fn default_chunk_size() -> usize {
    1024
}

fn default_low_water() -> usize {
    100
}

fn default_device_log_target() -> String {
    "device".to_string()
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            clock_source: default_clock_source(),
            batch_size: default_batch_size(),
            include_internal: false,
            include_clock_timestamp: false,
            strict_checksum: false,
            chunk_size: default_chunk_size(),
            low_water: default_low_water(),
            device_log_target: default_device_log_target(),
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the primary clock source
    pub fn with_clock_source(mut self, source: u8) -> Self {
        self.clock_source = source;
        self
    }

    /// Builder method: set the record batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder method: forward internal messages from the sink
    pub fn with_internal_messages(mut self, enabled: bool) -> Self {
        self.include_internal = enabled;
        self
    }

    /// Builder method: include the clock timestamp as a record field
    pub fn with_clock_timestamp(mut self, enabled: bool) -> Self {
        self.include_clock_timestamp = enabled;
        self
    }

    /// Builder method: reject frames with bad checksums
    pub fn with_strict_checksum(mut self, enabled: bool) -> Self {
        self.strict_checksum = enabled;
        self
    }

    /// Builder method: set scanner chunk size and low-water mark
    pub fn with_chunking(mut self, chunk_size: usize, low_water: usize) -> Self {
        self.chunk_size = chunk_size;
        self.low_water = low_water;
        self
    }

    /// Builder method: set the `log` target for device log messages
    pub fn with_device_log_target(mut self, target: impl Into<String>) -> Self {
        self.device_log_target = target.into();
        self
    }

    /// Check settings that would otherwise fail part-way through a stream
    pub fn validate(&self) -> Result<()> {
        if self.clock_source > ids::MAX_ID {
            return Err(DecoderError::InvalidConfig(format!(
                "clock source 0x{:02x} is outside the valid source range",
                self.clock_source
            )));
        }
        if self.batch_size == 0 {
            return Err(DecoderError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(DecoderError::InvalidConfig(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if self.low_water >= self.chunk_size {
            return Err(DecoderError::InvalidConfig(format!(
                "low-water mark ({}) must be below the chunk size ({})",
                self.low_water, self.chunk_size
            )));
        }
        Ok(())
    }
}
