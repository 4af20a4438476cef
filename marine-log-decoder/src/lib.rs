//! Marine Log Decoder Library
//!
//! Decodes the two input families produced by a marine data logger:
//! - N2K gateway captures: byte-stuffed frames decoded into typed PGN messages
//! - Native envelope streams: `[0x55, source, channel, data]` MessagePack
//!   messages, named through a channel map and assembled into clock-aligned
//!   records
//!
//! # Architecture
//!
//! Each stage is usable on its own:
//! - [`formats::act`] scans gateway bytes into [`RawFrame`]s
//! - [`pgn`] dispatches frames to per-PGN decoders
//! - [`envelope`] reads and writes the native stream
//! - [`sink`] tracks source/channel names and routes control messages
//! - [`assembler`] folds data messages into [`Record`]s
//!
//! [`Decoder`] wires them together for file-based use. The library never
//! prints; diagnostics go through the `log` facade.
//!
//! # Example Usage
//!
//! ```no_run
//! use marine_log_decoder::{Decoder, DecoderConfig};
//! use std::path::Path;
//!
//! let config = DecoderConfig::new().with_batch_size(10_000);
//! let decoder = Decoder::new(config).unwrap();
//!
//! let map = decoder.read_channel_map(Path::new("2024-05-01.var")).unwrap();
//! for batch in decoder.record_batches(&map, Path::new("2024-05-01.dat")).unwrap() {
//!     for record in batch.unwrap() {
//!         println!("{} {:?}", record.timestamp, record.fields);
//!     }
//! }
//! ```

// Public modules
pub mod assembler;
pub mod channel_map;
pub mod config;
pub mod decoder;
pub mod envelope;
pub mod formats;
pub mod ids;
pub mod pgn;
pub mod sink;
pub mod types;

// Re-export main types for convenience
pub use assembler::{ConverterTable, Extraction, FieldConverter, Record, RecordAssembler, RecordBatches};
pub use channel_map::{ChannelMap, SourceEntry};
pub use config::DecoderConfig;
pub use decoder::Decoder;
pub use envelope::{Envelope, EnvelopeReader, MessageSource};
pub use formats::act::{FrameHeader, FrameReader, RawFrame};
pub use formats::dat::{ExtractMode, ExtractStats};
pub use formats::state::{StateEntry, StateSnapshot};
pub use pgn::{DecodedMessage, PgnMessage, PgnRegistry, TimeseriesRow};
pub use sink::{MessageDescription, MessageKind, MessageSink};
pub use types::{DecoderError, FieldValue, Result, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
