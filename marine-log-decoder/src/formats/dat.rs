//! Native data (`.dat`) and channel-map (`.var`) files
//!
//! Both are plain envelope streams. A `.var` file holds the control messages
//! that name every source and channel; the `.dat` file holds the data.

use crate::channel_map::ChannelMap;
use crate::config::DecoderConfig;
use crate::envelope::{Envelope, EnvelopeReader};
use crate::ids;
use crate::sink::MessageSink;
use crate::types::{DecoderError, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Name this library uses for the conversion source (0x01)
pub const CONVERTER_NAME: &str = "marine-log";

/// A sink with the logger (0x00) and converter (0x01) sources already named
pub fn seeded_sink(config: &DecoderConfig, converter_name: &str) -> Result<MessageSink> {
    let mut sink = MessageSink::with_config(config);
    sink.process(Envelope::new(ids::SOURCE_LOCAL, ids::CHANNEL_NAME, "Logger")?);
    sink.process(Envelope::new(
        ids::SOURCE_CONVERTER,
        ids::CHANNEL_NAME,
        converter_name,
    )?);
    Ok(sink)
}

/// Run a channel-map stream through a fresh sink and return the final map
pub fn read_channel_map<R: Read>(reader: R, config: &DecoderConfig) -> Result<ChannelMap> {
    let mut sink = seeded_sink(config, CONVERTER_NAME)?;
    for item in EnvelopeReader::new(reader) {
        match item {
            Ok(envelope) => {
                sink.process(envelope);
            }
            Err(e @ DecoderError::IoError(_)) => return Err(e),
            Err(e) => sink.reject(&e),
        }
    }
    let map = sink.into_channel_map();
    log::info!("Channel map with {} sources", map.len());
    Ok(map)
}

/// What [`extract_messages`] writes for each matching message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Payload bytes of binary or string messages, concatenated
    Data,
    /// Matching envelopes re-packed as MessagePack
    Envelope,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub matched: u64,
    /// Matching messages with no byte payload (data mode only)
    pub skipped: u64,
    pub bytes: u64,
}

/// Copy the messages of one (source, channel) pair to `writer`
pub fn extract_messages<R: Read, W: Write>(
    reader: R,
    writer: &mut W,
    source: u8,
    channel: u8,
    mode: ExtractMode,
) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();
    for item in EnvelopeReader::new(reader) {
        let envelope = match item {
            Ok(envelope) => envelope,
            Err(e @ DecoderError::IoError(_)) => return Err(e),
            Err(e) => {
                log::warn!("Bad message encountered, skipping: {}", e);
                continue;
            }
        };
        if envelope.source != source || envelope.channel != channel {
            continue;
        }
        stats.matched += 1;

        let packed;
        let bytes = match mode {
            ExtractMode::Data => match envelope.data_bytes() {
                Some(bytes) => bytes,
                None => {
                    stats.skipped += 1;
                    continue;
                }
            },
            ExtractMode::Envelope => {
                packed = envelope.pack()?;
                packed.as_slice()
            }
        };
        writer.write_all(bytes)?;
        stats.bytes += bytes.len() as u64;
    }
    writer.flush()?;

    if stats.skipped > 0 {
        log::warn!(
            "{} messages from 0x{:02x}/0x{:02x} carried no byte payload",
            stats.skipped,
            source,
            channel
        );
    }
    log::info!(
        "Extracted {} messages ({} bytes) from 0x{:02x}/0x{:02x}",
        stats.matched - stats.skipped,
        stats.bytes,
        source,
        channel
    );
    Ok(stats)
}

/// Default output path for an extraction: `<stem>.sXX.cYY.dat`, or
/// `<stem>.sXX.raw.dat` for the raw channel
pub fn extract_path(data_file: &Path, source: u8, channel: u8) -> PathBuf {
    let stem = data_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = if channel == ids::CHANNEL_RAW {
        format!("{}.s{:02x}.raw.dat", stem, source)
    } else {
        format!("{}.s{:02x}.c{:02x}.dat", stem, source, channel)
    };
    data_file.with_file_name(name)
}
