//! Message sink: dispatches envelopes and maintains the channel map
//!
//! Control messages (name, channel map, timestamp) update the map owned by
//! the sink; device log messages are re-emitted through `log`; everything else
//! is data and is passed back to the caller.

use crate::channel_map::ChannelMap;
use crate::config::DecoderConfig;
use crate::envelope::Envelope;
use crate::ids;
use crate::types::format_data;
use rmpv::Value;
use serde::Serialize;

/// Role of a message, derived from its channel id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Name,
    ChannelMap,
    Timestamp,
    Log(log::Level),
    Data,
}

impl MessageKind {
    pub fn of(channel: u8) -> Self {
        match channel {
            ids::CHANNEL_NAME => MessageKind::Name,
            ids::CHANNEL_MAP => MessageKind::ChannelMap,
            ids::CHANNEL_TIMESTAMP => MessageKind::Timestamp,
            ids::CHANNEL_LOG_INFO => MessageKind::Log(log::Level::Info),
            ids::CHANNEL_LOG_WARN => MessageKind::Log(log::Level::Warn),
            ids::CHANNEL_LOG_ERROR => MessageKind::Log(log::Level::Error),
            _ => MessageKind::Data,
        }
    }

    pub fn is_control(&self) -> bool {
        !matches!(self, MessageKind::Data)
    }
}

/// A message with its ids resolved to names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageDescription {
    pub source_id: u8,
    pub source_name: String,
    pub channel_id: u8,
    pub channel_name: String,
    pub data: String,
}

/// Counters for one stream pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub processed: u64,
    pub data: u64,
    pub control: u64,
    pub rejected: u64,
}

/// Stateful dispatcher for one stream pass
pub struct MessageSink {
    map: ChannelMap,
    include_internal: bool,
    log_target: String,
    stats: SinkStats,
}

impl Default for MessageSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSink {
    pub fn new() -> Self {
        Self::with_config(&DecoderConfig::default())
    }

    pub fn with_config(config: &DecoderConfig) -> Self {
        Self {
            map: ChannelMap::new(),
            include_internal: config.include_internal,
            log_target: config.device_log_target.clone(),
            stats: SinkStats::default(),
        }
    }

    /// Builder method: pass control messages through as well as data
    pub fn with_internal_messages(mut self, enabled: bool) -> Self {
        self.include_internal = enabled;
        self
    }

    pub fn channel_map(&self) -> &ChannelMap {
        &self.map
    }

    pub fn into_channel_map(self) -> ChannelMap {
        self.map
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// Process one envelope
    ///
    /// Returns the envelope if it is a data message, or for any message when
    /// internal messages are included.
    pub fn process(&mut self, envelope: Envelope) -> Option<Envelope> {
        self.stats.processed += 1;
        self.map.ensure_source(envelope.source);

        let kind = MessageKind::of(envelope.channel);
        match kind {
            MessageKind::Name => {
                let name = value_to_string(&envelope.data);
                log::trace!(
                    "New name for {}: {}",
                    self.map.source_name(envelope.source),
                    name
                );
                self.map.set_source_name(envelope.source, name);
            }
            MessageKind::ChannelMap => match &envelope.data {
                Value::Array(items) => {
                    let channels: Vec<String> = items.iter().map(value_to_string).collect();
                    log::trace!(
                        "New channels for {}: {:?}",
                        self.map.source_name(envelope.source),
                        channels
                    );
                    self.map.set_channel_names(envelope.source, channels);
                }
                other => log::warn!(
                    "Ignoring channel map for {} that is not a list: {}",
                    self.map.source_name(envelope.source),
                    format_data(other)
                ),
            },
            MessageKind::Timestamp => match timestamp_value(&envelope.data) {
                Some(ts) => self.map.update_timestamp(envelope.source, ts),
                None => log::warn!(
                    "Ignoring non-numeric timestamp from {}: {}",
                    self.map.source_name(envelope.source),
                    format_data(&envelope.data)
                ),
            },
            MessageKind::Log(level) => {
                log::log!(
                    target: self.log_target.as_str(),
                    level,
                    "{}",
                    self.format_message(&envelope)
                );
            }
            MessageKind::Data => {}
        }

        if kind.is_control() {
            self.stats.control += 1;
            if !self.include_internal {
                return None;
            }
        } else {
            self.stats.data += 1;
        }
        Some(envelope)
    }

    /// Unpack and process one MessagePack-encoded envelope
    ///
    /// Malformed input is logged and skipped.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Option<Envelope> {
        match Envelope::unpack(bytes) {
            Ok(envelope) => self.process(envelope),
            Err(e) => {
                self.reject(&e);
                log::debug!("Rejected bytes: {:02x?}", bytes);
                None
            }
        }
    }

    /// Record a message that could not be decoded
    pub fn reject(&mut self, error: &crate::types::DecoderError) {
        self.stats.rejected += 1;
        log::warn!("Bad message encountered, skipping: {}", error);
    }

    /// `"<source name>\t<channel name>\t<data>"`
    pub fn format_message(&self, envelope: &Envelope) -> String {
        format!(
            "{}\t{}\t{}",
            self.map.source_name(envelope.source),
            self.map.channel_name(envelope.source, envelope.channel),
            format_data(&envelope.data)
        )
    }

    pub fn describe(&self, envelope: &Envelope) -> MessageDescription {
        MessageDescription {
            source_id: envelope.source,
            source_name: self.map.source_name(envelope.source),
            channel_id: envelope.channel,
            channel_name: self.map.channel_name(envelope.source, envelope.channel),
            data: format_data(&envelope.data),
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        other => format_data(other),
    }
}

fn timestamp_value(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => n.as_i64(),
        Value::F32(v) if v.is_finite() => Some(*v as i64),
        Value::F64(v) if v.is_finite() => Some(*v as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(source: u8, channel: u8, data: impl Into<Value>) -> Envelope {
        Envelope::new(source, channel, data).unwrap()
    }

    #[test]
    fn test_message_kinds() {
        assert_eq!(MessageKind::of(0), MessageKind::Name);
        assert_eq!(MessageKind::of(2), MessageKind::Timestamp);
        assert_eq!(MessageKind::of(126), MessageKind::Log(log::Level::Warn));
        assert_eq!(MessageKind::of(3), MessageKind::Data);
        assert!(!MessageKind::of(124).is_control());
    }

    #[test]
    fn test_control_messages_update_map() {
        let mut sink = MessageSink::new();
        assert!(sink.process(env(0x10, 0, "GPS")).is_none());
        let channels = Value::Array(
            ["Name", "Channels", "Timestamp", "Raw", "Position"]
                .iter()
                .map(|s| Value::from(*s))
                .collect(),
        );
        assert!(sink.process(env(0x10, 1, channels)).is_none());
        assert!(sink.process(env(0x10, 2, 12345)).is_none());
        assert!(sink.process(env(0x10, 125, "hello")).is_none());

        let map = sink.channel_map();
        let entry = map.get(0x10).unwrap();
        assert_eq!(entry.name, "GPS");
        assert_eq!(entry.channels.len(), 5);
        assert_eq!(entry.last_timestamp, 12345);

        let data = sink.process(env(0x10, 4, 1.5)).unwrap();
        assert_eq!(sink.format_message(&data), "GPS\tPosition\t1.5");
        assert_eq!(sink.stats().control, 4);
        assert_eq!(sink.stats().data, 1);
    }

    #[test]
    fn test_unknown_names_use_placeholders() {
        let mut sink = MessageSink::new();
        let msg = sink.process(env(0x33, 9, "x")).unwrap();
        let desc = sink.describe(&msg);
        assert_eq!(desc.source_name, "[0x33]");
        assert_eq!(desc.channel_name, "[0x09]");
        assert_eq!(desc.data, "x");
    }

    #[test]
    fn test_internal_messages_pass_through() {
        let mut sink = MessageSink::new().with_internal_messages(true);
        let msg = sink.process(env(0x02, 2, 1000)).unwrap();
        assert_eq!(msg.channel, ids::CHANNEL_TIMESTAMP);
        assert_eq!(sink.channel_map().get(0x02).unwrap().last_timestamp, 1000);
    }

    #[test]
    fn test_malformed_bytes_are_skipped() {
        let mut sink = MessageSink::new();
        assert!(sink.process_bytes(&[0xc1, 0x00]).is_none());
        assert!(sink.process_bytes(&[0x93, 0x01, 0x02, 0x03]).is_none());
        assert_eq!(sink.stats().rejected, 2);

        let good = env(0x20, 3, 7).pack().unwrap();
        assert!(sink.process_bytes(&good).is_some());
    }
}
