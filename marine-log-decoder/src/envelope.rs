//! Tagged source/channel/data envelopes
//!
//! Every message in the logger's native stream is a four element MessagePack
//! array: `[0x55, source, channel, data]`. Source and channel ids are limited
//! to 0..=127.

use crate::ids;
use crate::types::{format_data, DecoderError, Result};
use rmpv::Value;
use std::fmt;
use std::io::{BufRead, BufReader, ErrorKind, Read};

/// Constant first element of every envelope
pub const MARKER: u8 = 0x55;

/// A single message from the logger's native stream
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub source: u8,
    pub channel: u8,
    pub data: Value,
}

impl Envelope {
    /// Create an envelope, checking the id ranges
    pub fn new(source: u8, channel: u8, data: impl Into<Value>) -> Result<Self> {
        if source > ids::MAX_ID || channel > ids::MAX_ID {
            return Err(DecoderError::InvalidEnvelope(format!(
                "source/channel out of range: source {}, channel {}",
                source, channel
            )));
        }
        Ok(Self {
            source,
            channel,
            data: data.into(),
        })
    }

    /// True for the reserved control and log channels
    pub fn is_control(&self) -> bool {
        ids::RESERVED_CHANNELS.contains(&self.channel)
    }

    /// Build the four element array representation
    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::from(MARKER),
            Value::from(self.source),
            Value::from(self.channel),
            self.data.clone(),
        ])
    }

    /// Validate and convert an already-decoded MessagePack value
    pub fn from_value(value: Value) -> Result<Self> {
        let mut items = match value {
            Value::Array(items) if items.len() == 4 => items,
            Value::Array(items) => {
                return Err(DecoderError::InvalidEnvelope(format!(
                    "expected 4 elements, got {}",
                    items.len()
                )))
            }
            other => {
                return Err(DecoderError::InvalidEnvelope(format!(
                    "expected an array, got {}",
                    other
                )))
            }
        };

        if items[0].as_u64() != Some(u64::from(MARKER)) {
            return Err(DecoderError::InvalidEnvelope(format!(
                "bad marker {}",
                items[0]
            )));
        }
        let source = id_from_value(&items[1], "source")?;
        let channel = id_from_value(&items[2], "channel")?;
        let data = items.pop().unwrap_or(Value::Nil);

        Ok(Self {
            source,
            channel,
            data,
        })
    }

    /// Serialise to MessagePack bytes
    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        rmpv::encode::write_value(&mut out, &self.to_value())
            .map_err(|e| DecoderError::MsgPackEncode(e.to_string()))?;
        Ok(out)
    }

    /// Deserialise from MessagePack bytes
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        let mut cursor = bytes;
        let value = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| DecoderError::MsgPackDecode(e.to_string()))?;
        Self::from_value(value)
    }

    /// Raw bytes carried by a binary or string payload
    pub fn data_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            Value::Binary(b) => Some(b.as_slice()),
            Value::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}\t{:02x}\t{}", self.source, self.channel, format_data(&self.data))
    }
}

fn id_from_value(value: &Value, what: &str) -> Result<u8> {
    match value.as_u64() {
        Some(id) if id <= u64::from(ids::MAX_ID) => Ok(id as u8),
        _ => Err(DecoderError::InvalidEnvelope(format!(
            "invalid {} id {}",
            what, value
        ))),
    }
}

/// Iterator over the envelopes in a native stream
///
/// A well-formed MessagePack value that is not a valid envelope is yielded as
/// `Err(InvalidEnvelope)` and reading continues. A value truncated by the end
/// of input is reported once, then iteration ends.
pub struct EnvelopeReader<R: Read> {
    reader: BufReader<R>,
    index: u64,
    finished: bool,
}

impl<R: Read> EnvelopeReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            index: 0,
            finished: false,
        }
    }

    /// Number of values read so far
    pub fn position(&self) -> u64 {
        self.index
    }
}

impl<R: Read> Iterator for EnvelopeReader<R> {
    type Item = Result<Envelope>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let at_end = match self.reader.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(e) => {
                self.finished = true;
                return Some(Err(e.into()));
            }
        };
        if at_end {
            self.finished = true;
            return None;
        }

        let index = self.index;
        self.index += 1;

        match rmpv::decode::read_value(&mut self.reader) {
            Ok(value) => Some(Envelope::from_value(value).map_err(|e| {
                log::debug!("Message #{} rejected: {}", index, e);
                e
            })),
            Err(e) => {
                use rmpv::decode::Error as MpError;
                match &e {
                    MpError::InvalidMarkerRead(io) | MpError::InvalidDataRead(io)
                        if io.kind() == ErrorKind::UnexpectedEof =>
                    {
                        log::warn!("Message #{} truncated by end of input", index);
                        self.finished = true;
                        Some(Err(DecoderError::MsgPackDecode(e.to_string())))
                    }
                    MpError::InvalidMarkerRead(io) | MpError::InvalidDataRead(io)
                        if io.kind() != ErrorKind::InvalidData =>
                    {
                        self.finished = true;
                        Some(Err(DecoderError::IoError(std::io::Error::new(
                            io.kind(),
                            e.to_string(),
                        ))))
                    }
                    _ => {
                        log::warn!("Undecodable data at message #{}: {}", index, e);
                        Some(Err(DecoderError::MsgPackDecode(e.to_string())))
                    }
                }
            }
        }
    }
}

/// Builds valid envelopes on behalf of a software data source
#[derive(Debug, Clone)]
pub struct MessageSource {
    source: u8,
    name: String,
    channels: Vec<String>,
}

impl MessageSource {
    /// Create a source whose data channels (from channel 3) carry the given names
    pub fn new(source: u8, name: impl Into<String>, data_channels: Vec<String>) -> Result<Self> {
        if source == 0 || source > ids::MAX_ID {
            return Err(DecoderError::InvalidEnvelope(format!(
                "invalid source id 0x{:02x}",
                source
            )));
        }
        let mut channels: Vec<String> = crate::channel_map::DEFAULT_CHANNELS
            .iter()
            .map(|s| s.to_string())
            .collect();
        channels.extend(data_channels);
        Ok(Self {
            source,
            name: name.into(),
            channels,
        })
    }

    /// Create a source with `count` data channels named `Data1..DataN`
    pub fn with_data_channels(source: u8, name: impl Into<String>, count: usize) -> Result<Self> {
        let names = (1..=count).map(|n| format!("Data{}", n)).collect();
        Self::new(source, name, names)
    }

    pub fn source(&self) -> u8 {
        self.source
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channels
    }

    fn message(&self, channel: u8, data: Value) -> Envelope {
        Envelope {
            source: self.source,
            channel,
            data,
        }
    }

    pub fn name_message(&self) -> Envelope {
        self.message(ids::CHANNEL_NAME, Value::from(self.name.as_str()))
    }

    pub fn channels_message(&self) -> Envelope {
        let names = self.channels.iter().map(|c| Value::from(c.as_str())).collect();
        self.message(ids::CHANNEL_MAP, Value::Array(names))
    }

    pub fn timestamp_message(&self, timestamp: u64) -> Envelope {
        self.message(ids::CHANNEL_TIMESTAMP, Value::from(timestamp))
    }

    pub fn info_message(&self, text: &str) -> Envelope {
        self.message(ids::CHANNEL_LOG_INFO, Value::from(text))
    }

    pub fn warning_message(&self, text: &str) -> Envelope {
        self.message(ids::CHANNEL_LOG_WARN, Value::from(text))
    }

    pub fn error_message(&self, text: &str) -> Envelope {
        self.message(ids::CHANNEL_LOG_ERROR, Value::from(text))
    }

    /// Data message on a channel that exists in this source's map
    pub fn data_message(&self, channel: u8, data: impl Into<Value>) -> Result<Envelope> {
        if usize::from(channel) >= self.channels.len() {
            return Err(DecoderError::InvalidEnvelope(format!(
                "channel {} not in map for source 0x{:02x}",
                channel, self.source
            )));
        }
        Ok(self.message(channel, data.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pack_unpack() {
        let cases = vec![
            Envelope::new(0x10, 4, Value::Array(vec![Value::from(1.5), Value::from(-2)])).unwrap(),
            Envelope::new(0x00, 0, "Logger").unwrap(),
            Envelope::new(127, 127, Value::Binary(vec![0, 1, 2])).unwrap(),
            Envelope::new(0x02, 2, 123_456_789u64).unwrap(),
        ];
        for env in cases {
            let bytes = env.pack().unwrap();
            assert_eq!(Envelope::unpack(&bytes).unwrap(), env);
        }
    }

    #[test]
    fn test_new_rejects_out_of_range_ids() {
        assert!(Envelope::new(128, 0, 1).is_err());
        assert!(Envelope::new(0, 200, 1).is_err());
    }

    #[test]
    fn test_unpack_invalid() {
        let bad_marker = Value::Array(vec![
            Value::from(0x54),
            Value::from(1),
            Value::from(1),
            Value::Nil,
        ]);
        assert!(matches!(
            Envelope::from_value(bad_marker),
            Err(DecoderError::InvalidEnvelope(_))
        ));

        let bad_source = Value::Array(vec![
            Value::from(MARKER),
            Value::from(300),
            Value::from(1),
            Value::Nil,
        ]);
        assert!(Envelope::from_value(bad_source).is_err());

        let negative_channel = Value::Array(vec![
            Value::from(MARKER),
            Value::from(1),
            Value::from(-1),
            Value::Nil,
        ]);
        assert!(Envelope::from_value(negative_channel).is_err());

        assert!(Envelope::from_value(Value::from("no")).is_err());
        assert!(Envelope::from_value(Value::Array(vec![Value::from(MARKER)])).is_err());
    }

    #[test]
    fn test_reader_skips_bad_messages() {
        let mut stream = Vec::new();
        stream.extend(Envelope::new(1, 0, "First").unwrap().pack().unwrap());
        let mut junk = Vec::new();
        rmpv::encode::write_value(&mut junk, &Value::from("junk")).unwrap();
        stream.extend(junk);
        stream.extend(Envelope::new(1, 3, 42).unwrap().pack().unwrap());

        let results: Vec<Result<Envelope>> = EnvelopeReader::new(Cursor::new(stream)).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().data, Value::from(42));
    }

    #[test]
    fn test_reader_truncated_tail() {
        let mut stream = Envelope::new(1, 3, 1).unwrap().pack().unwrap();
        let second = Envelope::new(1, 3, "a longer string payload").unwrap().pack().unwrap();
        stream.extend(&second[..second.len() - 4]);

        let mut reader = EnvelopeReader::new(Cursor::new(stream));
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_message_source() {
        let src = MessageSource::with_data_channels(0x05, "Test", 2).unwrap();
        assert_eq!(src.channel_names().len(), 5);
        assert_eq!(src.channel_names()[4], "Data2");

        let name = src.name_message();
        assert_eq!((name.source, name.channel), (0x05, ids::CHANNEL_NAME));
        assert_eq!(src.error_message("boom").channel, ids::CHANNEL_LOG_ERROR);
        assert!(src.data_message(4, 1.0).is_ok());
        assert!(src.data_message(5, 1.0).is_err());

        assert!(MessageSource::new(0, "Local", vec![]).is_err());
        assert!(MessageSource::new(0x80, "Bad", vec![]).is_err());
    }
}
