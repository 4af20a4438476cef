//! Record assembly
//!
//! Groups a message stream into one record per primary clock tick. Messages
//! arriving after the tick at time `T` and before the next tick belong to the
//! record keyed `T`; within a record the last message written to a field wins.
//!
//! Which fields exist, and how each message's data maps onto them, is decided
//! up front by a [`ConverterTable`] derived from the stream's channel map.

use crate::channel_map::ChannelMap;
use crate::envelope::Envelope;
use crate::ids::{self, SourceClass};
use crate::sink::MessageSink;
use crate::types::{DecoderError, FieldValue, Result};
use rmpv::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// How one output field is derived from a message's data
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The data as-is
    Whole,
    /// One element of an array
    Element(usize),
    /// `data * scale + offset`
    Linear { scale: f64, offset: f64 },
    /// A number carried as text or as single-key JSON
    ParseNumber,
    /// `YYYY-MM-DD` from elements 0..3 of a GPS date/time array
    GpsDate,
    /// `hh:mm:ss.ffffff` from elements 3..7
    GpsTime,
    /// Zero-padded accuracy estimate from element 7
    GpsDateAccuracy,
}

impl Extraction {
    pub fn apply(&self, data: &Value) -> FieldValue {
        match self {
            Extraction::Whole => FieldValue::from_msgpack(data),
            Extraction::Element(index) => element(data, *index)
                .map_or(FieldValue::Missing, FieldValue::from_msgpack),
            Extraction::Linear { scale, offset } => {
                let raw = FieldValue::from_msgpack(data).as_f64();
                FieldValue::Float(raw * scale + offset)
            }
            Extraction::ParseNumber => FieldValue::Float(parse_number(data)),
            Extraction::GpsDate => match numbers(data, 0..3) {
                Some(v) => FieldValue::Text(format!("{:04.0}-{:02.0}-{:02.0}", v[0], v[1], v[2])),
                None => FieldValue::Missing,
            },
            Extraction::GpsTime => match numbers(data, 3..7) {
                Some(v) => FieldValue::Text(format!(
                    "{:02.0}:{:02.0}:{:02.0}.{:06.0}",
                    v[0], v[1], v[2], v[3]
                )),
                None => FieldValue::Missing,
            },
            Extraction::GpsDateAccuracy => match numbers(data, 7..8) {
                Some(v) => FieldValue::Text(format!("{:09.0}", v[0])),
                None => FieldValue::Missing,
            },
        }
    }
}

fn element(data: &Value, index: usize) -> Option<&Value> {
    data.as_array().and_then(|items| items.get(index))
}

fn numbers(data: &Value, range: std::ops::Range<usize>) -> Option<Vec<f64>> {
    let items = data.as_array()?;
    items
        .get(range)?
        .iter()
        .map(|v| {
            let n = FieldValue::from_msgpack(v).as_f64();
            if n.is_nan() {
                None
            } else {
                Some(n)
            }
        })
        .collect()
}

/// Number from a text payload: plain, `{"key": n}` or `{"value": n, ...}`
fn parse_number(data: &Value) -> f64 {
    let text = match data {
        Value::String(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        other => return FieldValue::from_msgpack(other).as_f64(),
    };
    if let Ok(v) = text.trim().parse::<f64>() {
        return v;
    }
    let json: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(_) => return f64::NAN,
    };
    let inner = match json.as_object() {
        Some(obj) if obj.len() == 1 => obj.values().next(),
        Some(obj) => obj.get("value"),
        None => None,
    };
    match inner {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Output fields for one (source, channel) pair
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConverter {
    pub source: u8,
    pub channel: u8,
    pub fields: Vec<(String, Extraction)>,
}

impl FieldConverter {
    pub fn new(source: u8, channel: u8) -> Self {
        Self {
            source,
            channel,
            fields: Vec::new(),
        }
    }

    /// Builder method: add an output field
    pub fn with_field(mut self, name: impl Into<String>, extraction: Extraction) -> Self {
        self.fields.push((name.into(), extraction));
        self
    }

    /// Single field holding the whole message
    pub fn whole(source: u8, channel: u8, name: &str) -> Self {
        Self::new(source, channel).with_field(field_name(name, source), Extraction::Whole)
    }
}

/// `"<channel>:0x<source>"`
pub fn field_name(channel: &str, source: u8) -> String {
    format!("{}:0x{:02x}", channel, source)
}

/// Every field converter for one stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConverterTable {
    converters: BTreeMap<(u8, u8), FieldConverter>,
}

impl ConverterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive converters from a finished channel map
    pub fn from_channel_map(map: &ChannelMap, clock_source: u8, include_timestamp: bool) -> Self {
        let mut table = Self::new();
        for entry in map.sources() {
            let src = entry.id;
            let named = entry
                .channels
                .iter()
                .enumerate()
                .filter_map(|(cid, name)| u8::try_from(cid).ok().map(|c| (c, name.as_str())))
                .filter(|(_, name)| !name.is_empty());

            if src == clock_source {
                if include_timestamp {
                    table.insert(FieldConverter::whole(src, ids::CHANNEL_TIMESTAMP, "Timestamp"));
                }
                for (cid, name) in named.filter(|(cid, _)| *cid > ids::CHANNEL_TIMESTAMP) {
                    table.insert(FieldConverter::whole(src, cid, name));
                }
                continue;
            }

            let class = ids::source_class(src);
            if class == SourceClass::Other {
                if src >= ids::SOURCE_TIMER {
                    log::info!(
                        "No conversion routine known for source 0x{:02x} ({})",
                        src,
                        entry.name
                    );
                }
                continue;
            }

            for (cid, name) in named {
                if cid == ids::CHANNEL_NAME || cid == ids::CHANNEL_MAP {
                    continue;
                }
                if cid == ids::CHANNEL_TIMESTAMP {
                    table.insert(FieldConverter::whole(src, cid, "Timestamp"));
                    continue;
                }
                let converter = match (class, cid) {
                    (SourceClass::Gps, 4) => gps_position(src),
                    (SourceClass::Gps, 5) => gps_velocity(src),
                    (SourceClass::Gps, 6) => gps_date_time(src),
                    (SourceClass::Mqtt, _) => FieldConverter::new(src, cid)
                        .with_field(field_name(name, src), Extraction::ParseNumber),
                    _ => FieldConverter::whole(src, cid, name),
                };
                table.insert(converter);
            }
        }
        log::debug!(
            "{} converters producing {} fields",
            table.len(),
            table.field_names().len()
        );
        table
    }

    /// Add or replace the converter for its (source, channel) pair
    pub fn insert(&mut self, converter: FieldConverter) {
        self.converters
            .insert((converter.source, converter.channel), converter);
    }

    pub fn get(&self, source: u8, channel: u8) -> Option<&FieldConverter> {
        self.converters.get(&(source, channel))
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Every output field, ordered by source, channel, then position
    pub fn field_names(&self) -> Vec<String> {
        self.converters
            .values()
            .flat_map(|c| c.fields.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    fn empty_fields(&self) -> BTreeMap<String, FieldValue> {
        self.field_names()
            .into_iter()
            .map(|name| (name, FieldValue::Missing))
            .collect()
    }

    /// Write the fields derived from `envelope` into `fields`; false if no
    /// converter applies
    fn apply(&self, envelope: &Envelope, fields: &mut BTreeMap<String, FieldValue>) -> bool {
        match self.get(envelope.source, envelope.channel) {
            Some(converter) => {
                for (name, extraction) in &converter.fields {
                    fields.insert(name.clone(), extraction.apply(&envelope.data));
                }
                true
            }
            None => false,
        }
    }
}

fn gps_position(src: u8) -> FieldConverter {
    FieldConverter::new(src, 4)
        .with_field(field_name("Longitude", src), Extraction::Element(0))
        .with_field(field_name("Latitude", src), Extraction::Element(1))
        .with_field(field_name("Height", src), Extraction::Element(2))
        .with_field(field_name("HAcc", src), Extraction::Element(4))
        .with_field(field_name("VAcc", src), Extraction::Element(5))
}

fn gps_velocity(src: u8) -> FieldConverter {
    FieldConverter::new(src, 5)
        .with_field(field_name("Velocity_N", src), Extraction::Element(0))
        .with_field(field_name("Velocity_E", src), Extraction::Element(1))
        .with_field(field_name("Velocity_D", src), Extraction::Element(2))
        .with_field(field_name("SpeedAcc", src), Extraction::Element(5))
        .with_field(field_name("Heading", src), Extraction::Element(4))
        .with_field(field_name("HeadAcc", src), Extraction::Element(6))
}

fn gps_date_time(src: u8) -> FieldConverter {
    FieldConverter::new(src, 6)
        .with_field(field_name("Date", src), Extraction::GpsDate)
        .with_field(field_name("Time", src), Extraction::GpsTime)
        .with_field(field_name("DTAcc", src), Extraction::GpsDateAccuracy)
}

/// Field values for one clock interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Clock source time that opened the interval
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Folds messages into records at each change of the primary clock
pub struct RecordAssembler {
    table: ConverterTable,
    clock_source: u8,
    /// Timestamp and fields of the interval currently open
    open: Option<(i64, BTreeMap<String, FieldValue>)>,
    /// Messages received since the last tick
    pending: usize,
    discarded: u64,
}

impl RecordAssembler {
    pub fn new(table: ConverterTable, clock_source: u8) -> Self {
        Self {
            table,
            clock_source,
            open: None,
            pending: 0,
            discarded: 0,
        }
    }

    pub fn table(&self) -> &ConverterTable {
        &self.table
    }

    /// Messages dropped because no interval was open yet
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn is_tick(&self, envelope: &Envelope) -> bool {
        envelope.source == self.clock_source && envelope.channel == ids::CHANNEL_TIMESTAMP
    }

    /// Feed one message; returns the completed record when it closes an interval
    pub fn push(&mut self, envelope: &Envelope) -> Option<Record> {
        if self.is_tick(envelope) {
            let time = match FieldValue::from_msgpack(&envelope.data).as_i64() {
                Some(t) => t,
                None => {
                    log::warn!("Ignoring non-numeric clock tick: {}", envelope);
                    return None;
                }
            };

            let completed = match self.open.take() {
                Some((current, fields)) if current == time => {
                    self.open = Some((current, fields));
                    None
                }
                Some((current, fields)) => Some(Record {
                    timestamp: current,
                    fields,
                }),
                None => {
                    if self.discarded > 0 {
                        log::debug!(
                            "{} messages before the first clock tick discarded",
                            self.discarded
                        );
                    }
                    None
                }
            };

            if self.open.is_none() {
                self.open = Some((time, self.table.empty_fields()));
                self.pending = 0;
            }
            if let Some((_, fields)) = self.open.as_mut() {
                self.table.apply(envelope, fields);
            }
            return completed;
        }

        match self.open.as_mut() {
            Some((_, fields)) => {
                self.table.apply(envelope, fields);
                self.pending += 1;
            }
            None => self.discarded += 1,
        }
        None
    }

    /// Close the stream
    ///
    /// The last interval has no closing tick, so only the tick itself is kept;
    /// any other messages received after it are dropped.
    pub fn finish(&mut self) -> Option<Record> {
        let (timestamp, _) = self.open.take()?;
        if self.pending > 0 {
            log::debug!(
                "Out of data - {} messages abandoned beyond last timestamp",
                self.pending
            );
        }
        self.pending = 0;

        let mut fields = self.table.empty_fields();
        if let Some(converter) = self.table.get(self.clock_source, ids::CHANNEL_TIMESTAMP) {
            let tick = Value::from(timestamp);
            for (name, extraction) in &converter.fields {
                fields.insert(name.clone(), extraction.apply(&tick));
            }
        }
        Some(Record { timestamp, fields })
    }
}

/// Batches of records from an envelope stream
///
/// Owns the [`MessageSink`] for the stream; malformed envelopes are counted
/// and skipped, I/O errors end the iteration.
pub struct RecordBatches<I> {
    envelopes: I,
    sink: MessageSink,
    assembler: RecordAssembler,
    batch_size: usize,
    emitted: u64,
    done: bool,
}

impl<I> RecordBatches<I>
where
    I: Iterator<Item = Result<Envelope>>,
{
    /// `sink` should pass internal messages through so clock ticks are seen
    pub fn new(envelopes: I, sink: MessageSink, assembler: RecordAssembler, batch_size: usize) -> Self {
        Self {
            envelopes,
            sink: sink.with_internal_messages(true),
            assembler,
            batch_size: batch_size.max(1),
            emitted: 0,
            done: false,
        }
    }

    pub fn sink(&self) -> &MessageSink {
        &self.sink
    }

    /// Records emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl<I> Iterator for RecordBatches<I>
where
    I: Iterator<Item = Result<Envelope>>,
{
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut batch = Vec::new();
        loop {
            match self.envelopes.next() {
                Some(Ok(envelope)) => {
                    if let Some(envelope) = self.sink.process(envelope) {
                        if let Some(record) = self.assembler.push(&envelope) {
                            batch.push(record);
                            if batch.len() >= self.batch_size {
                                self.emitted += batch.len() as u64;
                                return Some(Ok(batch));
                            }
                        }
                    }
                }
                Some(Err(DecoderError::IoError(e))) => {
                    self.done = true;
                    return Some(Err(DecoderError::IoError(e)));
                }
                Some(Err(e)) => self.sink.reject(&e),
                None => {
                    self.done = true;
                    batch.extend(self.assembler.finish());
                    log::info!(
                        "{} records from {} messages ({} rejected)",
                        self.emitted + batch.len() as u64,
                        self.sink.stats().processed,
                        self.sink.stats().rejected
                    );
                    if batch.is_empty() {
                        return None;
                    }
                    self.emitted += batch.len() as u64;
                    return Some(Ok(batch));
                }
            }
        }
    }
}
