//! Channel-map and data files read from disk through the public API

use marine_log_decoder::{
    Decoder, DecoderConfig, Envelope, EnvelopeReader, ExtractMode, FieldValue, MessageSource,
    Record,
};
use rmpv::Value;
use std::fs;
use std::io::Write;
use tempfile::TempDir;

struct Logger {
    timer: MessageSource,
    gps: MessageSource,
    adc: MessageSource,
    mqtt: MessageSource,
}

impl Logger {
    fn new() -> Self {
        Self {
            timer: MessageSource::new(0x02, "Timer", vec![]).unwrap(),
            gps: MessageSource::new(
                0x10,
                "GPS",
                vec!["Raw".into(), "Position".into(), "Velocity".into(), "DateTime".into()],
            )
            .unwrap(),
            adc: MessageSource::new(0x20, "ADC", vec!["Volts".into()]).unwrap(),
            mqtt: MessageSource::new(0x68, "MQTT", vec!["Pump".into()]).unwrap(),
        }
    }

    fn var_messages(&self) -> Vec<Envelope> {
        [&self.timer, &self.gps, &self.adc, &self.mqtt]
            .iter()
            .flat_map(|s| vec![s.name_message(), s.channels_message()])
            .collect()
    }
}

fn write_stream(path: &std::path::Path, envelopes: &[Envelope]) {
    let mut file = fs::File::create(path).unwrap();
    for envelope in envelopes {
        file.write_all(&envelope.pack().unwrap()).unwrap();
    }
}

fn position(lat: f64, lon: f64) -> Value {
    Value::Array(
        [lon, lat, 12.0, 0.0, 2.5, 4.0]
            .iter()
            .map(|v| Value::from(*v))
            .collect(),
    )
}

fn convert(decoder: &Decoder, dir: &TempDir, data: &[Envelope]) -> Vec<Record> {
    let logger = Logger::new();
    let var_path = dir.path().join("log.var");
    let dat_path = dir.path().join("log.dat");
    write_stream(&var_path, &logger.var_messages());
    write_stream(&dat_path, data);

    let map = decoder.read_channel_map(&var_path).unwrap();
    decoder
        .record_batches(&map, &dat_path)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
        .into_iter()
        .flatten()
        .collect()
}

#[test]
fn test_records_from_files() {
    let logger = Logger::new();
    let dir = TempDir::new().unwrap();
    let data = vec![
        logger.adc.data_message(3, 1.0).unwrap(),
        logger.timer.timestamp_message(1000),
        logger.gps.data_message(4, position(51.5, -3.9)).unwrap(),
        logger.adc.data_message(3, 3.3).unwrap(),
        logger.mqtt.data_message(3, r#"{"rpm": 1200}"#).unwrap(),
        logger.timer.timestamp_message(2000),
        logger.adc.data_message(3, 3.4).unwrap(),
        logger.timer.warning_message("low battery"),
        logger.adc.data_message(3, 3.5).unwrap(),
        logger.timer.timestamp_message(3000),
    ];

    let decoder = Decoder::new(DecoderConfig::new().with_clock_timestamp(true)).unwrap();
    let records = convert(&decoder, &dir, &data);

    let keys: Vec<i64> = records.iter().map(|r| r.timestamp).collect();
    assert_eq!(keys, vec![1000, 2000, 3000]);

    let first = &records[0];
    assert_eq!(first.get("Latitude:0x10"), Some(&FieldValue::Float(51.5)));
    assert_eq!(first.get("HAcc:0x10"), Some(&FieldValue::Float(2.5)));
    assert_eq!(first.get("Volts:0x20"), Some(&FieldValue::Float(3.3)));
    assert_eq!(first.get("Pump:0x68"), Some(&FieldValue::Float(1200.0)));
    assert_eq!(first.get("Timestamp:0x02"), Some(&FieldValue::Integer(1000)));
    assert!(first.get("Velocity_N:0x10").unwrap().is_missing());

    assert_eq!(records[1].get("Volts:0x20"), Some(&FieldValue::Float(3.5)));
    assert!(records[1].get("Latitude:0x10").unwrap().is_missing());

    // Every record carries the same columns
    assert!(records.iter().all(|r| r.fields.len() == first.fields.len()));
    assert!(records[2].get("Volts:0x20").unwrap().is_missing());
}

#[test]
fn test_records_survive_corrupt_tail() {
    let logger = Logger::new();
    let dir = TempDir::new().unwrap();
    let decoder = Decoder::new(DecoderConfig::new().with_batch_size(1)).unwrap();

    let data = vec![
        logger.timer.timestamp_message(10),
        logger.adc.data_message(3, 1).unwrap(),
        logger.timer.timestamp_message(20),
    ];
    let records = convert(&decoder, &dir, &data);
    assert_eq!(records.len(), 2);

    // Append half an envelope and read again
    let dat_path = dir.path().join("log.dat");
    let tail = logger.adc.data_message(3, "truncated payload").unwrap().pack().unwrap();
    let mut file = fs::OpenOptions::new().append(true).open(&dat_path).unwrap();
    file.write_all(&tail[..tail.len() / 2]).unwrap();
    drop(file);

    let map = decoder.read_channel_map(&dir.path().join("log.var")).unwrap();
    let mut batches = decoder.record_batches(&map, &dat_path).unwrap();
    let sizes: Vec<usize> = batches.by_ref().map(|b| b.unwrap().len()).collect();
    assert_eq!(sizes, vec![1, 1]);
    assert_eq!(batches.sink().stats().rejected, 1);
}

#[test]
fn test_json_record_output() {
    let logger = Logger::new();
    let dir = TempDir::new().unwrap();
    let decoder = Decoder::new(DecoderConfig::new()).unwrap();
    let data = vec![
        logger.timer.timestamp_message(5),
        logger.mqtt.data_message(3, "not a number").unwrap(),
        logger.timer.timestamp_message(6),
    ];
    let records = convert(&decoder, &dir, &data);

    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["Timestamp"], 5);
    assert!(json["Pump:0x68"].is_null());
    assert!(json["Volts:0x20"].is_null());
}

#[test]
fn test_extract_from_file() {
    let dir = TempDir::new().unwrap();
    let n2k = MessageSource::with_data_channels(0x38, "N2K", 1).unwrap();
    let dat_path = dir.path().join("capture.dat");
    write_stream(
        &dat_path,
        &[
            n2k.name_message(),
            n2k.data_message(3, Value::Binary(b"\x10\x02\x93".to_vec())).unwrap(),
            n2k.timestamp_message(1),
            n2k.data_message(3, Value::Binary(b"\x10\x03".to_vec())).unwrap(),
        ],
    );

    let decoder = Decoder::new(DecoderConfig::new()).unwrap();
    let target = marine_log_decoder::formats::extract_path(&dat_path, 0x38, 3);
    assert!(target.ends_with("capture.s38.raw.dat"));

    let mut out = fs::File::create(&target).unwrap();
    let stats = decoder
        .extract_messages(&dat_path, 0x38, 3, ExtractMode::Data, &mut out)
        .unwrap();
    drop(out);
    assert_eq!(stats.matched, 2);
    assert_eq!(fs::read(&target).unwrap(), b"\x10\x02\x93\x10\x03");

    let mut packed = Vec::new();
    decoder
        .extract_messages(&dat_path, 0x38, 2, ExtractMode::Envelope, &mut packed)
        .unwrap();
    let back: Vec<Envelope> = EnvelopeReader::new(packed.as_slice())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(back, vec![n2k.timestamp_message(1)]);
}

#[test]
fn test_state_snapshot_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.txt");
    fs::write(&path, "5000\nlog.var\n0x20,3,10,4500,3.3\n").unwrap();

    let decoder = Decoder::new(DecoderConfig::new()).unwrap();
    let snapshot = decoder.read_state(&path).unwrap();
    assert_eq!(snapshot.var_file.as_deref(), Some("log.var"));
    assert!(snapshot.modified.is_some());

    let entry = &snapshot.entries[0];
    assert_eq!(snapshot.seconds_ago(entry), -0.5);
    let clock = snapshot.clock_time(entry).unwrap();
    assert_eq!(
        (snapshot.modified.unwrap() - clock).num_milliseconds(),
        500
    );
}
