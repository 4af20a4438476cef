//! Typed NMEA 2000 messages
//!
//! Each message keeps the header of the frame it was decoded from, so the
//! sender address and gateway timestamp stay available after decoding.

use super::fields::{Payload, N2K_TO_DEGREES};
use crate::formats::act::{FrameHeader, RawFrame};
use crate::types::{FieldValue, Timestamp};
use chrono::DateTime;

/// Common interface over every decoded message
pub trait PgnMessage {
    fn pgn(&self) -> u32;

    /// Short human-readable message name
    fn name(&self) -> &'static str;

    fn header(&self) -> &FrameHeader;

    fn field_names(&self) -> Vec<String>;

    /// Values in the same order as [`field_names`](Self::field_names)
    fn field_values(&self) -> Vec<FieldValue>;
}

/// Reference for heading and course values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearingRef {
    True = 0,
    Magnetic = 1,
    Invalid = 2,
    Unknown = 3,
}

impl BearingRef {
    fn from_raw(raw: Option<u8>) -> Self {
        match raw.map(|r| r & 0x03) {
            Some(0) => BearingRef::True,
            Some(1) => BearingRef::Magnetic,
            Some(2) => BearingRef::Invalid,
            _ => BearingRef::Unknown,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Reference for wind direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindReference {
    NorthRelative = 0,
    Magnetic = 1,
    Apparent = 2,
    BoatRelative = 3,
    Invalid4 = 4,
    Invalid5 = 5,
    Invalid6 = 6,
    Unknown = 7,
}

impl WindReference {
    fn from_raw(raw: Option<u8>) -> Self {
        match raw.map(|r| r & 0x07) {
            Some(0) => WindReference::NorthRelative,
            Some(1) => WindReference::Magnetic,
            Some(2) => WindReference::Apparent,
            Some(3) => WindReference::BoatRelative,
            Some(4) => WindReference::Invalid4,
            Some(5) => WindReference::Invalid5,
            Some(6) => WindReference::Invalid6,
            _ => WindReference::Unknown,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureSource {
    Seawater,
    External,
    Internal,
    EngineRoom,
    Cabin,
    Unknown,
    /// Codes this decoder has no name for
    Other(u8),
}

impl TemperatureSource {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => TemperatureSource::Seawater,
            1 => TemperatureSource::External,
            2 => TemperatureSource::Internal,
            3 => TemperatureSource::EngineRoom,
            4 => TemperatureSource::Cabin,
            5 => TemperatureSource::Unknown,
            other => TemperatureSource::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            TemperatureSource::Seawater => 0,
            TemperatureSource::External => 1,
            TemperatureSource::Internal => 2,
            TemperatureSource::EngineRoom => 3,
            TemperatureSource::Cabin => 4,
            TemperatureSource::Unknown => 5,
            TemperatureSource::Other(code) => i64::from(code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumiditySource {
    Internal = 0,
    External = 1,
    Unknown = 2,
    Unavailable = 3,
}

impl HumiditySource {
    fn from_raw(raw: u8) -> Self {
        match raw & 0x03 {
            0 => HumiditySource::Internal,
            1 => HumiditySource::External,
            2 => HumiditySource::Unknown,
            _ => HumiditySource::Unavailable,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

fn seconds_to_datetime(seconds: f64) -> Option<Timestamp> {
    if !seconds.is_finite() {
        return None;
    }
    let secs = seconds.floor();
    let nanos = ((seconds - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

fn epoch_seconds(days: Option<u16>, seconds: f64) -> f64 {
    match days {
        Some(d) => 86400.0 * f64::from(d) + seconds,
        None => f64::NAN,
    }
}

/// PGN 60928: ISO address claim
#[derive(Debug, Clone, PartialEq)]
pub struct AddressClaim {
    pub header: FrameHeader,
    pub iso_id: Option<u32>,
    pub manufacturer: Option<u16>,
    pub instance: Option<u8>,
    pub function: Option<u8>,
    pub class: Option<u8>,
    pub configurable: Option<bool>,
    pub industry: Option<u8>,
    pub system: Option<u8>,
}

impl AddressClaim {
    pub const PGN: u32 = 60928;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        let si = p.u8(7);
        Some(Self {
            header: frame.header(),
            iso_id: p.u32(0).map(|v| v & 0x1F_FFFF),
            manufacturer: p.u16(2).map(|v| v >> 5),
            instance: p.u8(4),
            function: p.u8(5),
            // Bit 0 is reserved
            class: p.u8(6).map(|v| v & 0xFE),
            configurable: si.map(|v| v & 0x80 == 0x80),
            industry: si.map(|v| (v & 0x70) >> 4),
            system: si.map(|v| v & 0x0F),
        })
    }
}

impl PgnMessage for AddressClaim {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "Address Claim"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        [
            "ISO-ID",
            "Manufacturer",
            "Instance",
            "Function",
            "Class",
            "System",
            "Industry",
            "Configurable",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.iso_id.into(),
            self.manufacturer.into(),
            self.instance.into(),
            self.function.into(),
            self.class.into(),
            self.system.into(),
            self.industry.into(),
            self.configurable
                .map_or(FieldValue::Missing, FieldValue::Boolean),
        ]
    }
}

/// PGN 127250: vessel heading
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub header: FrameHeader,
    pub sequence: Option<u8>,
    /// Degrees
    pub heading: f64,
    pub deviation: f64,
    pub variation: f64,
    pub reference: BearingRef,
}

impl Heading {
    pub const PGN: u32 = 127250;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        Some(Self {
            header: frame.header(),
            sequence: p.u8(0),
            heading: p.unsigned(1, 16) * N2K_TO_DEGREES,
            deviation: p.signed(3, 16) * N2K_TO_DEGREES,
            variation: p.signed(5, 16) * N2K_TO_DEGREES,
            reference: BearingRef::from_raw(p.u8(7)),
        })
    }
}

impl PgnMessage for Heading {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "Heading"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        vec![
            "Heading".into(),
            "Deviation".into(),
            "Variation".into(),
            "Reference".into(),
        ]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.heading.into(),
            self.deviation.into(),
            self.variation.into(),
            FieldValue::Integer(self.reference.code()),
        ]
    }
}

/// PGN 127251: rate of turn
#[derive(Debug, Clone, PartialEq)]
pub struct RateOfTurn {
    pub header: FrameHeader,
    pub sequence: Option<u8>,
    /// Degrees per second
    pub rate: f64,
}

impl RateOfTurn {
    pub const PGN: u32 = 127251;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        Some(Self {
            header: frame.header(),
            sequence: p.u8(0),
            rate: p.signed(1, 32) / 3200.0 * N2K_TO_DEGREES,
        })
    }
}

impl PgnMessage for RateOfTurn {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "Rate of Turn"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        vec!["RateOfTurn".into()]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.rate.into()]
    }
}

/// PGN 127257: attitude
#[derive(Debug, Clone, PartialEq)]
pub struct Orientation {
    pub header: FrameHeader,
    pub sequence: Option<u8>,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Orientation {
    pub const PGN: u32 = 127257;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        Some(Self {
            header: frame.header(),
            sequence: p.u8(0),
            yaw: p.signed(1, 16) * N2K_TO_DEGREES,
            pitch: p.signed(3, 16) * N2K_TO_DEGREES,
            roll: p.signed(5, 16) * N2K_TO_DEGREES,
        })
    }
}

impl PgnMessage for Orientation {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "Attitude"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        vec!["Pitch".into(), "Roll".into(), "Yaw".into()]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.pitch.into(), self.roll.into(), self.yaw.into()]
    }
}

/// PGN 128267: water depth
#[derive(Debug, Clone, PartialEq)]
pub struct WaterDepth {
    pub header: FrameHeader,
    pub sequence: Option<u8>,
    /// Metres below transducer
    pub depth: f64,
    pub offset: f64,
    pub range: f64,
}

impl WaterDepth {
    pub const PGN: u32 = 128267;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        Some(Self {
            header: frame.header(),
            sequence: p.u8(0),
            depth: p.signed(1, 32) * 0.01,
            offset: p.signed(5, 16) * 0.01,
            range: p.signed(7, 8) * 10.0,
        })
    }
}

impl PgnMessage for WaterDepth {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "Water Depth"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        vec!["Depth".into(), "DepthOffset".into(), "DepthRange".into()]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.depth.into(), self.offset.into(), self.range.into()]
    }
}

/// PGN 129025: position, rapid update
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRapid {
    pub header: FrameHeader,
    pub latitude: f64,
    pub longitude: f64,
}

impl PositionRapid {
    pub const PGN: u32 = 129025;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        Some(Self {
            header: frame.header(),
            latitude: p.signed(0, 32) * 1e-7,
            longitude: p.signed(4, 32) * 1e-7,
        })
    }
}

impl PgnMessage for PositionRapid {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "Position, Rapid Update"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        vec!["Fast-Latitude".into(), "Fast-Longitude".into()]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.latitude.into(), self.longitude.into()]
    }
}

/// PGN 129026: course and speed over ground, rapid update
#[derive(Debug, Clone, PartialEq)]
pub struct CourseSpeed {
    pub header: FrameHeader,
    pub sequence: Option<u8>,
    pub reference: BearingRef,
    /// Degrees
    pub course: f64,
    /// Metres per second
    pub speed: f64,
}

impl CourseSpeed {
    pub const PGN: u32 = 129026;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        Some(Self {
            header: frame.header(),
            sequence: p.u8(0),
            reference: BearingRef::from_raw(p.u8(1)),
            course: p.unsigned(2, 16) * N2K_TO_DEGREES,
            speed: p.signed(4, 16) * 0.01,
        })
    }
}

impl PgnMessage for CourseSpeed {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "COG & SOG, Rapid Update"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        vec![
            "Fast-CourseOverGround".into(),
            "Fast-SpeedOverGround".into(),
            "Fast-COGSOGReference".into(),
        ]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.course.into(),
            self.speed.into(),
            FieldValue::Integer(self.reference.code()),
        ]
    }
}

/// PGN 129029: detailed GNSS position
#[derive(Debug, Clone, PartialEq)]
pub struct GnssPosition {
    pub header: FrameHeader,
    pub sequence: Option<u8>,
    /// Days since 1970-01-01
    pub days: Option<u16>,
    /// Seconds since midnight
    pub seconds: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Metres
    pub altitude: f64,
    pub gnss_type: Option<u8>,
    pub method: Option<u8>,
    pub integrity: Option<u8>,
    pub satellites: Option<u8>,
    pub hdop: f64,
    pub pdop: f64,
    pub geoid_separation: f64,
    pub reference_stations: Option<u8>,
    pub station_type: Option<u16>,
    pub station_id: Option<u16>,
    /// Age of DGNSS corrections, seconds
    pub dgnss_age: f64,
}

impl GnssPosition {
    pub const PGN: u32 = 129029;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        let type_method = p.u8(31);
        let station = p.u16(41);
        Some(Self {
            header: frame.header(),
            sequence: p.u8(0),
            days: p.u16(1),
            seconds: p.u32(3).map_or(f64::NAN, |s| f64::from(s) * 0.0001),
            latitude: p.signed(7, 64) * 1e-16,
            longitude: p.signed(15, 64) * 1e-16,
            altitude: p.signed(23, 64) * 1e-6,
            gnss_type: type_method.map(|v| v & 0x0F),
            method: type_method.map(|v| (v & 0xF0) >> 4),
            integrity: p.u8(32).map(|v| (v & 0xC0) >> 6),
            satellites: p.u8(33),
            hdop: p.signed(34, 16) * 0.01,
            pdop: p.signed(36, 16) * 0.01,
            geoid_separation: p.signed(38, 16) * 0.01,
            reference_stations: p.u8(40),
            station_type: station.map(|v| v & 0x000F),
            station_id: station.map(|v| (v & 0xFFF0) >> 4),
            dgnss_age: p.signed(43, 16) * 0.01,
        })
    }

    /// Approximate Unix time of the fix
    pub fn as_epoch_seconds(&self) -> f64 {
        epoch_seconds(self.days, self.seconds)
    }

    pub fn as_datetime(&self) -> Option<Timestamp> {
        seconds_to_datetime(self.as_epoch_seconds())
    }
}

impl PgnMessage for GnssPosition {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "GNSS Position Data"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        [
            "Latitude",
            "Longitude",
            "Altitude",
            "GNSS-System",
            "GNSS-Type",
            "HDOP",
            "PDOP",
            "GNSS-SVs",
            "GNSS-Timestamp",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.latitude.into(),
            self.longitude.into(),
            self.altitude.into(),
            self.gnss_type.into(),
            self.method.into(),
            self.hdop.into(),
            self.pdop.into(),
            self.satellites.into(),
            self.as_epoch_seconds().into(),
        ]
    }
}

/// PGN 129033: date and time
#[derive(Debug, Clone, PartialEq)]
pub struct DateTimeMessage {
    pub header: FrameHeader,
    pub days: Option<u16>,
    pub seconds: f64,
    /// Local offset from UTC; zero when out of range
    pub utc_offset_minutes: i16,
}

impl DateTimeMessage {
    pub const PGN: u32 = 129033;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        let offset = p.i16(6).unwrap_or(0);
        Some(Self {
            header: frame.header(),
            days: p.u16(0),
            seconds: p.u32(2).map_or(f64::NAN, |s| f64::from(s) * 0.0001),
            utc_offset_minutes: if offset.unsigned_abs() > 1440 { 0 } else { offset },
        })
    }

    pub fn as_epoch_seconds(&self) -> f64 {
        epoch_seconds(self.days, self.seconds)
    }

    pub fn as_datetime(&self) -> Option<Timestamp> {
        seconds_to_datetime(self.as_epoch_seconds())
    }
}

impl PgnMessage for DateTimeMessage {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "Time & Date"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        vec!["Timestamp".into()]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![self.as_epoch_seconds().into()]
    }
}

/// PGN 130306: wind data
#[derive(Debug, Clone, PartialEq)]
pub struct Wind {
    pub header: FrameHeader,
    pub sequence: Option<u8>,
    /// Metres per second
    pub speed: f64,
    /// Degrees
    pub angle: f64,
    pub reference: WindReference,
}

impl Wind {
    pub const PGN: u32 = 130306;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        Some(Self {
            header: frame.header(),
            sequence: p.u8(0),
            speed: p.signed(1, 16) * 0.01,
            angle: p.unsigned(3, 16) * N2K_TO_DEGREES,
            reference: WindReference::from_raw(p.u8(5)),
        })
    }
}

impl PgnMessage for Wind {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "Wind Data"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    fn field_names(&self) -> Vec<String> {
        vec![
            "WindSpeed".into(),
            "WindDirection".into(),
            "WindReference".into(),
        ]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.speed.into(),
            self.angle.into(),
            FieldValue::Integer(self.reference.code()),
        ]
    }
}

/// PGN 130311: environmental parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub header: FrameHeader,
    pub sequence: Option<u8>,
    pub temperature_source: Option<TemperatureSource>,
    pub humidity_source: Option<HumiditySource>,
    /// Degrees Celsius
    pub temperature: f64,
    /// Percent
    pub humidity: f64,
    /// Hectopascals
    pub pressure: f64,
}

impl Environment {
    pub const PGN: u32 = 130311;

    pub fn from_frame(frame: &RawFrame) -> Option<Self> {
        if frame.pgn != Self::PGN {
            return None;
        }
        let p = Payload::new(&frame.data);
        let sources = p.u8(1);
        Some(Self {
            header: frame.header(),
            sequence: p.u8(0),
            temperature_source: sources.map(|v| TemperatureSource::from_raw(v & 0x3F)),
            humidity_source: sources.map(|v| HumiditySource::from_raw(v >> 6)),
            temperature: p.unsigned(2, 16) * 0.01 - 273.15,
            humidity: p.signed(4, 16) * 0.004,
            pressure: p.unsigned(6, 16),
        })
    }
}

impl PgnMessage for Environment {
    fn pgn(&self) -> u32 {
        Self::PGN
    }

    fn name(&self) -> &'static str {
        "Environmental Parameters"
    }

    fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Suffixed with the sender address, since several sensors may report
    fn field_names(&self) -> Vec<String> {
        let src = self.header.source;
        vec![
            format!("Temperature-0x{:02x}", src),
            format!("Humidity-0x{:02x}", src),
            format!("Pressure-0x{:02x}", src),
        ]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            self.temperature.into(),
            self.humidity.into(),
            self.pressure.into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pgn: u32, data: Vec<u8>) -> RawFrame {
        RawFrame::new(2, pgn, 255, 0x23, 1000, data)
    }

    #[test]
    fn test_address_claim_manufacturer() {
        // Manufacturer 5 in the top 11 bits of bytes 2-3
        let mfr: u16 = 5 << 5;
        let [lo, hi] = mfr.to_le_bytes();
        let msg = AddressClaim::from_frame(&frame(60928, vec![0x01, 0x02, lo, hi, 0x00, 0x82, 0x79, 0xC5]))
            .unwrap();
        assert_eq!(msg.manufacturer, Some(5));
        assert_eq!(msg.function, Some(0x82));
        assert_eq!(msg.class, Some(0x78));
        assert_eq!(msg.configurable, Some(true));
        assert_eq!(msg.industry, Some(4));
        assert_eq!(msg.system, Some(5));
        assert_eq!(msg.field_values()[7], FieldValue::Boolean(true));
    }

    #[test]
    fn test_heading() {
        // 10000 * 1e-4 rad = 1 rad
        let msg = Heading::from_frame(&frame(127250, vec![0x07, 0x10, 0x27, 0x00, 0x80, 0xff, 0x7f, 0xfd]))
            .unwrap();
        assert_eq!(msg.sequence, Some(7));
        assert!((msg.heading - 57.295779513).abs() < 1e-6);
        assert!(msg.deviation.is_nan());
        assert!((msg.variation - 32767.0 * N2K_TO_DEGREES).abs() < 1e-9);
        assert_eq!(msg.reference, BearingRef::Magnetic);
        assert_eq!(msg.field_names(), vec!["Heading", "Deviation", "Variation", "Reference"]);
    }

    #[test]
    fn test_heading_not_available() {
        let msg = Heading::from_frame(&frame(127250, vec![0x00, 0xff, 0xff])).unwrap();
        assert!(msg.heading.is_nan());
        assert!(msg.variation.is_nan());
        assert_eq!(msg.reference, BearingRef::Unknown);
    }

    #[test]
    fn test_rate_of_turn() {
        let raw: i32 = -3200 * 100;
        let mut data = vec![0x01];
        data.extend_from_slice(&raw.to_le_bytes());
        let msg = RateOfTurn::from_frame(&frame(127251, data)).unwrap();
        assert!((msg.rate + 100.0 * N2K_TO_DEGREES).abs() < 1e-9);
    }

    #[test]
    fn test_orientation_field_order() {
        let mut data = vec![0x00];
        for v in [100i16, 200, 300] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let msg = Orientation::from_frame(&frame(127257, data)).unwrap();
        let values: Vec<f64> = msg.field_values().iter().map(FieldValue::as_f64).collect();
        assert!((values[0] - 200.0 * N2K_TO_DEGREES).abs() < 1e-9);
        assert!((values[1] - 300.0 * N2K_TO_DEGREES).abs() < 1e-9);
        assert!((values[2] - 100.0 * N2K_TO_DEGREES).abs() < 1e-9);
    }

    #[test]
    fn test_water_depth() {
        let mut data = vec![0x00];
        data.extend_from_slice(&1234i32.to_le_bytes());
        data.extend_from_slice(&(-50i16).to_le_bytes());
        data.push(3);
        let msg = WaterDepth::from_frame(&frame(128267, data)).unwrap();
        assert!((msg.depth - 12.34).abs() < 1e-9);
        assert!((msg.offset + 0.5).abs() < 1e-9);
        assert!((msg.range - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_position_rapid() {
        let mut data = Vec::new();
        data.extend_from_slice(&515_000_000i32.to_le_bytes());
        data.extend_from_slice(&(-39_000_000i32).to_le_bytes());
        let msg = PositionRapid::from_frame(&frame(129025, data)).unwrap();
        assert!((msg.latitude - 51.5).abs() < 1e-9);
        assert!((msg.longitude + 3.9).abs() < 1e-9);
    }

    #[test]
    fn test_gnss_position() {
        let mut data = vec![0u8; 45];
        data[1..3].copy_from_slice(&19_000u16.to_le_bytes());
        data[3..7].copy_from_slice(&(3600u32 * 10_000).to_le_bytes());
        data[7..15].copy_from_slice(&(515_000_000_000_000_000i64).to_le_bytes());
        data[31] = 0x23;
        data[32] = 0x40;
        data[33] = 9;
        data[34..36].copy_from_slice(&120i16.to_le_bytes());
        data[41..43].copy_from_slice(&0x0125u16.to_le_bytes());

        let msg = GnssPosition::from_frame(&frame(129029, data)).unwrap();
        assert!((msg.latitude - 51.5).abs() < 1e-9);
        assert_eq!(msg.gnss_type, Some(3));
        assert_eq!(msg.method, Some(2));
        assert_eq!(msg.integrity, Some(1));
        assert_eq!(msg.satellites, Some(9));
        assert!((msg.hdop - 1.2).abs() < 1e-9);
        assert_eq!(msg.station_type, Some(5));
        assert_eq!(msg.station_id, Some(0x12));
        assert_eq!(msg.as_epoch_seconds(), 19_000.0 * 86400.0 + 3600.0);
        assert_eq!(
            msg.as_datetime().unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2022-01-08 01:00:00"
        );
    }

    #[test]
    fn test_gnss_position_truncated() {
        let msg = GnssPosition::from_frame(&frame(129029, vec![0x01, 0x02])).unwrap();
        assert_eq!(msg.days, None);
        assert!(msg.latitude.is_nan());
        assert!(msg.as_epoch_seconds().is_nan());
        assert!(msg.as_datetime().is_none());
        assert!(msg.field_values()[3].is_missing());
    }

    #[test]
    fn test_date_time() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&(60u32 * 10_000).to_le_bytes());
        data.extend_from_slice(&2000i16.to_le_bytes());
        let msg = DateTimeMessage::from_frame(&frame(129033, data)).unwrap();
        assert_eq!(msg.as_epoch_seconds(), 86460.0);
        assert_eq!(msg.utc_offset_minutes, 0);
    }

    #[test]
    fn test_wind() {
        let mut data = vec![0x00];
        data.extend_from_slice(&550i16.to_le_bytes());
        data.extend_from_slice(&0xffffu16.to_le_bytes());
        data.push(0xfa);
        let msg = Wind::from_frame(&frame(130306, data)).unwrap();
        assert!((msg.speed - 5.5).abs() < 1e-9);
        assert!(msg.angle.is_nan());
        assert_eq!(msg.reference, WindReference::Apparent);
    }

    #[test]
    fn test_environment() {
        let mut data = vec![0x00, 0x40 | 0x01];
        data.extend_from_slice(&30015u16.to_le_bytes());
        data.extend_from_slice(&12500i16.to_le_bytes());
        data.extend_from_slice(&1013u16.to_le_bytes());
        let msg = Environment::from_frame(&frame(130311, data)).unwrap();
        assert!((msg.temperature - 27.0).abs() < 1e-9);
        assert!((msg.humidity - 50.0).abs() < 1e-9);
        assert_eq!(msg.pressure, 1013.0);
        assert_eq!(msg.temperature_source, Some(TemperatureSource::External));
        assert_eq!(msg.humidity_source, Some(HumiditySource::External));
        assert_eq!(msg.field_names()[0], "Temperature-0x23");
    }

    #[test]
    fn test_wrong_pgn_is_rejected() {
        assert!(Wind::from_frame(&frame(130311, vec![0; 8])).is_none());
    }
}
