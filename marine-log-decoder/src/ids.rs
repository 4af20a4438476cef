//! Source and channel identifiers used by the logger's native stream
//!
//! Sources are allocated in blocks of 0x08 or 0x10 per device class; the low
//! channel numbers and the top three channel numbers are reserved for control
//! and log messages on every source.

/// Messages generated by the logging software
pub const SOURCE_LOCAL: u8 = 0x00;
/// Messages generated by data conversion tools
pub const SOURCE_CONVERTER: u8 = 0x01;
/// Local/software timers
pub const SOURCE_TIMER: u8 = 0x02;
/// Test data sources
pub const SOURCE_TEST1: u8 = 0x05;
pub const SOURCE_TEST2: u8 = 0x06;
pub const SOURCE_TEST3: u8 = 0x07;
/// GPS (or other satellite navigation) sources
pub const SOURCE_GPS: u8 = 0x10;
/// Generic analogue inputs
pub const SOURCE_ADC: u8 = 0x20;
/// NMEA 0183 bus
pub const SOURCE_NMEA: u8 = 0x30;
/// NMEA 2000 bus
pub const SOURCE_N2K: u8 = 0x38;
/// I2C bus
pub const SOURCE_I2C: u8 = 0x40;
/// Other external data sources
pub const SOURCE_EXT: u8 = 0x60;
/// MQTT derived data
pub const SOURCE_MQTT: u8 = 0x68;
/// Devices with MessagePack output returning single value channels
pub const SOURCE_MP: u8 = 0x70;

/// Name of source device
pub const CHANNEL_NAME: u8 = 0x00;
/// Channel name map (excludes log channels)
pub const CHANNEL_MAP: u8 = 0x01;
/// Source timestamp (milliseconds, arbitrary epoch)
pub const CHANNEL_TIMESTAMP: u8 = 0x02;
/// Raw device data
pub const CHANNEL_RAW: u8 = 0x03;
/// Information messages
pub const CHANNEL_LOG_INFO: u8 = 0x7D;
/// Warning messages
pub const CHANNEL_LOG_WARN: u8 = 0x7E;
/// Error messages
pub const CHANNEL_LOG_ERROR: u8 = 0x7F;

/// Highest valid source or channel number
pub const MAX_ID: u8 = 0x7F;

/// Channels that exist on every source without appearing in its channel map
pub const RESERVED_CHANNELS: [u8; 6] = [
    CHANNEL_NAME,
    CHANNEL_MAP,
    CHANNEL_TIMESTAMP,
    CHANNEL_LOG_INFO,
    CHANNEL_LOG_WARN,
    CHANNEL_LOG_ERROR,
];

/// Device class a source id belongs to, for converter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceClass {
    Gps,
    Mqtt,
    /// I2C, ADC and MessagePack devices: one value per channel
    Simple,
    Other,
}

/// Classify a source id by the block it was allocated from
pub fn source_class(source: u8) -> SourceClass {
    match source {
        s if (SOURCE_GPS..SOURCE_GPS + 0x10).contains(&s) => SourceClass::Gps,
        s if (SOURCE_MQTT..SOURCE_MQTT + 0x07).contains(&s) => SourceClass::Mqtt,
        s if (SOURCE_I2C..SOURCE_I2C + 0x10).contains(&s)
            || (SOURCE_MP..SOURCE_MP + 0x10).contains(&s)
            || (SOURCE_ADC..SOURCE_ADC + 0x10).contains(&s) =>
        {
            SourceClass::Simple
        }
        _ => SourceClass::Other,
    }
}

/// Fixed display name for the log channels
pub fn log_channel_name(channel: u8) -> Option<&'static str> {
    match channel {
        CHANNEL_LOG_INFO => Some("Information"),
        CHANNEL_LOG_WARN => Some("Warning"),
        CHANNEL_LOG_ERROR => Some("Error"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_classes() {
        assert_eq!(source_class(0x10), SourceClass::Gps);
        assert_eq!(source_class(0x1F), SourceClass::Gps);
        assert_eq!(source_class(0x6E), SourceClass::Mqtt);
        assert_eq!(source_class(0x6F), SourceClass::Other);
        assert_eq!(source_class(0x42), SourceClass::Simple);
        assert_eq!(source_class(0x71), SourceClass::Simple);
        assert_eq!(source_class(0x21), SourceClass::Simple);
        assert_eq!(source_class(0x02), SourceClass::Other);
    }
}
