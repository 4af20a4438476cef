//! Registry of sources and their channel names
//!
//! Populated by [`MessageSink`](crate::sink::MessageSink) from the control
//! messages in a stream; read by everything downstream of it.

use crate::ids;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Channel names every source starts with
pub const DEFAULT_CHANNELS: [&str; 3] = ["Name", "Channels", "Timestamp"];

/// Placeholder used for a source or channel without a known name
pub fn placeholder_name(id: u8) -> String {
    format!("[0x{:02x}]", id)
}

/// State tracked for one source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub id: u8,
    pub name: String,
    /// Index is the channel id
    pub channels: Vec<String>,
    /// Most recent value seen on the timestamp channel
    pub last_timestamp: i64,
}

impl SourceEntry {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            name: placeholder_name(id),
            channels: DEFAULT_CHANNELS.iter().map(|s| s.to_string()).collect(),
            last_timestamp: 0,
        }
    }

    /// Name for `channel`, falling back to the log channel names or a placeholder
    pub fn channel_name(&self, channel: u8) -> String {
        if let Some(name) = self.channels.get(usize::from(channel)) {
            return name.clone();
        }
        match ids::log_channel_name(channel) {
            Some(name) => name.to_string(),
            None => placeholder_name(channel),
        }
    }
}

/// Map of every source seen in one stream pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelMap {
    sources: BTreeMap<u8, SourceEntry>,
}

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source_exists(&self, source: u8) -> bool {
        self.sources.contains_key(&source)
    }

    /// Reserved channels always exist; others must be in the source's map
    pub fn channel_exists(&self, source: u8, channel: u8) -> bool {
        if ids::RESERVED_CHANNELS.contains(&channel) {
            return true;
        }
        self.sources
            .get(&source)
            .map_or(false, |s| usize::from(channel) < s.channels.len())
    }

    pub fn get(&self, source: u8) -> Option<&SourceEntry> {
        self.sources.get(&source)
    }

    /// Sources in ascending id order
    pub fn sources(&self) -> impl Iterator<Item = &SourceEntry> {
        self.sources.values()
    }

    pub fn source_name(&self, source: u8) -> String {
        self.sources
            .get(&source)
            .map_or_else(|| placeholder_name(source), |s| s.name.clone())
    }

    pub fn channel_name(&self, source: u8, channel: u8) -> String {
        match self.sources.get(&source) {
            Some(entry) => entry.channel_name(channel),
            None => ids::log_channel_name(channel)
                .map_or_else(|| placeholder_name(channel), str::to_string),
        }
    }

    /// Source id to channel names
    pub fn to_map(&self) -> BTreeMap<u8, Vec<String>> {
        self.sources
            .iter()
            .map(|(id, entry)| (*id, entry.channels.clone()))
            .collect()
    }

    /// Printable table of sources and their channels
    pub fn summary(&self) -> String {
        let mut out = String::from("Source          \tChannels\n");
        for entry in self.sources.values() {
            let _ = writeln!(
                out,
                "0x{:02x} - {:16}{:?}",
                entry.id, entry.name, entry.channels
            );
        }
        out
    }

    pub(crate) fn ensure_source(&mut self, source: u8) -> &mut SourceEntry {
        self.sources.entry(source).or_insert_with(|| {
            log::trace!("New source {}", placeholder_name(source));
            SourceEntry::new(source)
        })
    }

    pub(crate) fn set_source_name(&mut self, source: u8, name: String) {
        self.ensure_source(source).name = name;
    }

    pub(crate) fn set_channel_names(&mut self, source: u8, channels: Vec<String>) {
        self.ensure_source(source).channels = channels;
    }

    pub(crate) fn update_timestamp(&mut self, source: u8, timestamp: i64) {
        self.ensure_source(source).last_timestamp = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_placeholders() {
        let mut map = ChannelMap::new();
        assert_eq!(map.source_name(0x42), "[0x42]");
        assert_eq!(map.channel_name(0x42, 126), "Warning");
        assert_eq!(map.channel_name(0x42, 9), "[0x09]");

        map.ensure_source(0x42);
        assert_eq!(map.source_name(0x42), "[0x42]");
        assert_eq!(map.channel_name(0x42, 2), "Timestamp");
        assert_eq!(map.channel_name(0x42, 125), "Information");
        assert_eq!(map.channel_name(0x42, 3), "[0x03]");
    }

    #[test]
    fn test_updates() {
        let mut map = ChannelMap::new();
        map.set_source_name(0x10, "GPS".to_string());
        map.set_channel_names(
            0x10,
            vec!["Name", "Channels", "Timestamp", "Raw", "Position"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        map.update_timestamp(0x10, 1500);

        let entry = map.get(0x10).unwrap();
        assert_eq!(entry.name, "GPS");
        assert_eq!(entry.last_timestamp, 1500);
        assert_eq!(map.channel_name(0x10, 4), "Position");
        assert!(map.channel_exists(0x10, 4));
        assert!(!map.channel_exists(0x10, 5));
        assert!(map.channel_exists(0x99, 127));
    }

    #[test]
    fn test_sources_are_ordered() {
        let mut map = ChannelMap::new();
        for id in [0x70, 0x02, 0x10] {
            map.ensure_source(id);
        }
        let ids: Vec<u8> = map.sources().map(|s| s.id).collect();
        assert_eq!(ids, vec![0x02, 0x10, 0x70]);
        assert_eq!(map.to_map().len(), 3);
        assert!(map.summary().contains("0x70 - [0x70]"));
    }
}
