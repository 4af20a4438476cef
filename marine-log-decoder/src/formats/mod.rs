//! On-disk formats read by the decoder
//!
//! - [`act`]: byte-stuffed N2K gateway captures
//! - [`dat`]: native envelope streams and channel-map files
//! - [`state`]: logger state snapshot text files

pub mod act;
pub mod dat;
pub mod state;

pub use act::{FrameHeader, FrameReader, FrameScanner, RawFrame, ScanResult};
pub use dat::{extract_messages, extract_path, read_channel_map, ExtractMode, ExtractStats};
pub use state::{StateEntry, StateRow, StateSnapshot};
