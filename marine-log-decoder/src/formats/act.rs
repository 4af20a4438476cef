//! ACT gateway capture parser
//!
//! Extracts NMEA 2000 frames from the byte-stuffed serial stream written by an
//! ACT-protocol NMEA 2000 gateway.
//!
//! ## Wire format
//! ```text
//! ESC SOT N2K | len | prio | pgn (3, LE) | dst | src | timestamp (4, LE) | datalen | payload... | csum | ESC EOT
//! ```
//! Any ESC byte inside the payload is doubled on the wire. `len` counts the
//! bytes from `prio` to `csum` before stuffing.
//!
//! The checksum is computed and compared for diagnostics only unless strict
//! mode is requested; a mismatch alone never drops a frame by default.

use crate::config::DecoderConfig;
use crate::types::Result;
use std::fmt;
use std::io::{ErrorKind, Read};

/// Escape character
pub const ESC: u8 = 0x10;
/// Start of text
pub const SOT: u8 = 0x02;
/// End of text
pub const EOT: u8 = 0x03;
/// N2K message type marker
pub const N2K: u8 = 0x93;

/// Marker that opens every frame
pub const START_MARKER: [u8; 3] = [ESC, SOT, N2K];
/// Marker that closes every frame
pub const END_MARKER: [u8; 2] = [ESC, EOT];

/// Smallest number of bytes a frame can occupy from its start marker
pub const MIN_FRAME_LEN: usize = 18;

/// Start marker plus the fixed header fields, up to and including `datalen`
const HEADER_LEN: usize = 15;

/// Fixed-size part of a frame, available without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Counted from priority to checksum
    pub length: u8,
    pub priority: u8,
    /// 24-bit parameter group number
    pub pgn: u32,
    pub destination: u8,
    pub source: u8,
    /// Milliseconds, gateway-local epoch
    pub timestamp: u32,
    /// Declared payload length
    pub data_len: u8,
}

/// A single NMEA 2000 frame with its payload unstuffed
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub length: u8,
    pub priority: u8,
    pub pgn: u32,
    pub destination: u8,
    pub source: u8,
    pub timestamp: u32,
    pub data_len: u8,
    pub data: Vec<u8>,
    pub checksum: u8,
}

impl RawFrame {
    /// Build a well-formed frame, filling in the length and checksum fields
    pub fn new(
        priority: u8,
        pgn: u32,
        destination: u8,
        source: u8,
        timestamp: u32,
        data: Vec<u8>,
    ) -> Self {
        let data_len = data.len().min(usize::from(u8::MAX)) as u8;
        let mut frame = Self {
            length: data_len.wrapping_add(12),
            priority,
            pgn: pgn & 0x00FF_FFFF,
            destination,
            source,
            timestamp,
            data_len,
            data,
            checksum: 0,
        };
        frame.checksum = frame.calculate_checksum();
        frame
    }

    /// Header fields of this frame
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            length: self.length,
            priority: self.priority,
            pgn: self.pgn,
            destination: self.destination,
            source: self.source,
            timestamp: self.timestamp,
            data_len: self.data_len,
        }
    }

    /// True if fewer payload bytes were recovered than the header declared
    pub fn is_partial(&self) -> bool {
        self.data.len() < usize::from(self.data_len)
    }

    /// Mod-256 checksum over the marker byte, header fields and payload
    pub fn calculate_checksum(&self) -> u8 {
        let mut sum = N2K
            .wrapping_add(self.length)
            .wrapping_add(self.priority)
            .wrapping_add(self.destination)
            .wrapping_add(self.source)
            .wrapping_add(self.data_len);
        for b in &self.pgn.to_le_bytes()[..3] {
            sum = sum.wrapping_add(*b);
        }
        for b in &self.timestamp.to_le_bytes() {
            sum = sum.wrapping_add(*b);
        }
        for b in &self.data {
            sum = sum.wrapping_add(*b);
        }
        0u8.wrapping_sub(sum)
    }

    /// Check the received checksum against the computed one
    pub fn checksum_ok(&self) -> bool {
        self.checksum == self.calculate_checksum()
    }

    /// Serialise back to gateway bytes, stuffing the payload
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_FRAME_LEN + 2 * self.data.len());
        out.extend_from_slice(&START_MARKER);
        out.push(self.length);
        out.push(self.priority);
        out.extend_from_slice(&self.pgn.to_le_bytes()[..3]);
        out.push(self.destination);
        out.push(self.source);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.push(self.data_len);
        out.extend(stuff(&self.data));
        out.extend(stuff(&[self.checksum]));
        out.extend_from_slice(&END_MARKER);
        out
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PGN {} [0x{:02x} -> 0x{:02x}, prio {}]",
            self.pgn, self.source, self.destination, self.priority
        )?;
        for b in &self.data {
            write!(f, " {:02x}", b)?;
        }
        Ok(())
    }
}

/// Double every escape byte in `data`
pub fn stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        out.push(b);
        if b == ESC {
            out.push(ESC);
        }
    }
    out
}

/// Reverse [`stuff`]; `None` if an escape byte is not followed by another
pub fn unstuff(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter();
    while let Some(&b) = iter.next() {
        if b == ESC {
            match iter.next() {
                Some(&ESC) => out.push(ESC),
                _ => return None,
            }
        } else {
            out.push(b);
        }
    }
    Some(out)
}

/// Outcome of one scan over a byte buffer
#[derive(Debug, Clone, PartialEq)]
pub enum ScanResult {
    /// A frame was decoded from the first `consumed` bytes
    Frame { frame: RawFrame, consumed: usize },
    /// No start marker in the buffer; nothing consumed
    NoFrame,
    /// A frame starts here but more bytes are needed
    Incomplete,
    /// A malformed frame; the first `consumed` bytes should be skipped
    Rejected { consumed: usize },
}

impl ScanResult {
    /// Number of bytes the caller should drop from the front of the buffer
    pub fn consumed(&self) -> usize {
        match self {
            ScanResult::Frame { consumed, .. } | ScanResult::Rejected { consumed } => *consumed,
            ScanResult::NoFrame | ScanResult::Incomplete => 0,
        }
    }
}

/// Frame scanner over caller-supplied buffers
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameScanner {
    strict_checksum: bool,
}

impl FrameScanner {
    pub fn new(strict_checksum: bool) -> Self {
        Self { strict_checksum }
    }

    /// Scan a live buffer; a trailing incomplete frame reports `Incomplete`
    pub fn scan(&self, buf: &[u8]) -> ScanResult {
        self.scan_inner(buf, false)
    }

    /// Scan the tail of an exhausted source; truncated payloads are returned
    /// as partial frames
    pub fn scan_final(&self, buf: &[u8]) -> ScanResult {
        self.scan_inner(buf, true)
    }

    fn scan_inner(&self, buf: &[u8], at_end: bool) -> ScanResult {
        let start = match buf.windows(START_MARKER.len()).position(|w| w == START_MARKER) {
            Some(pos) => pos,
            None => {
                log::trace!("No start marker in {} bytes", buf.len());
                return ScanResult::NoFrame;
            }
        };

        let data = &buf[start..];
        if data.len() < MIN_FRAME_LEN {
            log::trace!("Buffer too small for any frame");
            return ScanResult::Incomplete;
        }
        if data.len() < usize::from(data[3]) {
            log::trace!("Buffer too small for claimed frame size ({})", data[3]);
            return ScanResult::Incomplete;
        }

        let header = FrameHeader {
            length: data[3],
            priority: data[4],
            pgn: u32::from_le_bytes([data[5], data[6], data[7], 0]),
            destination: data[8],
            source: data[9],
            timestamp: u32::from_le_bytes([data[10], data[11], data[12], data[13]]),
            data_len: data[14],
        };
        let data_len = usize::from(header.data_len);

        // Payload, checksum and end marker must at least fit unstuffed
        if !at_end && data.len() - HEADER_LEN < data_len + 3 {
            return ScanResult::Incomplete;
        }

        let mut pos = HEADER_LEN;
        let mut payload = Vec::with_capacity(data_len);
        while payload.len() < data_len && data.len() - pos > 3 {
            let c = data[pos];
            pos += 1;
            if c != ESC {
                payload.push(c);
                continue;
            }
            let next = data[pos];
            pos += 1;
            match next {
                ESC => payload.push(ESC),
                EOT => {
                    log::debug!(
                        "Frame (PGN {}) terminated early at offset {}",
                        header.pgn,
                        start + pos
                    );
                    return ScanResult::Rejected { consumed: start + pos };
                }
                SOT => {
                    log::debug!("Unexpected frame restart at offset {}", start + pos - 2);
                    return ScanResult::Rejected {
                        consumed: start + pos - 2,
                    };
                }
                other => {
                    log::warn!(
                        "Invalid escape sequence (ESC + 0x{:02x}) at offset {}: {:02x?}",
                        other,
                        start + pos - 2,
                        &data[..pos.min(data.len())]
                    );
                    return ScanResult::Rejected { consumed: start + pos };
                }
            }
        }

        if payload.len() < data_len {
            if !at_end {
                return ScanResult::Incomplete;
            }
            log::warn!(
                "Partial frame: PGN {} has {} of {} payload bytes",
                header.pgn,
                payload.len(),
                data_len
            );
        }

        let checksum = match data.get(pos) {
            Some(&c) => c,
            None if at_end => return ScanResult::Rejected { consumed: buf.len() },
            None => return ScanResult::Incomplete,
        };
        pos += 1;

        let rest = &data[pos..];
        let trailer = END_MARKER.len() + usize::from(checksum == ESC);
        if !at_end && rest.len() < trailer {
            return ScanResult::Incomplete;
        }
        if rest.starts_with(&END_MARKER) {
            pos += END_MARKER.len();
        } else if rest.starts_with(&[ESC, ESC, EOT]) {
            // Doubled escape before the end marker
            pos += 3;
        } else {
            log::debug!(
                "End of frame not in expected location (PGN {}, offset {})",
                header.pgn,
                start + pos
            );
        }

        let frame = RawFrame {
            length: header.length,
            priority: header.priority,
            pgn: header.pgn,
            destination: header.destination,
            source: header.source,
            timestamp: header.timestamp,
            data_len: header.data_len,
            data: payload,
            checksum,
        };

        if !frame.checksum_ok() {
            if self.strict_checksum {
                log::warn!(
                    "Dropping frame with bad checksum (PGN {}, 0x{:02x} -> 0x{:02x})",
                    frame.pgn,
                    frame.source,
                    frame.destination
                );
                return ScanResult::Rejected { consumed: start + pos };
            }
            log::debug!(
                "Bad checksum (PGN {}, 0x{:02x} -> 0x{:02x}): got 0x{:02x}, expected 0x{:02x}",
                frame.pgn,
                frame.source,
                frame.destination,
                frame.checksum,
                frame.calculate_checksum()
            );
        }

        ScanResult::Frame {
            frame,
            consumed: start + pos,
        }
    }
}

/// Scan a live buffer with the default (lenient) scanner
pub fn scan_frame(buf: &[u8]) -> ScanResult {
    FrameScanner::default().scan(buf)
}

/// Scan the tail of an exhausted source with the default scanner
pub fn scan_final_frame(buf: &[u8]) -> ScanResult {
    FrameScanner::default().scan_final(buf)
}

/// Iterator over frames read from a gateway capture in fixed-size chunks
///
/// Framing problems are logged and skipped; only I/O failures are yielded as
/// errors, after which iteration stops.
pub struct FrameReader<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    scanner: FrameScanner,
    chunk_size: usize,
    low_water: usize,
    /// Stream offset of `buffer[0]`
    offset: u64,
    exhausted: bool,
    failed: bool,
}

impl<R: Read> FrameReader<R> {
    /// Create a reader with default chunking and lenient checksums
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, &DecoderConfig::default())
    }

    /// Create a reader using the scanner settings from `config`
    pub fn with_config(reader: R, config: &DecoderConfig) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(config.chunk_size * 2),
            scanner: FrameScanner::new(config.strict_checksum),
            chunk_size: config.chunk_size.max(1),
            low_water: config.low_water,
            offset: 0,
            exhausted: false,
            failed: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    self.exhausted = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn consume(&mut self, count: usize) {
        let count = count.min(self.buffer.len());
        self.buffer.drain(..count);
        self.offset += count as u64;
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if !self.exhausted && self.buffer.len() < self.low_water {
                if let Err(e) = self.fill() {
                    self.failed = true;
                    return Some(Err(e));
                }
            }

            let result = if self.exhausted {
                self.scanner.scan_final(&self.buffer)
            } else {
                self.scanner.scan(&self.buffer)
            };

            match result {
                ScanResult::Frame { frame, consumed } => {
                    self.consume(consumed);
                    return Some(Ok(frame));
                }
                ScanResult::Rejected { consumed } => {
                    log::debug!("Skipping {} bytes at stream offset {}", consumed, self.offset);
                    self.consume(consumed);
                }
                ScanResult::NoFrame => {
                    // Keep a possible marker prefix that straddles the refill
                    let keep = START_MARKER.len() - 1;
                    if self.buffer.len() > keep {
                        let discard = self.buffer.len() - keep;
                        log::trace!("Discarding {} bytes without a start marker", discard);
                        self.consume(discard);
                    }
                    if self.exhausted {
                        return None;
                    }
                    if let Err(e) = self.fill() {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
                ScanResult::Incomplete => {
                    if self.exhausted {
                        if !self.buffer.is_empty() {
                            log::debug!(
                                "{} bytes left unprocessed at end of input (offset {})",
                                self.buffer.len(),
                                self.offset
                            );
                        }
                        return None;
                    }
                    if let Err(e) = self.fill() {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
            }
        }
    }
}
