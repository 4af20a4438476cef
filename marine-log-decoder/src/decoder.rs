//! Main decoder API
//!
//! [`Decoder`] ties the stages together for file-based use. It owns a
//! validated [`DecoderConfig`] and the PGN registry; every stream it opens
//! gets its own sink and assembler, so one decoder can serve many files.

use crate::assembler::{ConverterTable, RecordAssembler, RecordBatches};
use crate::channel_map::ChannelMap;
use crate::config::DecoderConfig;
use crate::envelope::EnvelopeReader;
use crate::formats::act::FrameReader;
use crate::formats::dat::{self, ExtractMode, ExtractStats};
use crate::formats::state::StateSnapshot;
use crate::pgn::{DecodedMessage, PgnRegistry, Timeseries, TimeseriesBuilder};
use crate::sink::MessageSink;
use crate::types::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// The main decoder struct - entry point for file decoding
pub struct Decoder {
    config: DecoderConfig,
    registry: PgnRegistry,
}

impl Decoder {
    /// Create a decoder, validating the configuration and building the
    /// standard PGN registry
    ///
    /// # Example
    /// ```no_run
    /// use marine_log_decoder::{Decoder, DecoderConfig};
    /// use std::path::Path;
    ///
    /// let decoder = Decoder::new(DecoderConfig::new()).unwrap();
    /// for message in decoder.decode_n2k_file(Path::new("capture.act")).unwrap() {
    ///     println!("{}", message.unwrap());
    /// }
    /// ```
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: PgnRegistry::standard()?,
        })
    }

    /// Replace the PGN registry, e.g. one with extra handlers registered
    pub fn with_registry(mut self, registry: PgnRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn registry(&self) -> &PgnRegistry {
        &self.registry
    }

    /// Frames from a gateway capture
    pub fn read_frames(&self, path: &Path) -> Result<FrameReader<File>> {
        log::info!("Reading N2K capture: {:?}", path);
        let file = File::open(path)?;
        Ok(FrameReader::with_config(file, &self.config))
    }

    /// Decoded messages from a gateway capture; frames without a decoder are
    /// skipped
    pub fn decode_n2k_file(
        &self,
        path: &Path,
    ) -> Result<Box<dyn Iterator<Item = Result<DecodedMessage>> + '_>> {
        let frames = self.read_frames(path)?;
        let registry = &self.registry;
        Ok(Box::new(frames.filter_map(move |frame| match frame {
            Ok(frame) => registry.decode(&frame).map(Ok),
            Err(e) => Some(Err(e)),
        })))
    }

    /// Timeseries rows from a gateway capture
    ///
    /// `pgns` restricts the rows to the listed PGNs; by default every decoded
    /// PGN except address claims is included.
    pub fn n2k_timeseries(
        &self,
        path: &Path,
        pgns: Option<&[u32]>,
    ) -> Result<Timeseries<'_, FrameReader<File>>> {
        let builder = match pgns {
            Some(pgns) => TimeseriesBuilder::with_pgns(&self.registry, pgns),
            None => TimeseriesBuilder::new(&self.registry),
        };
        Ok(Timeseries::new(self.read_frames(path)?, builder))
    }

    /// Envelopes from a native stream file
    pub fn read_envelopes(&self, path: &Path) -> Result<EnvelopeReader<File>> {
        log::info!("Reading message stream: {:?}", path);
        Ok(EnvelopeReader::new(File::open(path)?))
    }

    /// A fresh sink for one stream pass
    pub fn message_sink(&self) -> Result<MessageSink> {
        dat::seeded_sink(&self.config, dat::CONVERTER_NAME)
    }

    /// Channel map from a `.var` file
    pub fn read_channel_map(&self, path: &Path) -> Result<ChannelMap> {
        log::info!("Reading channel map: {:?}", path);
        dat::read_channel_map(File::open(path)?, &self.config)
    }

    /// Converters for `map` under this decoder's clock settings
    pub fn converter_table(&self, map: &ChannelMap) -> ConverterTable {
        ConverterTable::from_channel_map(
            map,
            self.config.clock_source,
            self.config.include_clock_timestamp,
        )
    }

    /// Record batches from a data file, with fields derived from `map`
    pub fn record_batches(
        &self,
        map: &ChannelMap,
        path: &Path,
    ) -> Result<RecordBatches<EnvelopeReader<File>>> {
        let assembler = RecordAssembler::new(self.converter_table(map), self.config.clock_source);
        Ok(RecordBatches::new(
            self.read_envelopes(path)?,
            self.message_sink()?,
            assembler,
            self.config.batch_size,
        ))
    }

    /// Copy one (source, channel) pair from a data file to `writer`
    pub fn extract_messages<W: Write>(
        &self,
        path: &Path,
        source: u8,
        channel: u8,
        mode: ExtractMode,
        writer: &mut W,
    ) -> Result<ExtractStats> {
        log::info!(
            "Extracting 0x{:02x}/0x{:02x} from {:?}",
            source,
            channel,
            path
        );
        dat::extract_messages(File::open(path)?, writer, source, channel, mode)
    }

    pub fn read_state(&self, path: &Path) -> Result<StateSnapshot> {
        log::info!("Reading state snapshot: {:?}", path);
        StateSnapshot::from_file(path)
    }
}
