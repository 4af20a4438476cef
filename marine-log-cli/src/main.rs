//! Marine Log CLI Application
//!
//! Command-line front end for the marine-log-decoder library:
//! - N2K gateway captures: decoded message dump and timeseries conversion
//! - Native streams: message dump, record conversion and channel extraction
//! - Logger state snapshots

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use marine_log_decoder::{
    ChannelMap, Decoder, DecoderConfig, ExtractMode, MessageSink, StateSnapshot,
};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

mod config;
mod output;

use config::{AppConfig, OutputFormat};

/// Marine Log - Decode marine data logger files
#[derive(Parser, Debug)]
#[command(name = "marine-log")]
#[command(about = "Decode N2K captures and marine data logger streams", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log verbosity (can be repeated: -v, -vv)
    #[arg(short = 'v', long = "debug", action = clap::ArgAction::Count, global = true)]
    debug: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every decoded message in an N2K capture
    N2kDump {
        file: PathBuf,
        /// Drop frames whose checksum does not match
        #[arg(long)]
        strict_checksum: bool,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Convert an N2K capture into a timeseries
    N2kConvert {
        file: PathBuf,
        /// Keep only these PGNs (can be repeated)
        #[arg(long = "pgn", value_name = "PGN")]
        pgns: Vec<u32>,
        #[arg(long)]
        strict_checksum: bool,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the messages of a native stream
    Dump {
        file: PathBuf,
        /// Include control and log messages
        #[arg(long)]
        verbose: bool,
        /// Print the source/channel map after the messages
        #[arg(long)]
        source_map: bool,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Assemble records from a channel map and one or more data files
    Convert {
        /// Channel map (.var) file
        var_file: PathBuf,
        /// Data (.dat) files; converted in parallel
        #[arg(required = true)]
        data_files: Vec<PathBuf>,
        /// Source whose timestamps delimit records
        #[arg(long, value_parser = parse_id)]
        clock_source: Option<u8>,
        /// Add the clock source's timestamp as a field
        #[arg(long)]
        clock_timestamp: bool,
        #[arg(long, value_name = "COUNT")]
        batch_size: Option<usize>,
        /// Directory for the converted files
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Copy one source/channel out of a data file
    Extract {
        file: PathBuf,
        #[arg(short, long, value_parser = parse_id)]
        source: u8,
        #[arg(short = 'C', long, value_parser = parse_id, default_value = "3")]
        channel: u8,
        /// Write re-packed envelopes instead of raw payload bytes
        #[arg(long)]
        envelopes: bool,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Show a logger state snapshot
    State {
        file: PathBuf,
        /// Also print source and channel names from this channel map
        #[arg(long, value_name = "FILE")]
        var_file: Option<PathBuf>,
    },
}

/// Source or channel id, decimal or `0x` hex
fn parse_id(text: &str) -> std::result::Result<u8, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse::<u8>(),
    };
    match parsed {
        Ok(id) if id <= 0x7F => Ok(id),
        Ok(id) => Err(format!("id {} is outside 0..=127", id)),
        Err(e) => Err(format!("invalid id '{}': {}", text, e)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.debug, args.quiet);

    log::debug!("Marine Log CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using decoder library v{}", marine_log_decoder::VERSION);

    let app_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };

    match args.command {
        Command::N2kDump {
            file,
            strict_checksum,
            output,
        } => {
            let decoder_config = app_config.decoder.clone().with_strict_checksum(
                strict_checksum || app_config.decoder.strict_checksum,
            );
            n2k_dump(&file, decoder_config, output.as_deref())
        }
        Command::N2kConvert {
            file,
            pgns,
            strict_checksum,
            output,
        } => {
            let decoder_config = app_config.decoder.clone().with_strict_checksum(
                strict_checksum || app_config.decoder.strict_checksum,
            );
            let pgns = if pgns.is_empty() {
                app_config.n2k.pgns.clone()
            } else {
                Some(pgns)
            };
            n2k_convert(&file, decoder_config, pgns.as_deref(), output.as_deref())
        }
        Command::Dump {
            file,
            verbose,
            source_map,
            output,
        } => {
            let decoder_config = app_config
                .decoder
                .clone()
                .with_internal_messages(verbose || app_config.decoder.include_internal);
            dump(&file, decoder_config, app_config.output.format, source_map, output.as_deref())
        }
        Command::Convert {
            var_file,
            data_files,
            clock_source,
            clock_timestamp,
            batch_size,
            output_dir,
        } => {
            let mut decoder_config = app_config.decoder.clone();
            if let Some(source) = clock_source {
                decoder_config = decoder_config.with_clock_source(source);
            }
            if clock_timestamp {
                decoder_config = decoder_config.with_clock_timestamp(true);
            }
            if let Some(size) = batch_size {
                decoder_config = decoder_config.with_batch_size(size);
            }
            let output_dir = output_dir.or(app_config.output.output_dir.clone());
            convert(&var_file, &data_files, decoder_config, output_dir.as_deref())
        }
        Command::Extract {
            file,
            source,
            channel,
            envelopes,
            output,
        } => {
            let mode = if envelopes {
                ExtractMode::Envelope
            } else {
                ExtractMode::Data
            };
            extract(&file, app_config.decoder, source, channel, mode, output)
        }
        Command::State { file, var_file } => {
            state(&file, app_config.decoder, app_config.output.format, var_file.as_deref())
        }
    }
}

fn n2k_dump(file: &Path, decoder_config: DecoderConfig, output: Option<&Path>) -> Result<()> {
    let mut out = output::open(output)?;
    let decoder = Decoder::new(decoder_config)?;

    let mut count = 0u64;
    for message in decoder
        .decode_n2k_file(file)
        .with_context(|| format!("Failed to open {:?}", file))?
    {
        let message = message.with_context(|| format!("Failed reading {:?}", file))?;
        writeln!(out, "{}", message)?;
        count += 1;
    }
    out.flush()?;
    log::info!("{} messages decoded from {:?}", count, file);
    Ok(())
}

fn n2k_convert(
    file: &Path,
    decoder_config: DecoderConfig,
    pgns: Option<&[u32]>,
    output: Option<&Path>,
) -> Result<()> {
    let mut out = output::open(output)?;
    let decoder = Decoder::new(decoder_config)?;

    let mut rows = 0u64;
    for row in decoder
        .n2k_timeseries(file, pgns)
        .with_context(|| format!("Failed to open {:?}", file))?
    {
        let row = row.with_context(|| format!("Failed reading {:?}", file))?;
        output::write_json_line(&mut out, &row)?;
        rows += 1;
    }
    out.flush()?;
    log::info!("{} timeseries rows from {:?}", rows, file);
    Ok(())
}

fn dump(
    file: &Path,
    decoder_config: DecoderConfig,
    format: OutputFormat,
    source_map: bool,
    output: Option<&Path>,
) -> Result<()> {
    let mut out = output::open(output)?;
    let decoder = Decoder::new(decoder_config)?;
    let mut sink: MessageSink = decoder.message_sink()?;

    let envelopes = decoder
        .read_envelopes(file)
        .with_context(|| format!("Failed to open {:?}", file))?;
    for item in envelopes {
        let envelope = match item {
            Ok(envelope) => envelope,
            Err(marine_log_decoder::DecoderError::IoError(e)) => {
                return Err(e).with_context(|| format!("Failed reading {:?}", file));
            }
            Err(e) => {
                sink.reject(&e);
                continue;
            }
        };
        if let Some(envelope) = sink.process(envelope) {
            match format {
                OutputFormat::Text => writeln!(out, "{}", sink.format_message(&envelope))?,
                OutputFormat::Json => output::write_json_line(&mut out, &sink.describe(&envelope))?,
            }
        }
    }

    if source_map {
        writeln!(out)?;
        write!(out, "{}", sink.channel_map().summary())?;
    }
    out.flush()?;

    let stats = sink.stats();
    log::info!(
        "{} messages ({} data, {} control, {} rejected)",
        stats.processed,
        stats.data,
        stats.control,
        stats.rejected
    );
    Ok(())
}

fn convert(
    var_file: &Path,
    data_files: &[PathBuf],
    decoder_config: DecoderConfig,
    output_dir: Option<&Path>,
) -> Result<()> {
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    }

    // Every destination must be writable before any input is read
    let mut jobs = Vec::with_capacity(data_files.len());
    for data_file in data_files {
        let target = output::converted_path(data_file, output_dir);
        let writer = output::create(&target)?;
        jobs.push((data_file.clone(), target, writer));
    }

    let decoder = Decoder::new(decoder_config)?;
    let map: ChannelMap = decoder
        .read_channel_map(var_file)
        .with_context(|| format!("Failed to read channel map {:?}", var_file))?;
    log::debug!("Channel map:\n{}", map.summary());

    let failures: Vec<String> = jobs
        .into_par_iter()
        .filter_map(|(data_file, target, mut writer)| {
            let result = convert_one(&decoder, &map, &data_file, &mut writer);
            match result {
                Ok(records) => {
                    log::info!("{:?}: {} records written to {:?}", data_file, records, target);
                    None
                }
                Err(e) => {
                    log::error!("{:?}: {:#}", data_file, e);
                    Some(format!("{:?}", data_file))
                }
            }
        })
        .collect();

    if !failures.is_empty() {
        bail!("Conversion failed for {}", failures.join(", "));
    }
    Ok(())
}

fn convert_one(
    decoder: &Decoder,
    map: &ChannelMap,
    data_file: &Path,
    writer: &mut impl Write,
) -> Result<u64> {
    let mut records = 0u64;
    for batch in decoder
        .record_batches(map, data_file)
        .with_context(|| format!("Failed to open {:?}", data_file))?
    {
        let batch = batch.with_context(|| format!("Failed reading {:?}", data_file))?;
        log::debug!("{:?}: batch of {} records", data_file, batch.len());
        for record in &batch {
            output::write_json_line(writer, record)?;
        }
        records += batch.len() as u64;
    }
    writer.flush()?;
    Ok(records)
}

fn extract(
    file: &Path,
    decoder_config: DecoderConfig,
    source: u8,
    channel: u8,
    mode: ExtractMode,
    output: Option<PathBuf>,
) -> Result<()> {
    let target = output
        .unwrap_or_else(|| marine_log_decoder::formats::extract_path(file, source, channel));
    let mut writer = output::create(&target)?;

    let decoder = Decoder::new(decoder_config)?;
    let stats = decoder
        .extract_messages(file, source, channel, mode, &mut writer)
        .with_context(|| format!("Failed to extract from {:?}", file))?;
    log::info!(
        "{} messages, {} bytes written to {:?}",
        stats.matched - stats.skipped,
        stats.bytes,
        target
    );
    Ok(())
}

fn state(
    file: &Path,
    decoder_config: DecoderConfig,
    format: OutputFormat,
    var_file: Option<&Path>,
) -> Result<()> {
    let decoder = Decoder::new(decoder_config)?;
    let snapshot: StateSnapshot = decoder
        .read_state(file)
        .with_context(|| format!("Failed to read state file {:?}", file))?;

    // Fall back to the map named in the snapshot, if it sits next to it
    let var_path = var_file.map(Path::to_path_buf).or_else(|| {
        snapshot
            .var_file
            .as_ref()
            .map(|name| file.with_file_name(name))
            .filter(|p| p.exists())
    });
    let map = match var_path {
        Some(path) => Some(
            decoder
                .read_channel_map(&path)
                .with_context(|| format!("Failed to read channel map {:?}", path))?,
        ),
        None => None,
    };

    let mut out = output::open(None)?;
    if format == OutputFormat::Json {
        for row in snapshot.rows() {
            output::write_json_line(&mut out, &row)?;
        }
        out.flush()?;
        return Ok(());
    }

    if let Some(modified) = snapshot.modified {
        writeln!(
            out,
            "Snapshot at device time {} ({})",
            snapshot.timestamp,
            modified
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
        )?;
    } else {
        writeln!(out, "Snapshot at device time {}", snapshot.timestamp)?;
    }
    for entry in &snapshot.entries {
        let names = match &map {
            Some(map) => format!(
                "{}\t{}",
                map.source_name(entry.source),
                map.channel_name(entry.source, entry.channel)
            ),
            None => format!("0x{:02x}\t0x{:02x}", entry.source, entry.channel),
        };
        let when = snapshot
            .clock_time(entry)
            .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{}\t{}\t{:.1}s\t{}\t{}",
            names,
            entry.count,
            snapshot.seconds_ago(entry),
            when,
            entry.value.as_deref().unwrap_or("")
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("0x38"), Ok(0x38));
        assert_eq!(parse_id("16"), Ok(16));
        assert!(parse_id("0x80").is_err());
        assert!(parse_id("gps").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "marine-log", "-v", "convert", "log.var", "a.dat", "b.dat", "--clock-source", "0x10",
        ])
        .unwrap();
        assert_eq!(args.debug, 1);
        match args.command {
            Command::Convert {
                data_files,
                clock_source,
                ..
            } => {
                assert_eq!(data_files.len(), 2);
                assert_eq!(clock_source, Some(0x10));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
