//! Output destinations

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Create (truncate) an output file
pub fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("Cannot write output file {:?}", path))?;
    Ok(BufWriter::new(file))
}

/// An output file, or stdout when no path is given
pub fn open(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(create(path)?)),
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

pub fn write_json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value).context("Failed to serialise output")?;
    writeln!(out)?;
    Ok(())
}

/// `<dir>/<stem>.jsonl`, with `dir` defaulting to the input's directory
pub fn converted_path(data_file: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = data_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = format!("{}.jsonl", stem);
    match output_dir {
        Some(dir) => dir.join(name),
        None => data_file.with_file_name(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converted_path() {
        let data = Path::new("/logs/2024-05-01.dat");
        assert_eq!(
            converted_path(data, None),
            PathBuf::from("/logs/2024-05-01.jsonl")
        );
        assert_eq!(
            converted_path(data, Some(Path::new("/out"))),
            PathBuf::from("/out/2024-05-01.jsonl")
        );
    }

    #[test]
    fn test_write_json_line() {
        let mut out = Vec::new();
        write_json_line(&mut out, &serde_json::json!({"a": 1})).unwrap();
        write_json_line(&mut out, &[1, 2]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"a\":1}\n[1,2]\n");
    }
}
