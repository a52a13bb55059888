//! Output formatting and persistence for analysis results.
//!
//! Supports pretty-printing, JSON files (optionally gzip-compressed), and CSV append.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info};

use crate::stats::PassStats;
use csv::WriterBuilder;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `value` as pretty JSON to `path`, gzip-compressed if the path ends in `.gz`.
///
/// Missing parent directories are created.
#[tracing::instrument(skip(value))]
pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let target = Path::new(path);
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }

    let file = File::create(target).with_context(|| format!("failed to create '{path}'"))?;
    let gzip = path.ends_with(".gz");

    if gzip {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer_pretty(&mut encoder, value)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }

    info!(path, gzip, "JSON written");
    Ok(())
}

/// Appends a [`PassStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, pass_stats: &PassStats) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(pass_stats)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::PassStats;
    use flate2::read::GzDecoder;
    use std::env;
    use std::fs;
    use std::io::Read;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        let stats = PassStats::default();
        print_pretty(&stats);
    }

    #[test]
    fn test_print_json_does_not_panic() {
        let stats = PassStats::default();
        print_json(&stats).unwrap();
    }

    #[test]
    fn test_write_json_plain() {
        let path = temp_path("glosa_analyzer_test_plain.json");
        let _ = fs::remove_file(&path);

        write_json(&path, &serde_json::json!({ "a": 1 })).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["a"], 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_json_gzip() {
        let path = temp_path("glosa_analyzer_test_out.json.gz");
        let _ = fs::remove_file(&path);

        write_json(&path, &vec![1, 2, 3]).unwrap();

        let mut decoded = String::new();
        GzDecoder::new(fs::File::open(&path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        let value: Vec<i32> = serde_json::from_str(&decoded).unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_creates_file() {
        let path = temp_path("glosa_analyzer_test_create.csv");
        let _ = fs::remove_file(&path); // clean up any prior run

        let stats = PassStats::default();
        append_record(&path, &stats).unwrap();

        assert!(Path::new(&path).exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.is_empty());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("glosa_analyzer_test_header.csv");
        let _ = fs::remove_file(&path);

        let stats = PassStats::default();
        append_record(&path, &stats).unwrap();
        append_record(&path, &stats).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("intersection_id")).count();
        assert_eq!(header_count, 1);

        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        fs::remove_file(&path).unwrap();
    }
}
