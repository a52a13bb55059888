//! JSON parser for GLOSA telemetry datasets.

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::Read;
use tracing::warn;

use crate::telemetry::PassRecord;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decodes a dataset document from raw bytes. Gzip input is detected by its
/// magic bytes and inflated first.
///
/// A document is either an array of pass-records or a single one. Inside an
/// array, a record that does not match the telemetry shape is logged and
/// skipped; the remaining records are still returned.
///
/// # Errors
///
/// Returns an error if the bytes are not valid gzip (when flagged as such),
/// are not JSON, or the document is neither an array nor a valid pass-record.
pub fn parse_dataset(bytes: &[u8]) -> Result<Vec<PassRecord>> {
    let inflated;
    let json = if bytes.starts_with(&GZIP_MAGIC) {
        let mut buf = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut buf)
            .context("failed to inflate gzip dataset")?;
        inflated = buf;
        inflated.as_slice()
    } else {
        bytes
    };

    let document: Value = serde_json::from_slice(json).context("invalid dataset document")?;
    match document {
        Value::Array(items) => Ok(parse_records(items)),
        Value::Object(_) => {
            let record = serde_json::from_value(document).context("invalid pass-record")?;
            Ok(vec![record])
        }
        other => bail!("dataset must be a pass-record or an array of them, got {other}"),
    }
}

fn parse_records(items: Vec<Value>) -> Vec<PassRecord> {
    let total = items.len();
    let records: Vec<PassRecord> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed pass-record");
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!(
            skipped = total - records.len(),
            total, "Dataset contained malformed pass-records"
        );
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const ONE_RECORD: &str = r#"{"events":[{"uuid":"u1","dt":"2024-05-01T10:00:00Z"}]}"#;

    #[test]
    fn test_parse_array() {
        let doc = format!("[{ONE_RECORD},{ONE_RECORD}]");
        let records = parse_dataset(doc.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].events[0].uuid.as_deref(), Some("u1"));
    }

    #[test]
    fn test_parse_single_record() {
        let records = parse_dataset(ONE_RECORD.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].events[0].dt.is_some());
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_dataset(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(ONE_RECORD.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let records = parse_dataset(&compressed).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_null_movement_events_do_not_reject_dataset() {
        let doc = r#"[{"events":[{"dt":"2024-05-01T10:00:00Z","trafficLightsStatus":
            {"signalGroup":[{"name":"K1","movementEvent":null}]}}]}]"#;
        let records = parse_dataset(doc.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].events[0].signal_groups()[0].movement_event.is_empty());
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let doc = format!(r#"[{ONE_RECORD},{{"events":5}},{ONE_RECORD}]"#);
        let records = parse_dataset(doc.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_malformed_single_record_reports_cause() {
        let err = parse_dataset(br#"{"events":[{"dt":"x","posData":{"sp":{"value":"fast"}}}]}"#)
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("invalid pass-record"));
        assert!(!message.contains("untagged"));
    }

    #[test]
    fn test_parse_invalid_bytes() {
        assert!(parse_dataset(b"not json").is_err());
        assert!(parse_dataset(&[0x1f, 0x8b, 0x00, 0x01]).is_err());
        assert!(parse_dataset(b"42").is_err());
    }
}
