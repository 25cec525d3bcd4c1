//! Support bundle assembly.
//!
//! A bundle is one JSON document combining the sanitized application
//! state, capability snapshot, tracked errors and captured serial log,
//! fingerprinted with the streaming digest. Everything is produced
//! in memory; writing artifacts to disk is a separate, optional step.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::capabilities::Capabilities;
use crate::config::BundleConfig;
use crate::digest::Md5;
use crate::error::{Error, Result};
use crate::redact::{RedactionOptions, Redactor, Value};
use crate::tracker::ErrorEntry;

/// Length of the short fingerprint embedded in file names and summaries.
pub const SHORT_DIGEST_LEN: usize = 8;

/// Device identifier fallback when the state carries none.
pub const UNKNOWN_DEVICE: &str = "unknown-device";

/// Channel identifier fallback when the state carries none.
pub const UNKNOWN_CHANNEL: &str = "unknown-channel";

/// State keys probed for a device identifier, in order.
const DEVICE_KEYS: [&str; 3] = ["deviceId", "device", "config_string"];

/// State keys probed for a firmware channel, in order.
const CHANNEL_KEYS: [&str; 2] = ["channel", "firmwareChannel"];

/// Application identity embedded in every bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    /// Application version string.
    pub version: String,
    /// Source revision the build was produced from.
    pub commit: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            version: "unknown".to_string(),
            commit: String::new(),
        }
    }
}

/// Inputs for a single bundle creation.
#[derive(Debug, Clone, Default)]
pub struct BundleOptions {
    /// Application identity.
    pub app: AppInfo,
    /// Wizard state snapshot; redacted wholesale.
    pub state: Value,
    /// Capability probe result; redacted wholesale.
    pub capabilities: Capabilities,
    /// Captured serial lines, if serial inclusion was requested.
    pub serial_lines: Option<Vec<String>>,
    /// Leave IP addresses unredacted.
    pub include_ips: bool,
}

/// Serial section of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialSection {
    /// Redacted serial lines, oldest first.
    pub lines: Vec<String>,
    /// Number of lines included.
    pub count: usize,
}

/// The composed, fully redacted bundle payload.
#[derive(Debug, Clone, Serialize)]
pub struct BundlePayload {
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
    /// Application identity.
    #[serde(rename = "appInfo")]
    pub app: AppInfo,
    /// Redacted state snapshot.
    pub state: Value,
    /// Redacted capability snapshot.
    pub capabilities: Value,
    /// Redacted error entries, oldest first.
    pub errors: Vec<ErrorEntry>,
    /// Redacted serial log.
    pub serial: SerialSection,
}

/// A finished support bundle.
#[derive(Debug, Clone)]
pub struct SupportBundle {
    /// The composed payload.
    pub payload: BundlePayload,
    /// Pretty-printed JSON rendering of the payload.
    pub json: String,
    /// Generated file name (`<prefix>_<epoch-millis>_<digest8>.json`).
    pub file_name: String,
    /// One-line human-readable summary.
    pub summary: String,
    /// Full 32-character hex digest of the JSON text.
    pub digest_hex: String,
    /// Size of the JSON text in bytes.
    pub size_bytes: usize,
}

/// Gzip companion for an assembled bundle.
#[derive(Debug, Clone)]
pub struct GzipBundle {
    /// Gzip-compressed JSON bytes.
    pub bytes: Vec<u8>,
    /// File name of the companion (`<bundle file name>.gz`).
    pub file_name: String,
}

/// Outcome of writing a bundle (and optional companion) to a directory.
#[derive(Debug, Clone)]
pub struct BundleExport {
    /// Path of the written JSON artifact.
    pub json_path: PathBuf,
    /// Path of the written gzip companion, when produced.
    pub gz_path: Option<PathBuf>,
    /// Why the companion is missing, when compression was requested but
    /// failed. The JSON artifact is valid regardless.
    pub gzip_error: Option<String>,
}

impl BundleExport {
    /// Whether a requested compression step failed.
    #[must_use]
    pub fn compression_failed(&self) -> bool {
        self.gzip_error.is_some()
    }
}

/// Assemble a bundle stamped with the current time.
///
/// # Errors
///
/// Returns an error only if payload serialization fails.
pub fn create_bundle(
    config: &BundleConfig,
    redactor: &Redactor,
    errors: &[ErrorEntry],
    options: BundleOptions,
) -> Result<SupportBundle> {
    create_bundle_at(config, redactor, errors, options, Utc::now())
}

/// Assemble a bundle against an explicit timestamp.
///
/// Two calls with identical inputs and the same timestamp produce
/// byte-identical JSON and therefore identical digests.
///
/// # Errors
///
/// Returns an error only if payload serialization fails.
pub fn create_bundle_at(
    config: &BundleConfig,
    redactor: &Redactor,
    errors: &[ErrorEntry],
    options: BundleOptions,
    ts: DateTime<Utc>,
) -> Result<SupportBundle> {
    let redaction = RedactionOptions {
        allow_ips: options.include_ips,
    };

    let state = redactor.redact(&options.state, redaction);
    let capabilities = redactor.redact(&options.capabilities.to_value(), redaction);
    let errors = errors
        .iter()
        .map(|entry| sanitize_entry(redactor, entry, redaction))
        .collect();

    let lines: Vec<String> = options
        .serial_lines
        .unwrap_or_default()
        .iter()
        .map(|line| redactor.redact_text(line, redaction))
        .collect();
    let serial = SerialSection {
        count: lines.len(),
        lines,
    };

    let payload = BundlePayload {
        timestamp: ts,
        app: options.app,
        state,
        capabilities,
        errors,
        serial,
    };

    let json = serde_json::to_string_pretty(&payload)?;

    let mut hasher = Md5::new();
    hasher.append(json.as_bytes());
    let digest_hex = hasher.finish_hex();
    let short = &digest_hex[..SHORT_DIGEST_LEN];

    let file_name = format!(
        "{}_{}_{}.json",
        config.file_prefix,
        payload.timestamp.timestamp_millis(),
        short
    );

    let device = lookup_identifier(&payload.state, &DEVICE_KEYS).unwrap_or(UNKNOWN_DEVICE);
    let channel = lookup_identifier(&payload.state, &CHANNEL_KEYS).unwrap_or(UNKNOWN_CHANNEL);
    let summary = format!(
        "{} {} - {}/{} - {}",
        config.product_name, payload.app.version, device, channel, short
    );

    let size_bytes = json.len();
    info!(%file_name, size_bytes, "support bundle assembled");

    Ok(SupportBundle {
        payload,
        json,
        file_name,
        summary,
        digest_hex,
        size_bytes,
    })
}

/// Redact an error entry's text fields independently.
fn sanitize_entry(
    redactor: &Redactor,
    entry: &ErrorEntry,
    options: RedactionOptions,
) -> ErrorEntry {
    ErrorEntry {
        timestamp: entry.timestamp,
        kind: entry.kind,
        message: redactor.redact_text(&entry.message, options),
        stack: entry
            .stack
            .as_deref()
            .map(|stack| redactor.redact_text(stack, options)),
        cause: entry
            .cause
            .as_deref()
            .map(|cause| redactor.redact_text(cause, options)),
    }
}

/// Best-effort identifier from a redacted state map.
fn lookup_identifier<'a>(state: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        state
            .get(key)
            .and_then(Value::as_text)
            .filter(|text| !text.is_empty())
    })
}

/// Gzip-compress a byte buffer.
///
/// # Errors
///
/// Returns [`Error::Compression`] if the encoder fails.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|source| Error::Compression { source })?;
    encoder
        .finish()
        .map_err(|source| Error::Compression { source })
}

impl SupportBundle {
    /// The 8-character fingerprint used in the file name and summary.
    #[must_use]
    pub fn short_digest(&self) -> &str {
        &self.digest_hex[..SHORT_DIGEST_LEN]
    }

    /// File name of the gzip companion.
    #[must_use]
    pub fn gzip_file_name(&self) -> String {
        format!("{}.gz", self.file_name)
    }

    /// Produce the gzip companion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compression`] on failure; the bundle itself stays
    /// valid.
    pub fn compress(&self) -> Result<GzipBundle> {
        Ok(GzipBundle {
            bytes: compress(self.json.as_bytes())?,
            file_name: self.gzip_file_name(),
        })
    }

    /// Write the JSON artifact (and optionally the gzip companion) into
    /// `dir`, creating it if needed.
    ///
    /// A failing compression step is reported through
    /// [`BundleExport::gzip_error`] instead of failing the export.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the JSON artifact cannot be
    /// written.
    pub fn write_to_dir(&self, dir: &Path, with_gzip: bool) -> Result<BundleExport> {
        fs::create_dir_all(dir).map_err(|source| Error::BundleWrite {
            path: dir.to_path_buf(),
            source,
        })?;

        let json_path = dir.join(&self.file_name);
        fs::write(&json_path, self.json.as_bytes()).map_err(|source| Error::BundleWrite {
            path: json_path.clone(),
            source,
        })?;

        let mut gz_path = None;
        let mut gzip_error = None;
        if with_gzip {
            match self.compress() {
                Ok(companion) => {
                    let path = dir.join(&companion.file_name);
                    match fs::write(&path, &companion.bytes) {
                        Ok(()) => gz_path = Some(path),
                        Err(err) => {
                            warn!(error = %err, "gzip companion not written");
                            gzip_error = Some(err.to_string());
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "bundle compression failed");
                    gzip_error = Some(err.to_string());
                }
            }
        }

        Ok(BundleExport {
            json_path,
            gz_path,
            gzip_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::ErrorKind;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;

    fn fixed_ts() -> DateTime<Utc> {
        "2024-06-15T12:00:00Z".parse().unwrap()
    }

    fn fixed_entry(message: &str) -> ErrorEntry {
        ErrorEntry {
            timestamp: fixed_ts(),
            kind: ErrorKind::Error,
            message: message.to_string(),
            stack: None,
            cause: None,
        }
    }

    fn make_bundle(state: serde_json::Value) -> SupportBundle {
        create_bundle_at(
            &BundleConfig::default(),
            &Redactor::new(),
            &[],
            BundleOptions {
                state: Value::from(state),
                ..Default::default()
            },
            fixed_ts(),
        )
        .unwrap()
    }

    #[test]
    fn test_payload_contains_required_sections() {
        let bundle = make_bundle(json!({"deviceId": "esp32-c3"}));
        let parsed: serde_json::Value = serde_json::from_str(&bundle.json).unwrap();

        assert!(parsed.get("timestamp").is_some());
        assert!(parsed.get("appInfo").is_some());
        assert!(parsed.get("state").is_some());
        assert!(parsed.get("capabilities").is_some());
        assert!(parsed.get("errors").is_some());
        assert_eq!(parsed["serial"]["count"], json!(0));
        assert_eq!(parsed["serial"]["lines"], json!([]));
    }

    #[test]
    fn test_file_name_format() {
        let bundle = make_bundle(json!({}));

        let expected_prefix =
            format!("webflash_support_{}_", fixed_ts().timestamp_millis());
        assert!(bundle.file_name.starts_with(&expected_prefix));
        assert!(bundle.file_name.ends_with(".json"));
        assert!(bundle.file_name.contains(bundle.short_digest()));
    }

    #[test]
    fn test_summary_uses_state_identifiers() {
        let bundle = make_bundle(json!({"deviceId": "esp32-c3", "channel": "stable"}));

        assert!(bundle.summary.contains("WebFlash"));
        assert!(bundle.summary.contains("unknown")); // default app version
        assert!(bundle.summary.contains("esp32-c3/stable"));
        assert!(bundle.summary.contains(bundle.short_digest()));
    }

    #[test]
    fn test_summary_falls_back_to_unknown_identifiers() {
        let bundle = make_bundle(json!({}));
        assert!(bundle.summary.contains("unknown-device/unknown-channel"));
    }

    #[test]
    fn test_state_is_redacted() {
        let bundle = make_bundle(json!({
            "password": "hunter2",
            "note": "reach me at admin@example.com"
        }));

        assert!(!bundle.json.contains("hunter2"));
        assert!(bundle.json.contains("[REDACTED_PASSWORD]"));
        assert!(bundle.json.contains("[REDACTED_EMAIL]"));
    }

    #[test]
    fn test_errors_are_redacted_at_read_time() {
        let entry = fixed_entry("failed to join ssid=HomeNet");
        let bundle = create_bundle_at(
            &BundleConfig::default(),
            &Redactor::new(),
            &[entry],
            BundleOptions::default(),
            fixed_ts(),
        )
        .unwrap();

        assert!(!bundle.json.contains("HomeNet"));
        assert!(bundle.json.contains("[REDACTED_SSID]"));
    }

    #[test]
    fn test_serial_lines_redacted_independently() {
        let bundle = create_bundle_at(
            &BundleConfig::default(),
            &Redactor::new(),
            &[],
            BundleOptions {
                serial_lines: Some(vec![
                    "connecting to 192.168.1.10".to_string(),
                    "wifi password=secret".to_string(),
                ]),
                ..Default::default()
            },
            fixed_ts(),
        )
        .unwrap();

        assert_eq!(bundle.payload.serial.count, 2);
        assert!(bundle.payload.serial.lines[0].contains("[REDACTED_IP]"));
        assert!(bundle.payload.serial.lines[1].contains("[REDACTED_PASSWORD]"));
    }

    #[test]
    fn test_include_ips_passes_through() {
        let bundle = create_bundle_at(
            &BundleConfig::default(),
            &Redactor::new(),
            &[],
            BundleOptions {
                state: Value::from(json!({"gateway": "10.0.0.5"})),
                include_ips: true,
                ..Default::default()
            },
            fixed_ts(),
        )
        .unwrap();

        assert!(bundle.json.contains("10.0.0.5"));
    }

    #[test]
    fn test_bundle_determinism() {
        let options = || BundleOptions {
            app: AppInfo {
                version: "1.4.0".to_string(),
                commit: "abc1234".to_string(),
            },
            state: Value::from(json!({"deviceId": "esp32-c3", "ssid": "HomeNet"})),
            serial_lines: Some(vec!["boot ok".to_string()]),
            ..Default::default()
        };
        let errors = vec![fixed_entry("boom")];
        let config = BundleConfig::default();
        let redactor = Redactor::new();

        let first = create_bundle_at(&config, &redactor, &errors, options(), fixed_ts()).unwrap();
        let second = create_bundle_at(&config, &redactor, &errors, options(), fixed_ts()).unwrap();

        assert_eq!(first.json, second.json);
        assert_eq!(first.digest_hex, second.digest_hex);
        assert_eq!(first.file_name, second.file_name);
    }

    #[test]
    fn test_digest_matches_json_bytes() {
        let bundle = make_bundle(json!({"deviceId": "esp32"}));
        assert_eq!(bundle.digest_hex, crate::digest::md5_hex(bundle.json.as_bytes()));
        assert_eq!(bundle.size_bytes, bundle.json.len());
    }

    #[test]
    fn test_gzip_round_trip() {
        let bundle = make_bundle(json!({"deviceId": "esp32"}));
        let companion = bundle.compress().unwrap();

        assert_eq!(companion.file_name, format!("{}.gz", bundle.file_name));

        let mut decoder = GzDecoder::new(&companion.bytes[..]);
        let mut restored = String::new();
        decoder.read_to_string(&mut restored).unwrap();
        assert_eq!(restored, bundle.json);
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(json!({"deviceId": "esp32"}));

        let export = bundle.write_to_dir(dir.path(), true).unwrap();
        assert!(!export.compression_failed());

        let written = std::fs::read_to_string(&export.json_path).unwrap();
        assert_eq!(written, bundle.json);
        assert!(export.gz_path.as_ref().unwrap().exists());
    }

    #[test]
    fn test_write_to_dir_without_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = make_bundle(json!({}));

        let export = bundle.write_to_dir(dir.path(), false).unwrap();
        assert!(export.gz_path.is_none());
        assert!(export.gzip_error.is_none());
    }

    #[test]
    fn test_app_info_default() {
        let app = AppInfo::default();
        assert_eq!(app.version, "unknown");
        assert!(app.commit.is_empty());
    }
}
