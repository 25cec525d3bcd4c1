//! `flashdiag` - diagnostic redaction and support bundles for the
//! WebFlash firmware tool
//!
//! This library backs the troubleshooting surface of a browser-based
//! firmware flasher: it captures serial output and application errors in
//! bounded buffers, scrubs secrets and PII out of anything that leaves
//! the machine, and assembles the result into a fingerprinted, optionally
//! gzip-compressed support bundle.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod bundle;
pub mod capabilities;
pub mod config;
pub mod digest;
pub mod error;
pub mod logging;
pub mod redact;
pub mod ring;
pub mod serial;
pub mod session;
pub mod tracker;

pub use bundle::{AppInfo, BundleExport, GzipBundle, SupportBundle};
pub use capabilities::{Browser, Capabilities};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use redact::{RedactionOptions, Redactor, Value};
pub use ring::RingBuffer;
pub use serial::SerialLog;
pub use session::{BundleRequest, Diagnostics};
pub use tracker::{ErrorEntry, ErrorKind, ErrorTracker};
