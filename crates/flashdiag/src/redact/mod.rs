//! Redaction of secrets and PII from diagnostic data.
//!
//! Everything that leaves the pipeline inside a support bundle passes
//! through here first:
//!
//! - **Structural rules**: mapping keys that are conclusive on their own
//!   (`ssid`, `password`, `passphrase`) replace their whole value; property
//!   names that merely contain such a hint replace string values.
//!
//! - **Pattern rules**: inline `key=value` and `key "value"` forms, long
//!   hex tokens, email addresses and (optionally) IP addresses inside free
//!   text.
//!
//! Redaction always returns a structurally independent deep copy; the
//! input is never mutated.
//!
//! # Example
//!
//! ```
//! use flashdiag::redact::{RedactionOptions, Redactor};
//!
//! let redactor = Redactor::new();
//! let clean = redactor.redact_text(
//!     "joining ssid=HomeNet with password=hunter2",
//!     RedactionOptions::default(),
//! );
//! assert!(clean.contains("[REDACTED_SSID]"));
//! assert!(clean.contains("[REDACTED_PASSWORD]"));
//! ```

mod engine;
mod patterns;
mod value;

pub use engine::{RedactionOptions, Redactor};
pub use patterns::{
    EMAIL_PLACEHOLDER, IP_PLACEHOLDER, PASSPHRASE_PLACEHOLDER, PASSWORD_PLACEHOLDER,
    SSID_PLACEHOLDER, TOKEN_PLACEHOLDER,
};
pub use value::Value;
