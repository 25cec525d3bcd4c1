//! Single-owner diagnostics context.
//!
//! `Diagnostics` replaces the free-floating module state a browser port
//! of this pipeline would reach for: it owns the serial log and the
//! error tracker, hands out snapshots, and assembles bundles from them.
//! Multiple independent instances can coexist (one per session under
//! test, for example).
//!
//! Interior locking follows the shared-mutable-state rule of this
//! pipeline: each store sits behind its own `Mutex`, and lock poisoning
//! is recovered because diagnostics must keep working after a panic
//! elsewhere in the process.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bundle::{self, AppInfo, BundleOptions, SupportBundle};
use crate::capabilities::Capabilities;
use crate::config::Config;
use crate::error::Result;
use crate::redact::{Redactor, Value};
use crate::serial::{ListenerId, SerialLog};
use crate::tracker::{self, ErrorEntry, ErrorKind, ErrorTracker, SharedErrorTracker};

/// Inputs for [`Diagnostics::create_bundle`].
///
/// Serial inclusion and IP handling default to the session
/// configuration; set the overrides to force either way.
#[derive(Debug, Clone, Default)]
pub struct BundleRequest {
    /// Application identity.
    pub app: AppInfo,
    /// Wizard state snapshot.
    pub state: Value,
    /// Capability probe result.
    pub capabilities: Capabilities,
    /// Override for including the captured serial log.
    pub include_serial: Option<bool>,
    /// Override for leaving IP addresses unredacted.
    pub include_ips: Option<bool>,
}

/// Owner of the diagnostic capture state for one application session.
#[derive(Debug)]
pub struct Diagnostics {
    config: Config,
    redactor: Redactor,
    serial: Mutex<SerialLog>,
    errors: SharedErrorTracker,
}

impl Diagnostics {
    /// Create a session from a configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mut serial = SerialLog::with_capacity(config.serial.capacity);
        if config.serial.capture_enabled {
            serial.set_capture_enabled(true);
        }
        let errors =
            ErrorTracker::with_limits(config.errors.max_entries, config.errors.dedupe_window_ms);

        Self {
            config,
            redactor: Redactor::new(),
            serial: Mutex::new(serial),
            errors: Arc::new(Mutex::new(errors)),
        }
    }

    /// Create a session with the default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The compiled redaction rule set.
    #[must_use]
    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    // === Serial log ===

    /// Feed one line of serial output.
    pub fn record_serial_line(&self, line: &str) {
        self.serial_lock().record_line(line);
    }

    /// Turn serial capture on or off.
    pub fn set_serial_capture(&self, enabled: bool) {
        self.serial_lock().set_capture_enabled(enabled);
    }

    /// Whether serial lines are currently being buffered.
    #[must_use]
    pub fn is_serial_capture_enabled(&self) -> bool {
        self.serial_lock().is_capture_enabled()
    }

    /// Snapshot of the captured serial lines, oldest first.
    #[must_use]
    pub fn serial_lines(&self) -> Vec<String> {
        self.serial_lock().lines()
    }

    /// Drop the captured serial lines.
    pub fn clear_serial(&self) {
        self.serial_lock().clear();
    }

    /// Subscribe to every recorded serial line.
    pub fn subscribe_serial_lines(
        &self,
        listener: impl Fn(&str) + Send + Sync + 'static,
    ) -> ListenerId {
        self.serial_lock().subscribe_lines(listener)
    }

    /// Remove a serial listener.
    pub fn unsubscribe_serial(&self, id: ListenerId) -> bool {
        self.serial_lock().unsubscribe(id)
    }

    // === Error tracking ===

    /// Record an error entry. Returns whether it was buffered.
    pub fn record(&self, entry: ErrorEntry) -> bool {
        self.errors_lock().record(entry)
    }

    /// Capture an uncaught error.
    pub fn record_error(&self, message: impl Into<String>) -> bool {
        self.record(ErrorEntry::new(ErrorKind::Error, message))
    }

    /// Capture an unhandled rejection.
    pub fn record_rejection(&self, message: impl Into<String>) -> bool {
        self.record(ErrorEntry::new(ErrorKind::Rejection, message))
    }

    /// Snapshot of the tracked errors, oldest first.
    #[must_use]
    pub fn errors(&self) -> Vec<ErrorEntry> {
        self.errors_lock().errors()
    }

    /// Drop all tracked errors and dedupe state.
    pub fn clear_errors(&self) {
        self.errors_lock().clear();
    }

    /// Shared handle to the error tracker, for handler registration or
    /// hook installation outside this session.
    #[must_use]
    pub fn error_tracker(&self) -> SharedErrorTracker {
        Arc::clone(&self.errors)
    }

    /// Install a process-wide panic hook recording into this session's
    /// tracker, chaining to the previously installed hook.
    pub fn install_panic_hook(&self) {
        tracker::install_panic_hook(self.error_tracker());
    }

    // === Bundles ===

    /// Assemble a support bundle from the current session state.
    ///
    /// # Errors
    ///
    /// Returns an error only if payload serialization fails.
    pub fn create_bundle(&self, request: BundleRequest) -> Result<SupportBundle> {
        let include_serial = request
            .include_serial
            .unwrap_or(self.config.bundle.include_serial);
        let include_ips = request
            .include_ips
            .unwrap_or(self.config.redaction.allow_ips);

        let serial_lines = include_serial.then(|| self.serial_lines());
        let errors = self.errors();

        bundle::create_bundle(
            &self.config.bundle,
            &self.redactor,
            &errors,
            BundleOptions {
                app: request.app,
                state: request.state,
                capabilities: request.capabilities,
                serial_lines,
                include_ips,
            },
        )
    }

    fn serial_lock(&self) -> MutexGuard<'_, SerialLog> {
        self.serial.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn errors_lock(&self) -> MutexGuard<'_, ErrorTracker> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_owns_independent_state() {
        let a = Diagnostics::with_defaults();
        let b = Diagnostics::with_defaults();

        a.record_error("only in a");
        assert_eq!(a.errors().len(), 1);
        assert!(b.errors().is_empty());
    }

    #[test]
    fn test_serial_flow_through_session() {
        let session = Diagnostics::with_defaults();
        session.set_serial_capture(true);
        session.record_serial_line("boot ok");
        session.record_serial_line("wifi up");

        assert_eq!(session.serial_lines(), vec!["boot ok", "wifi up"]);

        session.clear_serial();
        assert!(session.serial_lines().is_empty());
    }

    #[test]
    fn test_capture_enabled_from_config() {
        let mut config = Config::default();
        config.serial.capture_enabled = true;
        let session = Diagnostics::new(config);

        assert!(session.is_serial_capture_enabled());
        session.record_serial_line("captured");
        assert_eq!(session.serial_lines(), vec!["captured"]);
    }

    #[test]
    fn test_bundle_includes_serial_by_default() {
        let session = Diagnostics::with_defaults();
        session.set_serial_capture(true);
        session.record_serial_line("joining ssid=HomeNet");

        let bundle = session.create_bundle(BundleRequest::default()).unwrap();
        assert_eq!(bundle.payload.serial.count, 1);
        assert!(bundle.payload.serial.lines[0].contains("[REDACTED_SSID]"));
    }

    #[test]
    fn test_bundle_serial_opt_out() {
        let session = Diagnostics::with_defaults();
        session.set_serial_capture(true);
        session.record_serial_line("something");

        let bundle = session
            .create_bundle(BundleRequest {
                include_serial: Some(false),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(bundle.payload.serial.count, 0);
        assert!(bundle.payload.serial.lines.is_empty());
    }

    #[test]
    fn test_bundle_carries_tracked_errors() {
        let session = Diagnostics::with_defaults();
        session.record_error("device at 192.168.1.20 timed out");

        let bundle = session.create_bundle(BundleRequest::default()).unwrap();
        assert_eq!(bundle.payload.errors.len(), 1);
        assert!(bundle.payload.errors[0].message.contains("[REDACTED_IP]"));

        // The tracker still holds the raw message.
        assert!(session.errors()[0].message.contains("192.168.1.20"));
    }

    #[test]
    fn test_bundle_ip_override() {
        let session = Diagnostics::with_defaults();

        let bundle = session
            .create_bundle(BundleRequest {
                state: Value::from(json!({"gateway": "10.0.0.5"})),
                include_ips: Some(true),
                ..Default::default()
            })
            .unwrap();

        assert!(bundle.json.contains("10.0.0.5"));
    }

    #[test]
    fn test_panicking_listener_does_not_break_session() {
        let session = Diagnostics::with_defaults();
        session.set_serial_capture(true);
        session.subscribe_serial_lines(|_| panic!("ui listener bug"));

        session.record_serial_line("first");
        session.record_serial_line("second");
        assert_eq!(session.serial_lines().len(), 2);
    }

    #[test]
    fn test_shared_tracker_handle() {
        let session = Diagnostics::with_defaults();
        let tracker = session.error_tracker();

        tracker
            .lock()
            .unwrap()
            .record(ErrorEntry::new(ErrorKind::Error, "via handle"));

        assert_eq!(session.errors().len(), 1);
    }
}
