//! Bounded, deduplicating capture of application errors.
//!
//! Entries are stored verbatim; redaction happens when a support bundle
//! reads them, so the raw repository stays queryable.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Maximum number of buffered entries.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Window within which an identical error is suppressed, in milliseconds.
pub const DEFAULT_DEDUPE_WINDOW_MS: u64 = 5000;

/// How an error entry was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An uncaught error or panic.
    Error,
    /// An unhandled asynchronous rejection.
    Rejection,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Rejection => write!(f, "rejection"),
        }
    }
}

/// A single captured error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// When the error was captured.
    pub timestamp: DateTime<Utc>,

    /// How the error was raised.
    #[serde(rename = "type")]
    pub kind: ErrorKind,

    /// The error message, verbatim.
    pub message: String,

    /// Stack trace or source location, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    /// Rendered cause chain, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
            stack: None,
            cause: None,
        }
    }

    /// Attach a stack trace or source location.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attach a rendered cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Deduplication key over message and stack, verbatim.
    #[must_use]
    pub fn dedupe_key(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.message.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(self.stack.as_deref().unwrap_or("").as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

type ErrorHandler = Box<dyn Fn(&ErrorEntry) + Send + Sync>;

/// Bounded buffer of captured errors with time-based deduplication.
///
/// An entry whose `(message, stack)` pair was already recorded within the
/// dedupe window is dropped. Once the buffer is full the oldest entry is
/// evicted, independent of the dedupe state.
pub struct ErrorTracker {
    entries: VecDeque<ErrorEntry>,
    last_seen: HashMap<String, DateTime<Utc>>,
    max_entries: usize,
    dedupe_window: Duration,
    handlers: Vec<ErrorHandler>,
}

impl fmt::Debug for ErrorTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTracker")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .field("dedupe_window", &self.dedupe_window)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl ErrorTracker {
    /// Create a tracker with the default capacity and dedupe window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_ENTRIES, DEFAULT_DEDUPE_WINDOW_MS)
    }

    /// Create a tracker with explicit limits. A zero capacity is raised
    /// to one.
    #[must_use]
    pub fn with_limits(max_entries: usize, dedupe_window_ms: u64) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.max(1)),
            last_seen: HashMap::new(),
            max_entries: max_entries.max(1),
            dedupe_window: Duration::milliseconds(
                i64::try_from(dedupe_window_ms).unwrap_or(i64::MAX),
            ),
            handlers: Vec::new(),
        }
    }

    /// Record an entry now. Returns whether it was buffered (false means
    /// it was suppressed as a duplicate).
    pub fn record(&mut self, entry: ErrorEntry) -> bool {
        self.record_at(entry, Utc::now())
    }

    /// Record an entry against an explicit clock reading.
    ///
    /// The dedupe window is evaluated against `now`; this is also the
    /// seam tests use to exercise the window without sleeping.
    pub fn record_at(&mut self, entry: ErrorEntry, now: DateTime<Utc>) -> bool {
        if !self.buffer_at(&entry, now) {
            return false;
        }
        self.notify(&entry, now);
        true
    }

    /// Capture an uncaught error.
    pub fn record_error(&mut self, message: impl Into<String>) -> bool {
        self.record(ErrorEntry::new(ErrorKind::Error, message))
    }

    /// Capture an unhandled rejection.
    pub fn record_rejection(&mut self, message: impl Into<String>) -> bool {
        self.record(ErrorEntry::new(ErrorKind::Rejection, message))
    }

    /// Snapshot of the buffered entries, oldest first.
    ///
    /// The internal buffer cannot be reached through the returned vector.
    #[must_use]
    pub fn errors(&self) -> Vec<ErrorEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Buffer capacity.
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Drop all entries and dedupe state.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_seen.clear();
    }

    /// Register a handler invoked for every buffered entry, in
    /// registration order.
    ///
    /// A panicking handler never prevents later handlers from running;
    /// the panic is captured as a new error entry instead.
    pub fn add_handler(&mut self, handler: impl Fn(&ErrorEntry) + Send + Sync + 'static) {
        self.handlers.push(Box::new(handler));
    }

    fn buffer_at(&mut self, entry: &ErrorEntry, now: DateTime<Utc>) -> bool {
        let window = self.dedupe_window;
        self.last_seen
            .retain(|_, seen| now.signed_duration_since(*seen) < window);

        let key = entry.dedupe_key();
        if let Some(seen) = self.last_seen.get(&key) {
            if now.signed_duration_since(*seen) < window {
                debug!(message = %entry.message, "duplicate error suppressed");
                return false;
            }
        }

        self.last_seen.insert(key, now);
        self.entries.push_back(entry.clone());
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
        true
    }

    fn notify(&mut self, entry: &ErrorEntry, now: DateTime<Utc>) {
        let mut failures = Vec::new();
        for handler in &self.handlers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(entry))) {
                let message = panic_message(payload.as_ref());
                error!(%message, "error handler panicked");
                failures.push(ErrorEntry::new(
                    ErrorKind::Error,
                    format!("error handler panicked: {message}"),
                ));
            }
        }
        // Buffered without re-notifying, so a persistently failing
        // handler cannot recurse.
        for failure in failures {
            self.buffer_at(&failure, now);
        }
    }
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// An error tracker shared between the session and the panic hook.
pub type SharedErrorTracker = Arc<Mutex<ErrorTracker>>;

/// Install a process-wide panic hook that records panics into `tracker`.
///
/// The previously installed hook keeps running after the panic is
/// recorded, so existing reporting (including the default stderr
/// printer) is never suppressed. If the panicking thread already holds
/// the tracker lock the record is skipped rather than deadlocking.
pub fn install_panic_hook(tracker: SharedErrorTracker) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let message = panic_message(info.payload());
        let location = info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));

        if let Ok(mut guard) = tracker.try_lock() {
            let mut entry = ErrorEntry::new(ErrorKind::Error, message);
            entry.stack = location;
            guard.record(entry);
        }

        previous(info);
    }));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
