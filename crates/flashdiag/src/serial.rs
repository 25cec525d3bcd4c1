//! Serial console capture into a bounded log.
//!
//! Lines always reach subscribed listeners (the live console view); they
//! are only buffered for support bundles while capture is enabled.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

use crate::ring::RingBuffer;

type LineListener = Box<dyn Fn(&str) + Send + Sync>;
type CaptureListener = Box<dyn Fn(bool) + Send + Sync>;

/// Identifier for a registered listener, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Capture state and bounded storage for serial output.
pub struct SerialLog {
    ring: RingBuffer<String>,
    capture_enabled: bool,
    next_listener: u64,
    line_listeners: Vec<(ListenerId, LineListener)>,
    capture_listeners: Vec<(ListenerId, CaptureListener)>,
}

impl fmt::Debug for SerialLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLog")
            .field("lines", &self.ring.len())
            .field("capacity", &self.ring.capacity())
            .field("capture_enabled", &self.capture_enabled)
            .field("line_listeners", &self.line_listeners.len())
            .field("capture_listeners", &self.capture_listeners.len())
            .finish()
    }
}

impl SerialLog {
    /// Create a log with the default line capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(crate::ring::DEFAULT_CAPACITY)
    }

    /// Create a log retaining at most `capacity` lines.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::with_capacity(capacity),
            capture_enabled: false,
            next_listener: 0,
            line_listeners: Vec::new(),
            capture_listeners: Vec::new(),
        }
    }

    /// Feed one line of serial output.
    ///
    /// Listeners are always notified; the line is buffered only when
    /// capture is enabled and the line is non-empty.
    pub fn record_line(&mut self, line: &str) {
        self.notify_line(line);

        if !self.capture_enabled || line.is_empty() {
            return;
        }
        self.ring.push(line.to_string());
    }

    /// Turn capture on or off. Listeners are notified on transitions only.
    pub fn set_capture_enabled(&mut self, enabled: bool) {
        if self.capture_enabled == enabled {
            return;
        }
        self.capture_enabled = enabled;
        self.notify_capture(enabled);
    }

    /// Whether lines are currently being buffered.
    #[must_use]
    pub fn is_capture_enabled(&self) -> bool {
        self.capture_enabled
    }

    /// Snapshot of the captured lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.ring.to_vec()
    }

    /// Number of captured lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether no lines are captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Line capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Drop the captured lines, keeping capture state and listeners.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Subscribe to every recorded line.
    pub fn subscribe_lines(
        &mut self,
        listener: impl Fn(&str) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_id();
        self.line_listeners.push((id, Box::new(listener)));
        id
    }

    /// Subscribe to capture on/off transitions. The listener is invoked
    /// immediately with the current state.
    pub fn subscribe_capture(
        &mut self,
        listener: impl Fn(bool) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_id();
        let listener: CaptureListener = Box::new(listener);
        let enabled = self.capture_enabled;
        if catch_unwind(AssertUnwindSafe(|| listener(enabled))).is_err() {
            error!("serial capture listener panicked");
        }
        self.capture_listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns whether anything was removed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.line_listeners.len() + self.capture_listeners.len();
        self.line_listeners.retain(|(key, _)| *key != id);
        self.capture_listeners.retain(|(key, _)| *key != id);
        before != self.line_listeners.len() + self.capture_listeners.len()
    }

    fn next_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        id
    }

    fn notify_line(&self, line: &str) {
        for (_, listener) in &self.line_listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(line))).is_err() {
                error!("serial line listener panicked");
            }
        }
    }

    fn notify_capture(&self, enabled: bool) {
        for (_, listener) in &self.capture_listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(enabled))).is_err() {
                error!("serial capture listener panicked");
            }
        }
    }
}

impl Default for SerialLog {
    fn default() -> Self {
        Self::new()
    }
}
