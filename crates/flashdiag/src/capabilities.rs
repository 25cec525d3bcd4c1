//! Host capability snapshot included in support bundles.
//!
//! The snapshot is caller-supplied (the probing itself lives in the host
//! application); this module only carries it and classifies the browser
//! family from the user-agent string.

use serde::{Deserialize, Serialize};

use crate::redact::Value;

/// Capability probe result, as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Whether the Web Serial API is available.
    #[serde(rename = "webSerial")]
    pub web_serial: bool,

    /// Whether the WebUSB API is available.
    #[serde(rename = "webUSB")]
    pub web_usb: bool,

    /// Raw user-agent string.
    pub ua: String,

    /// Host platform identifier.
    pub platform: String,

    /// Active locale.
    pub locale: String,
}

impl Capabilities {
    /// Classify the browser family from the user-agent string.
    #[must_use]
    pub fn browser(&self) -> Browser {
        Browser::from_user_agent(&self.ua)
    }

    /// Convert into the redaction value model.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).map(Value::from).unwrap_or(Value::Null)
    }
}

/// Browser family, as far as flashing support cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    /// Chromium-based Chrome.
    Chrome,
    /// Chromium-based Edge.
    Edge,
    /// Anything else.
    Other,
}

impl Browser {
    /// Classify a user-agent string.
    ///
    /// Edge advertises both `Chrome` and `Edg/`, so the Edge marker wins;
    /// Opera and Brave are deliberately not treated as Chrome.
    #[must_use]
    pub fn from_user_agent(ua: &str) -> Self {
        let lower = ua.to_ascii_lowercase();
        if lower.contains("edg/") {
            Self::Edge
        } else if lower.contains("chrome")
            && !lower.contains("edg")
            && !lower.contains("opr")
            && !lower.contains("brave")
        {
            Self::Chrome
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chrome => write!(f, "chrome"),
            Self::Edge => write!(f, "edge"),
            Self::Other => write!(f, "other"),
        }
    }
}
