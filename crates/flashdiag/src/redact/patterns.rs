//! Placeholder tokens and compiled redaction rules.
//!
//! Rule order matters: inline key/value rules run before the generic
//! token, email and IP rules, and within the inline set the quoted form
//! of each keyword runs before its bare form.

use regex::{Captures, Regex};

/// Replacement for network names matched by key or pattern.
pub const SSID_PLACEHOLDER: &str = "[REDACTED_SSID]";
/// Replacement for passwords matched by key or pattern.
pub const PASSWORD_PLACEHOLDER: &str = "[REDACTED_PASSWORD]";
/// Replacement for passphrases matched by key or pattern.
pub const PASSPHRASE_PLACEHOLDER: &str = "[REDACTED_PASSPHRASE]";
/// Replacement for long hexadecimal tokens (fingerprints, API keys).
pub const TOKEN_PLACEHOLDER: &str = "[REDACTED_TOKEN]";
/// Replacement for email addresses.
pub const EMAIL_PLACEHOLDER: &str = "[REDACTED_EMAIL]";
/// Replacement for IPv4 and IPv6 addresses.
pub const IP_PLACEHOLDER: &str = "[REDACTED_IP]";

/// Placeholder for a mapping key that is conclusive on its own.
///
/// These keys always carry a secret, so the entire value is replaced
/// without looking at its content or type.
#[must_use]
pub fn key_placeholder(key: &str) -> Option<&'static str> {
    match key.to_ascii_lowercase().as_str() {
        "ssid" => Some(SSID_PLACEHOLDER),
        "password" => Some(PASSWORD_PLACEHOLDER),
        "passphrase" => Some(PASSPHRASE_PLACEHOLDER),
        _ => None,
    }
}

/// Placeholder for a property name that contains a secret hint.
///
/// Applies only to string values reached through that property. Checked
/// in this order so that a name matching several hints resolves the same
/// way everywhere: password, passphrase, ssid.
#[must_use]
pub fn hint_placeholder(key: &str) -> Option<&'static str> {
    let lower = key.to_ascii_lowercase();
    if lower.contains("password") {
        Some(PASSWORD_PLACEHOLDER)
    } else if lower.contains("passphrase") {
        Some(PASSPHRASE_PLACEHOLDER)
    } else if lower.contains("ssid") {
        Some(SSID_PLACEHOLDER)
    } else {
        None
    }
}

/// How an inline rule rebuilds the matched text around its placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InlineKind {
    /// `key: "value"` or `key='value'`; both quote characters survive.
    Quoted,
    /// `key=value`; the bare token is swallowed.
    Bare,
    /// `key "value" `; prefix and the trailing whitespace run survive.
    /// A value at end-of-string has no trailing whitespace and is left
    /// alone; line-oriented serial output always terminates lines.
    Spaced,
}

/// One compiled inline key/value redaction rule.
#[derive(Debug)]
pub struct InlineRule {
    kind: InlineKind,
    placeholder: &'static str,
    regex: Regex,
}

impl InlineRule {
    fn new(kind: InlineKind, placeholder: &'static str, pattern: &str) -> Self {
        Self {
            kind,
            placeholder,
            regex: Regex::new(pattern).expect("invalid inline redaction pattern"),
        }
    }

    /// Apply this rule to `text`, returning the rewritten string.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        match self.kind {
            InlineKind::Quoted => self
                .regex
                .replace_all(text, |caps: &Captures<'_>| {
                    // Opening and closing quote must agree, as a
                    // backreference would enforce.
                    if caps[2] == caps[4] {
                        format!("{}{}{}{}", &caps[1], &caps[2], self.placeholder, &caps[4])
                    } else {
                        caps[0].to_string()
                    }
                })
                .into_owned(),
            InlineKind::Bare => self
                .regex
                .replace_all(text, |caps: &Captures<'_>| {
                    // The quoted rule has already run; leave its output
                    // alone instead of stripping the quotes off it.
                    if is_quoted_placeholder(&caps[2], self.placeholder) {
                        caps[0].to_string()
                    } else {
                        format!("{}{}", &caps[1], self.placeholder)
                    }
                })
                .into_owned(),
            InlineKind::Spaced => self
                .regex
                .replace_all(text, |caps: &Captures<'_>| {
                    format!("{}{}{}", &caps[1], self.placeholder, &caps[3])
                })
                .into_owned(),
        }
    }
}

/// A token of the form `"<placeholder>"` or `'<placeholder>'`.
fn is_quoted_placeholder(token: &str, placeholder: &str) -> bool {
    for quote in ['"', '\''] {
        if token.len() == placeholder.len() + 2
            && token.starts_with(quote)
            && token.ends_with(quote)
            && &token[1..token.len() - 1] == placeholder
        {
            return true;
        }
    }
    false
}

/// All inline rules, in application order.
#[must_use]
pub fn inline_rules() -> Vec<InlineRule> {
    vec![
        InlineRule::new(
            InlineKind::Quoted,
            SSID_PLACEHOLDER,
            r#"(?i)(ssid\s*[:=]\s*)(["'])([^"'\r\n]*?)(["'])"#,
        ),
        InlineRule::new(
            InlineKind::Bare,
            SSID_PLACEHOLDER,
            r"(?i)(ssid\s*[:=]\s*)([^\s,;]+)",
        ),
        InlineRule::new(
            InlineKind::Quoted,
            PASSWORD_PLACEHOLDER,
            r#"(?i)(password\s*[:=]\s*)(["'])([^"'\r\n]*?)(["'])"#,
        ),
        InlineRule::new(
            InlineKind::Bare,
            PASSWORD_PLACEHOLDER,
            r"(?i)(password\s*[:=]\s*)([^\s,;]+)",
        ),
        InlineRule::new(
            InlineKind::Quoted,
            PASSPHRASE_PLACEHOLDER,
            r#"(?i)(passphrase\s*[:=]\s*)(["'])([^"'\r\n]*?)(["'])"#,
        ),
        InlineRule::new(
            InlineKind::Bare,
            PASSPHRASE_PLACEHOLDER,
            r"(?i)(passphrase\s*[:=]\s*)([^\s,;]+)",
        ),
        InlineRule::new(
            InlineKind::Spaced,
            SSID_PLACEHOLDER,
            r#"(?i)(ssid\s+"?)([^"\s][^\r\n]*?)("?\s+)"#,
        ),
        InlineRule::new(
            InlineKind::Spaced,
            PASSWORD_PLACEHOLDER,
            r#"(?i)(password\s+"?)([^"\s][^\r\n]*?)("?\s+)"#,
        ),
    ]
}

/// Word-bounded run of 64 or more hex characters.
#[must_use]
pub fn token_regex() -> Regex {
    Regex::new(r"\b[0-9a-fA-F]{64,}\b").expect("invalid token pattern")
}

/// RFC-5322-lite email addresses.
#[must_use]
pub fn email_regex() -> Regex {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("invalid email pattern")
}

/// Dotted-quad IPv4 with octet range checks.
#[must_use]
pub fn ipv4_regex() -> Regex {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)(?:\.(?:25[0-5]|2[0-4]\d|1?\d?\d)){3})\b")
        .expect("invalid IPv4 pattern")
}

/// IPv6, full and compressed `::` forms.
#[must_use]
pub fn ipv6_regex() -> Regex {
    Regex::new(
        r"\b(?:(?:[0-9A-Fa-f]{1,4}:){7}[0-9A-Fa-f]{1,4}|(?:[0-9A-Fa-f]{1,4}:){1,7}:|:(?::[0-9A-Fa-f]{1,4}){1,7}|::1|::)\b",
    )
    .expect("invalid IPv6 pattern")
}
