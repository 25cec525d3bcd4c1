//! The redaction engine: deep-copy sanitization of values and free text.

use regex::Regex;
use tracing::trace;

use super::patterns::{self, InlineRule};
use super::value::Value;

/// Options controlling a redaction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedactionOptions {
    /// Leave IPv4/IPv6 addresses in place instead of substituting them.
    pub allow_ips: bool,
}

/// Compiled redaction rule set.
///
/// Construction compiles every pattern once; a single `Redactor` is meant
/// to be created per session and reused for every pass.
#[derive(Debug)]
pub struct Redactor {
    inline_rules: Vec<InlineRule>,
    token: Regex,
    email: Regex,
    ipv4: Regex,
    ipv6: Regex,
}

impl Redactor {
    /// Compile the rule set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inline_rules: patterns::inline_rules(),
            token: patterns::token_regex(),
            email: patterns::email_regex(),
            ipv4: patterns::ipv4_regex(),
            ipv6: patterns::ipv6_regex(),
        }
    }

    /// Produce a sanitized deep copy of `value`.
    ///
    /// The input is never mutated; every container in the result is newly
    /// allocated. Dates, patterns and non-text primitives pass through as
    /// clones.
    #[must_use]
    pub fn redact(&self, value: &Value, options: RedactionOptions) -> Value {
        self.redact_value(value, options, None)
    }

    /// Sanitize a single piece of free text.
    #[must_use]
    pub fn redact_text(&self, text: &str, options: RedactionOptions) -> String {
        self.redact_str(text, options, None)
    }

    fn redact_value(&self, value: &Value, options: RedactionOptions, hint: Option<&str>) -> Value {
        match value {
            Value::Text(text) => Value::Text(self.redact_str(text, options, hint)),
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.redact_value(item, options, None))
                    .collect(),
            ),
            Value::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(key, entry)| {
                        // A conclusive key replaces the entire value, no
                        // matter its shape.
                        if let Some(placeholder) = patterns::key_placeholder(key) {
                            (key.clone(), Value::Text(placeholder.to_string()))
                        } else {
                            (key.clone(), self.redact_value(entry, options, Some(key)))
                        }
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn redact_str(&self, text: &str, options: RedactionOptions, hint: Option<&str>) -> String {
        if let Some(placeholder) = hint.and_then(patterns::hint_placeholder) {
            return placeholder.to_string();
        }

        let mut sanitized = text.to_string();
        for rule in &self.inline_rules {
            sanitized = rule.apply(&sanitized);
        }

        sanitized = self
            .token
            .replace_all(&sanitized, patterns::TOKEN_PLACEHOLDER)
            .into_owned();
        sanitized = self
            .email
            .replace_all(&sanitized, patterns::EMAIL_PLACEHOLDER)
            .into_owned();

        if !options.allow_ips {
            sanitized = self
                .ipv4
                .replace_all(&sanitized, patterns::IP_PLACEHOLDER)
                .into_owned();
            sanitized = self
                .ipv6
                .replace_all(&sanitized, patterns::IP_PLACEHOLDER)
                .into_owned();
        }

        if sanitized != text {
            trace!("text redacted");
        }
        sanitized
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn redactor() -> Redactor {
        Redactor::new()
    }

    #[test]
    fn test_key_based_total_redaction() {
        let input = Value::from(json!({"password": "hunter2"}));
        let result = redactor().redact(&input, RedactionOptions::default());

        assert_eq!(
            result.get("password").and_then(Value::as_text),
            Some("[REDACTED_PASSWORD]")
        );
        // Original untouched.
        assert_eq!(
            input.get("password").and_then(Value::as_text),
            Some("hunter2")
        );
    }

    #[test]
    fn test_key_replaces_non_string_values() {
        let input = Value::from(json!({"password": {"plain": "hunter2"}}));
        let result = redactor().redact(&input, RedactionOptions::default());

        assert_eq!(
            result.get("password").and_then(Value::as_text),
            Some("[REDACTED_PASSWORD]")
        );
    }

    #[test]
    fn test_key_hint_on_string_values() {
        let input = Value::from(json!({"wifi_password": "hunter2", "backupSsid": "HomeNet"}));
        let result = redactor().redact(&input, RedactionOptions::default());

        assert_eq!(
            result.get("wifi_password").and_then(Value::as_text),
            Some("[REDACTED_PASSWORD]")
        );
        assert_eq!(
            result.get("backupSsid").and_then(Value::as_text),
            Some("[REDACTED_SSID]")
        );
    }

    #[test]
    fn test_inline_dual_secret_redaction() {
        let result = redactor().redact_text(
            r#"Connected to SSID: "MyWifi" with password="secret""#,
            RedactionOptions::default(),
        );

        assert!(result.contains("[REDACTED_SSID]"));
        assert!(result.contains("[REDACTED_PASSWORD]"));
        assert!(!result.contains("MyWifi"));
        assert!(!result.contains("secret"));
    }

    #[test]
    fn test_inline_quotes_survive() {
        let result = redactor().redact_text(r#"ssid="MyWifi""#, RedactionOptions::default());
        assert_eq!(result, r#"ssid="[REDACTED_SSID]""#);
    }

    #[test]
    fn test_token_redaction() {
        let token = "abcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcd";
        let result = redactor().redact_text(
            &format!("fingerprint {token} recorded"),
            RedactionOptions::default(),
        );

        assert!(result.contains("[REDACTED_TOKEN]"));
        assert!(!result.contains(token));
    }

    #[test]
    fn test_email_redaction() {
        let result = redactor().redact_text(
            "Contact admin@example.com for support",
            RedactionOptions::default(),
        );

        assert!(result.contains("[REDACTED_EMAIL]"));
        assert!(!result.contains("admin@example.com"));
    }

    #[test]
    fn test_ip_redaction_counts_each_address() {
        let result = redactor().redact_text(
            "Device at 192.168.0.1 and fe80::1 responded",
            RedactionOptions::default(),
        );

        assert!(!result.contains("192.168.0.1"));
        assert!(!result.contains("fe80::1"));
        assert_eq!(result.matches("[REDACTED_IP]").count(), 2);
    }

    #[test]
    fn test_allow_ips_preserves_addresses() {
        let result = redactor().redact_text(
            "Device at 10.0.0.5",
            RedactionOptions { allow_ips: true },
        );
        assert!(result.contains("10.0.0.5"));
    }

    #[test]
    fn test_nested_structure_redaction() {
        let input = Value::from(json!({
            "network": {
                "ssid": "Office Wifi",
                "passphrase": "TopSecret"
            },
            "logs": ["ssid=GuestNet", "user email: user@example.com"]
        }));

        let result = redactor().redact(&input, RedactionOptions::default());

        let network = result.get("network").expect("network map");
        assert_eq!(
            network.get("ssid").and_then(Value::as_text),
            Some("[REDACTED_SSID]")
        );
        assert_eq!(
            network.get("passphrase").and_then(Value::as_text),
            Some("[REDACTED_PASSPHRASE]")
        );

        let Some(Value::List(logs)) = result.get("logs") else {
            panic!("expected logs list");
        };
        assert!(!logs[0].as_text().unwrap().contains("GuestNet"));
        assert!(logs[1].as_text().unwrap().contains("[REDACTED_EMAIL]"));

        // The input keeps its secrets.
        let original_network = input.get("network").expect("network map");
        assert_eq!(
            original_network.get("ssid").and_then(Value::as_text),
            Some("Office Wifi")
        );
    }

    #[test]
    fn test_non_text_primitives_pass_through() {
        let input = Value::from(json!({"retries": 3, "ok": true, "none": null}));
        let result = redactor().redact(&input, RedactionOptions::default());
        assert_eq!(result, input);
    }

    #[test]
    fn test_opaque_leaves_are_cloned() {
        let timestamp = "2024-05-01T00:00:00Z".parse().unwrap();
        let mut entries = std::collections::BTreeMap::new();
        entries.insert("seen".to_string(), Value::Date(timestamp));
        entries.insert(
            "matcher".to_string(),
            Value::Pattern(r"^v\d+$".to_string()),
        );
        let input = Value::Map(entries);

        let result = redactor().redact(&input, RedactionOptions::default());
        assert_eq!(result.get("seen"), Some(&Value::Date(timestamp)));
        assert_eq!(
            result.get("matcher"),
            Some(&Value::Pattern(r"^v\d+$".to_string()))
        );
    }

    #[test]
    fn test_list_elements_get_no_key_hint() {
        // A list under a hinted key: elements are scanned as free text,
        // not blanket-replaced.
        let input = Value::from(json!({"password_hints": ["just a note"]}));
        let result = redactor().redact(&input, RedactionOptions::default());

        let Some(Value::List(items)) = result.get("password_hints") else {
            panic!("expected list");
        };
        assert_eq!(items[0].as_text(), Some("just a note"));
    }

    #[test]
    fn test_end_of_string_spaced_value_survives() {
        // The whitespace-terminated form needs a trailing separator; a
        // value at end-of-string is documented to slip through.
        let result = redactor().redact_text("ssid \"TailNet\"", RedactionOptions::default());
        assert!(result.contains("TailNet"));
    }
}
