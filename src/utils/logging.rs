//! Structured logging with sensitive-data redaction
//!
//! Entries are built field by field and emitted as `tracing` events. The
//! field key decides how much of the value survives: secrets are hidden,
//! addresses and digests keep their ends.

use std::fmt;

/// Keys whose values are never shown
const SECRET_KEYS: &[&str] = &[
    "private", "secret", "seed", "mnemonic", "phrase", "password", "passphrase", "key_hex", "signing_key",
];
/// Keys holding addresses, shown as `0xabcdef...1234`
const ADDRESS_KEYS: &[&str] = &["address", "signer", "target"];
/// Keys holding digests, shown as `0x1234567890...abcdef`
const HASH_KEYS: &[&str] = &["digest", "hash"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self { level, module, message: message.into(), fields: Vec::new() }
    }

    /// Append `key=value`, redacted according to the key
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let value = redact_for_key(key, &value.to_string());
        self.fields.push((key, value));
        self
    }

    pub fn render_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Emit through the installed `tracing` subscriber
    pub fn log(self) {
        let fields = self.render_fields();
        let module = self.module;
        let message = self.message.as_str();

        match self.level {
            LogLevel::Debug => tracing::debug!(target: "dvn_governance", module, fields = %fields, "{}", message),
            LogLevel::Info => tracing::info!(target: "dvn_governance", module, fields = %fields, "{}", message),
            LogLevel::Error => tracing::error!(target: "dvn_governance", module, fields = %fields, "{}", message),
        }
    }
}

/// Install the process-wide subscriber (binary only).
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` when verbose.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn redact_for_key(key: &str, value: &str) -> String {
    let key = key.to_lowercase();
    let matches = |keys: &[&str]| keys.iter().any(|k| key.contains(k));

    if matches(SECRET_KEYS) {
        hide(value)
    } else if matches(ADDRESS_KEYS) {
        let prefix = if value.trim().starts_with("0x") { 8 } else { 6 };
        keep_ends(value, prefix, 4, || hide(value))
    } else if matches(HASH_KEYS) {
        let prefix = if value.trim().starts_with("0x") { 12 } else { 10 };
        keep_ends(value, prefix, 6, || value.trim().to_string())
    } else {
        value.to_string()
    }
}

fn hide(value: &str) -> String {
    match value.len() {
        0 => "[EMPTY]".to_string(),
        1..=4 => "[REDACTED]".to_string(),
        len => format!("[REDACTED:{}chars]", len),
    }
}

/// `prefix...suffix`, or `short(value)` when there is too little to elide
fn keep_ends(value: &str, prefix: usize, suffix: usize, short: impl FnOnce() -> String) -> String {
    let value = value.trim();
    if value.is_empty() {
        return "[EMPTY]".to_string();
    }
    if value.len() <= prefix + suffix + 3 || !value.is_ascii() {
        return short();
    }
    format!("{}...{}", &value[..prefix], &value[value.len() - suffix..])
}

#[doc(hidden)]
#[macro_export]
macro_rules! log_at {
    ($level:ident, $module:expr, $msg:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::utils::logging::LogEntry::new($crate::utils::logging::LogLevel::$level, $module, $msg)
            $(.field(stringify!($key), &$value))*
            .log()
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($args:tt)*) => { $crate::log_at!(Debug, $($args)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($args:tt)*) => { $crate::log_at!(Info, $($args)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($args:tt)*) => { $crate::log_at!(Error, $($args)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_are_hidden() {
        assert_eq!(redact_for_key("mnemonic", ""), "[EMPTY]");
        assert_eq!(redact_for_key("password", "abc"), "[REDACTED]");
        assert_eq!(redact_for_key("secret_name", "dvn/signer-1/key"), "[REDACTED:16chars]");
        assert_eq!(redact_for_key("private_key", "secret"), "[REDACTED:6chars]");
    }

    #[test]
    fn test_addresses_keep_ends() {
        assert_eq!(
            redact_for_key("signer", "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"),
            "0xd8dA6B...6045"
        );
        assert_eq!(
            redact_for_key("dvn_address", "EQBynBO23ywHy_CgarY9NK9FTz0yDsG82PtcbSTQgGoXwiuA"),
            "EQBynB...wiuA"
        );
        assert_eq!(redact_for_key("target", "0xabc"), "[REDACTED:5chars]");
    }

    #[test]
    fn test_digests_keep_ends() {
        let hash = "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";
        assert_eq!(redact_for_key("digest", hash), "0x1234567890...abcdef");
        assert_eq!(redact_for_key("hash", "0x1234"), "0x1234");
    }

    #[test]
    fn test_plain_fields_pass_through() {
        assert_eq!(redact_for_key("chain", "ethereum"), "ethereum");
        assert_eq!(redact_for_key("quorum", "3"), "3");
    }

    #[test]
    fn test_log_entry() {
        let entry = LogEntry::new(LogLevel::Info, "test", "Test message")
            .field("chain", "ethereum")
            .field("private_key", "secret")
            .field("target", "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");

        assert_eq!(
            entry.render_fields(),
            "chain=ethereum private_key=[REDACTED:6chars] target=0xd8dA6B...6045"
        );
    }
}
