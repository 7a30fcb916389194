//! Secret-aware logging helpers.
//!
//! `sanitize` masks values stored under sensitive-looking keys before they reach
//! a log line. Key matching is a lowercase substring test, so unrelated fields
//! such as `keyboard` or `monkey` are masked too.

use crate::config::Environment;
use serde_json::{Map, Value};

/// Lowercase fragments that mark a key as sensitive.
pub const SENSITIVE_KEY_FRAGMENTS: [&str; 10] = [
    "password",
    "token",
    "secret",
    "key",
    "authorization",
    "cookie",
    "session",
    "credential",
    "auth",
    "jwt",
];

const MASK_SUFFIX: &str = "****";
const REDACTED: &str = "[REDACTED]";
const VISIBLE_PREFIX_CHARS: usize = 4;

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| key.contains(fragment))
}

/// Return a copy of `value` with every sensitive entry masked.
///
/// Non-empty strings keep their first four characters followed by `****`;
/// empty strings, numbers, objects and anything else become `[REDACTED]`.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sanitized: Map<String, Value> = map
                .iter()
                .map(|(key, inner)| {
                    let masked = if is_sensitive_key(key) {
                        mask(inner)
                    } else {
                        sanitize(inner)
                    };
                    (key.clone(), masked)
                })
                .collect();
            Value::Object(sanitized)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

fn mask(value: &Value) -> Value {
    match value {
        Value::String(s) if !s.is_empty() => {
            let prefix: String = s.chars().take(VISIBLE_PREFIX_CHARS).collect();
            Value::String(format!("{}{}", prefix, MASK_SUFFIX))
        }
        _ => Value::String(REDACTED.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Environment-gated logger for payloads that may carry credentials.
///
/// Production emits errors only; staging drops debug; development emits
/// everything. Error payloads are always sanitized before emission.
#[derive(Debug, Clone, Copy)]
pub struct SecureLogger {
    environment: Environment,
}

impl SecureLogger {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn should_emit(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Error => true,
            _ if self.environment.is_production() => false,
            LogLevel::Debug => self.environment.is_development(),
            LogLevel::Info | LogLevel::Warn => true,
        }
    }

    /// The payload that would be attached to a log line at `level`, or `None`
    /// when the line is suppressed.
    pub fn prepare(&self, level: LogLevel, data: Option<&Value>) -> Option<Value> {
        if !self.should_emit(level) {
            return None;
        }
        let data = data.cloned().unwrap_or(Value::Null);
        Some(match level {
            LogLevel::Error => sanitize(&data),
            _ => data,
        })
    }

    pub fn log(&self, level: LogLevel, message: &str, data: Option<&Value>) {
        let Some(payload) = self.prepare(level, data) else {
            return;
        };
        match level {
            LogLevel::Debug => tracing::debug!(data = %payload, "{}", message),
            LogLevel::Info => tracing::info!(data = %payload, "{}", message),
            LogLevel::Warn => tracing::warn!(data = %payload, "{}", message),
            LogLevel::Error => tracing::error!(data = %payload, "{}", message),
        }
    }

    pub fn debug(&self, message: &str, data: Option<&Value>) {
        self.log(LogLevel::Debug, message, data);
    }

    pub fn info(&self, message: &str, data: Option<&Value>) {
        self.log(LogLevel::Info, message, data);
    }

    pub fn warn(&self, message: &str, data: Option<&Value>) {
        self.log(LogLevel::Warn, message, data);
    }

    pub fn error(&self, message: &str, data: Option<&Value>) {
        self.log(LogLevel::Error, message, data);
    }
}
