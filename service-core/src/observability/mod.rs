pub mod logging;
pub mod redact;

pub use logging::init_tracing;
pub use redact::{is_sensitive_key, sanitize, LogLevel, SecureLogger, SENSITIVE_KEY_FRAGMENTS};
