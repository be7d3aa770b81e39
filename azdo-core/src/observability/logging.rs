//! Structured logging for the provider process.
//!
//! The host owns stdout, so events go to stderr as JSON. Verbosity is taken
//! from `TF_LOG_AZDO`; when it is unset, empty, `OFF` or not a valid filter,
//! no subscriber is installed.

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Variable controlling log verbosity (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`, `OFF`).
pub const LOG_ENV_VAR: &str = "TF_LOG_AZDO";

static INITIALIZED: OnceCell<bool> = OnceCell::new();

/// Parse a level string into a filter. `None` means logging stays off.
pub fn log_filter(level: Option<&str>) -> Option<EnvFilter> {
    let level = level?.trim();
    if level.is_empty() || level.eq_ignore_ascii_case("off") {
        return None;
    }
    EnvFilter::try_new(level.to_ascii_lowercase()).ok()
}

/// Install the JSON subscriber according to `TF_LOG_AZDO`. Safe to call more than once.
pub fn init_logging() -> bool {
    let level = std::env::var(LOG_ENV_VAR).ok();
    init_logging_from(level.as_deref())
}

/// Install the JSON subscriber for an explicit level. Returns whether logging is on.
pub fn init_logging_from(level: Option<&str>) -> bool {
    *INITIALIZED.get_or_init(|| {
        let Some(filter) = log_filter(level) else {
            return false;
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .flatten_event(true),
            )
            .try_init()
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_off_values() {
        assert!(log_filter(None).is_none());
        assert!(log_filter(Some("")).is_none());
        assert!(log_filter(Some("OFF")).is_none());
        assert!(log_filter(Some("off")).is_none());
    }

    #[test]
    fn test_log_filter_accepts_levels() {
        for level in ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"] {
            assert!(log_filter(Some(level)).is_some(), "{level}");
        }
    }

    #[test]
    fn test_log_filter_rejects_garbage() {
        assert!(log_filter(Some("[not a filter")).is_none());
    }
}
