pub mod logging;

pub use logging::{LOG_ENV_VAR, init_logging, init_logging_from, log_filter};
