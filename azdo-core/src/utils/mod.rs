//! Small helpers shared by clients and handlers.

pub mod coerce;
pub mod diff;
pub mod validate;

pub use coerce::{FeatureState, parse_bool_flag};
pub use diff::{SetDiff, difference, set_diff};
pub use validate::{validate_date, validate_non_blank, validate_uuid};
