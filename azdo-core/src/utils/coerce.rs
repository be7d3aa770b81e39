//! Conversions between user-facing strings and API values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State of a project feature as reported by FeatureManagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureState {
    Enabled,
    Disabled,
}

impl FeatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureState::Enabled => "enabled",
            FeatureState::Disabled => "disabled",
        }
    }

    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { FeatureState::Enabled } else { FeatureState::Disabled }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, FeatureState::Enabled)
    }
}

impl Default for FeatureState {
    fn default() -> Self {
        FeatureState::Enabled
    }
}

impl fmt::Display for FeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enabled" => Ok(FeatureState::Enabled),
            "disabled" => Ok(FeatureState::Disabled),
            other => Err(format!("'{other}' is not one of enabled, disabled")),
        }
    }
}

/// Lenient boolean used for string-typed API fields such as `"True"` or `"false"`.
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_state_parse() {
        assert_eq!("Enabled".parse::<FeatureState>().unwrap(), FeatureState::Enabled);
        assert_eq!("disabled".parse::<FeatureState>().unwrap(), FeatureState::Disabled);
        assert!("on".parse::<FeatureState>().is_err());
    }

    #[test]
    fn test_feature_state_serde() {
        assert_eq!(serde_json::to_string(&FeatureState::Disabled).unwrap(), r#""disabled""#);
    }

    #[test]
    fn test_parse_bool_flag() {
        assert_eq!(parse_bool_flag("True"), Some(true));
        assert_eq!(parse_bool_flag("0"), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
    }
}
