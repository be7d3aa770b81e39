//! Declarative permission shapes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const USER_DESCRIPTOR_PREFIX: &str = "Microsoft.IdentityModel.Claims.ClaimsIdentity";

/// Desired state of one action bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Allow,
    Deny,
    #[serde(rename = "notset", alias = "NotSet", alias = "not_set")]
    NotSet,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Allow => "allow",
            PermissionState::Deny => "deny",
            PermissionState::NotSet => "notset",
        }
    }

    /// State of `bit` in an ACE; allow wins if both are somehow set.
    pub fn from_bits(bit: i32, allow: i32, deny: i32) -> Self {
        if allow & bit != 0 {
            PermissionState::Allow
        } else if deny & bit != 0 {
            PermissionState::Deny
        } else {
            PermissionState::NotSet
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(PermissionState::Allow),
            "deny" => Ok(PermissionState::Deny),
            "notset" | "not_set" => Ok(PermissionState::NotSet),
            other => Err(format!("unknown permission state '{other}'")),
        }
    }
}

/// Users and groups, told apart by descriptor prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    User,
    #[default]
    Group,
}

impl SubjectKind {
    pub fn of_descriptor(descriptor: &str) -> Self {
        if descriptor.starts_with(USER_DESCRIPTOR_PREFIX) {
            SubjectKind::User
        } else {
            SubjectKind::Group
        }
    }
}

/// Who a permission set is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Identity descriptor (`Microsoft.TeamFoundation.Identity;S-1-9-...`).
    Descriptor(String),
    /// Graph subject descriptor (`vssgp.`, `aad.`, ...).
    Subject(String),
    Named { name: String, kind: SubjectKind },
}

impl Principal {
    /// Identity descriptors carry a `;` between type and identifier, subject descriptors do not.
    pub fn from_descriptor(value: &str) -> Self {
        if value.contains(';') {
            Principal::Descriptor(value.to_string())
        } else {
            Principal::Subject(value.to_string())
        }
    }
}

/// One identity's view of a token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    pub identity_descriptor: String,
    #[serde(default)]
    pub identity_name: String,
    #[serde(default)]
    pub identity_type: SubjectKind,
    pub permissions: BTreeMap<String, PermissionState>,
}

impl PermissionSet {
    pub fn new(identity_descriptor: impl Into<String>, permissions: BTreeMap<String, PermissionState>) -> Self {
        let identity_descriptor = identity_descriptor.into();
        Self {
            identity_type: SubjectKind::of_descriptor(&identity_descriptor),
            identity_descriptor,
            identity_name: String::new(),
            permissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serde_names() {
        assert_eq!(serde_json::to_value(PermissionState::NotSet).unwrap(), "notset");
        let parsed: PermissionState = serde_json::from_value(serde_json::json!("deny")).unwrap();
        assert_eq!(parsed, PermissionState::Deny);
        assert_eq!("NotSet".parse::<PermissionState>().unwrap(), PermissionState::NotSet);
        assert!("maybe".parse::<PermissionState>().is_err());
    }

    #[test]
    fn test_state_from_bits() {
        assert_eq!(PermissionState::from_bits(4, 4, 0), PermissionState::Allow);
        assert_eq!(PermissionState::from_bits(4, 1, 4), PermissionState::Deny);
        assert_eq!(PermissionState::from_bits(4, 1, 2), PermissionState::NotSet);
    }

    #[test]
    fn test_subject_kind_from_descriptor() {
        assert_eq!(
            SubjectKind::of_descriptor("Microsoft.IdentityModel.Claims.ClaimsIdentity;contoso\\jdoe"),
            SubjectKind::User
        );
        assert_eq!(
            SubjectKind::of_descriptor("Microsoft.TeamFoundation.Identity;S-1-9-1551374245"),
            SubjectKind::Group
        );
    }

    #[test]
    fn test_principal_from_descriptor() {
        assert!(matches!(
            Principal::from_descriptor("Microsoft.TeamFoundation.Identity;S-1-9"),
            Principal::Descriptor(_)
        ));
        assert!(matches!(Principal::from_descriptor("vssgp.Uy0xLTk"), Principal::Subject(_)));
    }
}
