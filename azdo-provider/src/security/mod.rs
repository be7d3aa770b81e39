//! Permission engine: namespaces, ACL tokens, identity resolution and
//! reconciliation of allow/deny bits.

pub mod engine;
pub mod identity;
pub mod namespace;
pub mod permission;
pub mod tokens;

pub use engine::{AclWriteMode, PermissionEngine, apply_permissions, decode_permissions};
pub use identity::resolve_descriptor;
pub use namespace::{ActionMap, NamespaceCache, SecurityNamespaceId};
pub use permission::{PermissionSet, PermissionState, Principal, SubjectKind};
