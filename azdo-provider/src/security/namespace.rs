//! Security namespaces and their action bits.

use azdo_core::clients::SecurityClient;
use azdo_core::clients::security::{ActionDefinition, SecurityNamespaceDescription};
use azdo_core::{AzdoError, AzdoResult};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Well-known namespaces this provider writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityNamespaceId {
    Project,
    GitRepositories,
    Build,
    Environment,
    ServiceEndpoints,
    Css,
    Iteration,
}

impl SecurityNamespaceId {
    pub fn id(&self) -> Uuid {
        match self {
            SecurityNamespaceId::Project => Uuid::from_u128(0x52d39943_cb85_4d7f_8fa8_c6baac873819),
            SecurityNamespaceId::GitRepositories => Uuid::from_u128(0x2e9eb7ed_3c0a_47d4_87c1_0ffdd275fd87),
            SecurityNamespaceId::Build => Uuid::from_u128(0x33344d9c_fc72_4d6f_aba5_fa317101a7e9),
            SecurityNamespaceId::Environment => Uuid::from_u128(0x83d4c2e6_e57d_4d6e_892b_b87222b7ad20),
            SecurityNamespaceId::ServiceEndpoints => Uuid::from_u128(0x49b48001_ca20_4adc_8111_5b60c903a50c),
            SecurityNamespaceId::Css => Uuid::from_u128(0x83e28ad4_2d72_4ceb_97b0_c7726d5502c3),
            SecurityNamespaceId::Iteration => Uuid::from_u128(0xbf7bfa03_b2b7_47db_8113_fa2e002cc5b1),
        }
    }
}

/// Case-insensitive action name → bit lookup for one namespace.
#[derive(Debug, Clone)]
pub struct ActionMap {
    pub namespace_id: Uuid,
    pub name: String,
    actions: Vec<ActionDefinition>,
    by_name: HashMap<String, i32>,
}

impl ActionMap {
    /// Rejects namespaces whose bits are not distinct powers of two.
    pub fn from_description(description: &SecurityNamespaceDescription) -> AzdoResult<Self> {
        let mut by_name = HashMap::with_capacity(description.actions.len());
        let mut seen_bits = 0i32;
        for action in &description.actions {
            let bit = action.bit;
            if bit <= 0 || bit.count_ones() != 1 {
                return Err(AzdoError::Misconfigured(format!(
                    "namespace {} action {} has bit {bit}, which is not a power of two",
                    description.name, action.name
                )));
            }
            if seen_bits & bit != 0 {
                return Err(AzdoError::Misconfigured(format!(
                    "namespace {} reuses bit {bit} for action {}",
                    description.name, action.name
                )));
            }
            seen_bits |= bit;
            by_name.insert(action.name.to_ascii_lowercase(), bit);
        }

        Ok(Self {
            namespace_id: description.namespace_id,
            name: description.name.clone(),
            actions: description.actions.clone(),
            by_name,
        })
    }

    /// Bit for an action name, ignoring case.
    pub fn bit(&self, action: &str) -> AzdoResult<i32> {
        self.by_name
            .get(&action.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| {
                AzdoError::Misconfigured(format!(
                    "unknown action '{action}' in security namespace {}",
                    self.name
                ))
            })
    }

    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }
}

/// Namespaces fetched once per provider instance; action bits are stable for a service version.
#[derive(Debug, Default)]
pub struct NamespaceCache {
    entries: DashMap<Uuid, Arc<ActionMap>>,
}

impl NamespaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, map: ActionMap) -> Arc<ActionMap> {
        let map = Arc::new(map);
        self.entries.insert(map.namespace_id, Arc::clone(&map));
        map
    }

    pub fn get(&self, namespace_id: &Uuid) -> Option<Arc<ActionMap>> {
        self.entries.get(namespace_id).map(|e| Arc::clone(e.value()))
    }

    /// Cached map, or fetch every namespace and cache the well-formed ones.
    pub async fn resolve(&self, security: &SecurityClient, namespace_id: &Uuid) -> AzdoResult<Arc<ActionMap>> {
        if let Some(map) = self.get(namespace_id) {
            return Ok(map);
        }

        let descriptions = security.get_security_namespaces().await?;
        debug!(count = descriptions.len(), "Fetched security namespaces");

        let mut requested: Option<AzdoResult<Arc<ActionMap>>> = None;
        for description in &descriptions {
            let built = ActionMap::from_description(description);
            if description.namespace_id == *namespace_id {
                requested = Some(built.map(|m| self.insert(m)));
                continue;
            }
            match built {
                Ok(map) => {
                    self.insert(map);
                }
                Err(e) => warn!(namespace = %description.name, error = %e, "Skipping malformed namespace"),
            }
        }

        requested.unwrap_or_else(|| {
            Err(AzdoError::Misconfigured(format!(
                "security namespace {namespace_id} does not exist"
            )))
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn project_namespace() -> SecurityNamespaceDescription {
        serde_json::from_value(serde_json::json!({
            "namespaceId": SecurityNamespaceId::Project.id(),
            "name": "Project",
            "actions": [
                {"name": "GENERIC_READ", "bit": 1, "displayName": "View project-level information"},
                {"name": "GENERIC_WRITE", "bit": 2, "displayName": "Edit project-level information"},
                {"name": "DELETE", "bit": 4, "displayName": "Delete team project"},
                {"name": "PUBLISH_TEST_RESULTS", "bit": 8, "displayName": "Create test runs"},
                {"name": "RENAME", "bit": 8192, "displayName": "Rename team project"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_namespace_ids() {
        assert_eq!(
            SecurityNamespaceId::GitRepositories.id().to_string(),
            "2e9eb7ed-3c0a-47d4-87c1-0ffdd275fd87"
        );
        assert_eq!(
            SecurityNamespaceId::Iteration.id().to_string(),
            "bf7bfa03-b2b7-47db-8113-fa2e002cc5b1"
        );
    }

    #[test]
    fn test_action_lookup_is_case_insensitive() {
        let map = ActionMap::from_description(&project_namespace()).unwrap();
        assert_eq!(map.bit("generic_read").unwrap(), 1);
        assert_eq!(map.bit("Rename").unwrap(), 8192);
        assert!(matches!(map.bit("FLY"), Err(AzdoError::Misconfigured(_))));
    }

    #[test]
    fn test_rejects_non_power_of_two_bits() {
        let mut ns = project_namespace();
        ns.actions[0].bit = 3;
        assert!(ActionMap::from_description(&ns).is_err());
    }

    #[test]
    fn test_rejects_duplicate_bits() {
        let mut ns = project_namespace();
        ns.actions[1].bit = 1;
        assert!(ActionMap::from_description(&ns).is_err());
    }

    #[test]
    fn test_cache_insert_and_get() {
        let cache = NamespaceCache::new();
        let map = ActionMap::from_description(&project_namespace()).unwrap();
        cache.insert(map);
        assert!(cache.get(&SecurityNamespaceId::Project.id()).is_some());
        assert!(cache.get(&SecurityNamespaceId::Build.id()).is_none());
    }
}
