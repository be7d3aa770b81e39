//! Reconciles declarative permission sets with server ACLs.

use super::identity::{identity_display_name, resolve_descriptor};
use super::namespace::{ActionMap, NamespaceCache, SecurityNamespaceId};
use super::permission::{PermissionSet, PermissionState, SubjectKind};
use crate::context::ProviderContext;
use azdo_core::clients::AzdoClients;
use azdo_core::clients::security::{AccessControlEntry, AccessControlList, SetAccessControlEntriesArgs};
use azdo_core::AzdoResult;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// How a namespace's ACEs are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclWriteMode {
    /// Merge into the current ACL locally and write the whole list back in one call.
    List,
    /// Write individual entries; `merge` lets the server OR bits into existing ones.
    Entries { merge: bool },
}

/// Fold `permissions` into an `(allow, deny)` pair.
///
/// Allow sets the bit and clears deny, deny sets the bit and clears allow,
/// notset clears both. Unknown action names are a configuration error.
pub fn apply_permissions(
    actions: &ActionMap,
    base: (i32, i32),
    permissions: &BTreeMap<String, PermissionState>,
) -> AzdoResult<(i32, i32)> {
    let (mut allow, mut deny) = base;
    for (action, state) in permissions {
        let bit = actions.bit(action)?;
        match state {
            PermissionState::Allow => {
                allow |= bit;
                deny &= !bit;
            }
            PermissionState::Deny => {
                deny |= bit;
                allow &= !bit;
            }
            PermissionState::NotSet => {
                allow &= !bit;
                deny &= !bit;
            }
        }
    }
    Ok((allow, deny))
}

/// State of every action in the namespace for one ACE.
pub fn decode_permissions(actions: &ActionMap, allow: i32, deny: i32) -> BTreeMap<String, PermissionState> {
    actions
        .actions()
        .iter()
        .map(|a| (a.name.clone(), PermissionState::from_bits(a.bit, allow, deny)))
        .collect()
}

/// Permission reads and writes against one namespace.
#[derive(Clone)]
pub struct PermissionEngine {
    clients: Arc<AzdoClients>,
    namespaces: Arc<NamespaceCache>,
    namespace_id: Uuid,
    mode: AclWriteMode,
}

impl PermissionEngine {
    pub fn new(ctx: &ProviderContext, namespace: SecurityNamespaceId, mode: AclWriteMode) -> Self {
        Self {
            clients: Arc::clone(&ctx.clients),
            namespaces: Arc::clone(&ctx.namespaces),
            namespace_id: namespace.id(),
            mode,
        }
    }

    pub async fn actions(&self) -> AzdoResult<Arc<ActionMap>> {
        self.namespaces
            .resolve(&self.clients.security, &self.namespace_id)
            .await
    }

    async fn current_acl(&self, token: &str) -> AzdoResult<Option<AccessControlList>> {
        let acls = self
            .clients
            .security
            .get_access_control_lists(&self.namespace_id, token, false)
            .await?;
        let mut acls = acls.into_iter();
        let first = acls.next();
        Ok(match first {
            Some(acl) if acl.token.eq_ignore_ascii_case(token) => Some(acl),
            first => acls.find(|a| a.token.eq_ignore_ascii_case(token)).or(first),
        })
    }

    /// Write `sets` to `token`. When `replace` is false, actions a set does not
    /// mention keep the bits already on the server.
    #[instrument(skip(self, sets), fields(namespace = %self.namespace_id, count = sets.len()))]
    pub async fn create_or_update(
        &self,
        project_id: &str,
        token: &str,
        sets: &[PermissionSet],
        replace: bool,
    ) -> AzdoResult<Vec<PermissionSet>> {
        let actions = self.actions().await?;
        let existing = self.current_acl(token).await?;

        let mut entries = Vec::with_capacity(sets.len());
        let mut resolved = Vec::with_capacity(sets.len());
        for set in sets {
            let descriptor = if set.identity_descriptor.is_empty() {
                let principal = super::permission::Principal::Named {
                    name: set.identity_name.clone(),
                    kind: set.identity_type,
                };
                resolve_descriptor(&self.clients, project_id, &principal).await?
            } else {
                set.identity_descriptor.clone()
            };

            let base = match (&existing, replace) {
                (Some(acl), false) => find_ace(acl, &descriptor)
                    .map(|ace| (ace.allow, ace.deny))
                    .unwrap_or_default(),
                _ => (0, 0),
            };
            let (allow, deny) = apply_permissions(&actions, base, &set.permissions)?;
            debug!(descriptor = %descriptor, allow, deny, "Computed access control entry");

            entries.push(AccessControlEntry {
                descriptor: descriptor.clone(),
                allow,
                deny,
                extended_info: None,
            });
            resolved.push(PermissionSet {
                identity_descriptor: descriptor,
                ..set.clone()
            });
        }

        match self.mode {
            AclWriteMode::List => {
                let mut acl = existing.unwrap_or_else(|| AccessControlList {
                    token: token.to_string(),
                    inherit_permissions: true,
                    aces_dictionary: BTreeMap::new(),
                });
                acl.token = token.to_string();
                for entry in entries {
                    acl.aces_dictionary
                        .retain(|key, _| !key.eq_ignore_ascii_case(&entry.descriptor));
                    acl.aces_dictionary.insert(entry.descriptor.clone(), entry);
                }
                self.clients
                    .security
                    .set_access_control_lists(&self.namespace_id, &[acl])
                    .await?;
            }
            AclWriteMode::Entries { merge } => {
                let args = SetAccessControlEntriesArgs {
                    token: token.to_string(),
                    merge,
                    access_control_entries: entries,
                };
                self.clients
                    .security
                    .set_access_control_entries(&self.namespace_id, &args)
                    .await?;
            }
        }

        info!(token, "Applied permissions");
        Ok(resolved)
    }

    /// Every identity's permissions on `token`; `None` when the token has no ACL.
    #[instrument(skip(self), fields(namespace = %self.namespace_id))]
    pub async fn read(&self, token: &str) -> AzdoResult<Option<Vec<PermissionSet>>> {
        let Some(acl) = self.current_acl(token).await? else {
            return Ok(None);
        };
        let actions = self.actions().await?;

        let descriptors: Vec<String> = acl.aces_dictionary.values().map(|a| a.descriptor.clone()).collect();
        let identities: HashMap<String, _> = if descriptors.is_empty() {
            HashMap::new()
        } else {
            self.clients
                .security
                .get_identities_by_descriptors(&descriptors)
                .await?
                .into_iter()
                .map(|i| (i.descriptor.to_ascii_lowercase(), i))
                .collect()
        };

        let sets = acl
            .aces_dictionary
            .values()
            .map(|ace| {
                let identity = identities.get(&ace.descriptor.to_ascii_lowercase());
                PermissionSet {
                    identity_descriptor: ace.descriptor.clone(),
                    identity_name: identity.map(identity_display_name).unwrap_or_default(),
                    identity_type: SubjectKind::of_descriptor(&ace.descriptor),
                    permissions: decode_permissions(&actions, ace.allow, ace.deny),
                }
            })
            .collect();
        Ok(Some(sets))
    }

    /// Drop the ACEs of `descriptors` from `token`.
    #[instrument(skip(self), fields(namespace = %self.namespace_id))]
    pub async fn remove(&self, token: &str, descriptors: &[String]) -> AzdoResult<()> {
        if descriptors.is_empty() {
            return Ok(());
        }
        let removed = self
            .clients
            .security
            .remove_access_control_entries(&self.namespace_id, token, descriptors)
            .await?;
        if !removed {
            // The server answers `false` when no entry was left to remove.
            debug!(token, "No access control entries to remove");
        }
        Ok(())
    }
}

fn find_ace<'a>(acl: &'a AccessControlList, descriptor: &str) -> Option<&'a AccessControlEntry> {
    acl.aces_dictionary
        .values()
        .find(|ace| ace.descriptor.eq_ignore_ascii_case(descriptor))
}
