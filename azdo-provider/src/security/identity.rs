//! Principal → identity descriptor resolution.

use super::permission::{Principal, SubjectKind};
use azdo_core::clients::AzdoClients;
use azdo_core::clients::graph::GraphGroup;
use azdo_core::clients::security::Identity;
use azdo_core::{AzdoError, AzdoResult};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Identity descriptor for `principal`. Group names are looked up in the
/// project's scope first, then organization-wide.
#[instrument(skip(clients))]
pub async fn resolve_descriptor(clients: &AzdoClients, project_id: &str, principal: &Principal) -> AzdoResult<String> {
    match principal {
        Principal::Descriptor(descriptor) => Ok(descriptor.clone()),
        Principal::Subject(subject) => {
            let identities = clients
                .security
                .get_identities_by_subject_descriptors(std::slice::from_ref(subject))
                .await?;
            identities
                .into_iter()
                .next()
                .map(|i| i.descriptor)
                .filter(|d| !d.is_empty())
                .ok_or_else(|| AzdoError::Misconfigured(format!("no identity found for subject {subject}")))
        }
        Principal::Named { name, kind: SubjectKind::Group } => resolve_group(clients, project_id, name).await,
        Principal::Named { name, kind: SubjectKind::User } => resolve_user(clients, name).await,
    }
}

async fn resolve_group(clients: &AzdoClients, project_id: &str, name: &str) -> AzdoResult<String> {
    let mut candidates = Vec::new();
    if let Ok(project_uuid) = Uuid::parse_str(project_id) {
        let scope = clients.graph.get_descriptor(&project_uuid).await?;
        candidates = matching_groups(clients.graph.get_all_groups(Some(&scope)).await?, name);
    }
    if candidates.is_empty() {
        candidates = matching_groups(clients.graph.get_all_groups(None).await?, name);
    }

    let group = match candidates.len() {
        1 => candidates.remove(0),
        0 => return Err(AzdoError::Misconfigured(format!("group '{name}' not found"))),
        n => {
            return Err(AzdoError::Misconfigured(format!(
                "group name '{name}' is ambiguous ({n} matches)"
            )));
        }
    };
    debug!(group = %group.display_name, subject = %group.descriptor, "Resolved group");

    let identities = clients
        .security
        .get_identities_by_subject_descriptors(std::slice::from_ref(&group.descriptor))
        .await?;
    identities
        .into_iter()
        .next()
        .map(|i| i.descriptor)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AzdoError::Misconfigured(format!("group '{name}' has no identity")))
}

/// Matches on display name or principal name, with or without the `[scope]\` prefix.
pub(crate) fn matching_groups(groups: Vec<GraphGroup>, name: &str) -> Vec<GraphGroup> {
    groups
        .into_iter()
        .filter(|g| {
            g.display_name.eq_ignore_ascii_case(name)
                || g.principal_name.as_deref().is_some_and(|p| {
                    p.eq_ignore_ascii_case(name)
                        || p.rsplit_once('\\').is_some_and(|(_, short)| short.eq_ignore_ascii_case(name))
                })
        })
        .collect()
}

async fn resolve_user(clients: &AzdoClients, name: &str) -> AzdoResult<String> {
    let mut matches: Vec<Identity> = clients
        .security
        .search_identities(name)
        .await?
        .into_iter()
        .filter(|i| !i.is_container)
        .filter(|i| {
            i.account().is_some_and(|a| a.eq_ignore_ascii_case(name))
                || i.provider_display_name.eq_ignore_ascii_case(name)
        })
        .collect();

    match matches.len() {
        1 => Ok(matches.remove(0).descriptor),
        0 => Err(AzdoError::Misconfigured(format!("user '{name}' not found"))),
        n => Err(AzdoError::Misconfigured(format!("user name '{name}' is ambiguous ({n} matches)"))),
    }
}

/// Display name for an identity as it appears in state.
pub fn identity_display_name(identity: &Identity) -> String {
    match SubjectKind::of_descriptor(&identity.descriptor) {
        SubjectKind::User => identity
            .account()
            .map(str::to_string)
            .unwrap_or_else(|| identity.provider_display_name.clone()),
        SubjectKind::Group => identity.provider_display_name.clone(),
    }
}
