//! `azuredevops_team_members` and `azuredevops_group_membership`.
//!
//! Both reconcile graph memberships of one container descriptor.

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::AzdoResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// `add` leaves members it does not list alone; `overwrite` removes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipMode {
    #[default]
    Add,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TeamMembersModel {
    pub project_id: Uuid,
    pub team_id: Uuid,
    #[serde(default)]
    pub mode: MembershipMode,
    /// Subject descriptors.
    #[serde(default)]
    pub members: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GroupMembershipModel {
    /// Subject descriptor of the group.
    #[validate(length(min = 1))]
    pub group: String,
    #[serde(default)]
    pub mode: MembershipMode,
    #[serde(default)]
    pub members: BTreeSet<String>,
}

/// Apply `desired` to `container` according to `mode`.
async fn apply(
    ctx: &ProviderContext,
    container: &str,
    mode: MembershipMode,
    prior: &BTreeSet<String>,
    desired: &BTreeSet<String>,
) -> AzdoResult<()> {
    let desired_list: Vec<String> = desired.iter().cloned().collect();
    match mode {
        MembershipMode::Overwrite => {
            ctx.clients
                .graph
                .update_group_memberships(container, &desired_list)
                .await?
        }
        MembershipMode::Add => {
            let removed: Vec<String> = prior.difference(desired).cloned().collect();
            let current: BTreeSet<String> = ctx
                .clients
                .graph
                .get_member_descriptors(container)
                .await?
                .into_iter()
                .collect();
            let added: Vec<String> = desired.difference(&current).cloned().collect();
            ctx.clients.graph.create_group_memberships(container, &added).await?;
            ctx.clients.graph.delete_group_memberships(container, &removed).await?;
        }
    }
    info!(container, mode = ?mode, members = desired.len(), "Reconciled memberships");
    Ok(())
}

/// Members as they should appear in state for `mode`.
async fn observe(
    ctx: &ProviderContext,
    container: &str,
    mode: MembershipMode,
    configured: &BTreeSet<String>,
) -> AzdoResult<BTreeSet<String>> {
    let current: BTreeSet<String> = ctx
        .clients
        .graph
        .get_member_descriptors(container)
        .await?
        .into_iter()
        .collect();
    Ok(match mode {
        MembershipMode::Overwrite => current,
        MembershipMode::Add => configured.intersection(&current).cloned().collect(),
    })
}

async fn remove(ctx: &ProviderContext, container: &str, members: &BTreeSet<String>) -> AzdoResult<()> {
    let members: Vec<String> = members.iter().cloned().collect();
    ctx.clients.graph.delete_group_memberships(container, &members).await
}

pub struct TeamMembersResource;

impl TeamMembersResource {
    async fn container(ctx: &ProviderContext, model: &TeamMembersModel) -> AzdoResult<String> {
        ctx.clients.graph.get_descriptor(&model.team_id).await
    }
}

#[async_trait]
impl Resource for TeamMembersResource {
    type Model = TeamMembersModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_team_members"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id", "team_id"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: TeamMembersModel) -> AzdoResult<TeamMembersModel> {
        let container = Self::container(ctx, &planned).await?;
        apply(ctx, &container, planned.mode, &BTreeSet::new(), &planned.members).await?;
        Ok(planned)
    }

    async fn read(&self, ctx: &ProviderContext, state: TeamMembersModel) -> AzdoResult<Option<TeamMembersModel>> {
        let container = Self::container(ctx, &state).await?;
        let members = observe(ctx, &container, state.mode, &state.members).await?;
        Ok(Some(TeamMembersModel { members, ..state }))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: TeamMembersModel,
        planned: TeamMembersModel,
    ) -> AzdoResult<TeamMembersModel> {
        let container = Self::container(ctx, &planned).await?;
        apply(ctx, &container, planned.mode, &prior.members, &planned.members).await?;
        Ok(planned)
    }

    async fn delete(&self, ctx: &ProviderContext, state: TeamMembersModel) -> AzdoResult<()> {
        let container = Self::container(ctx, &state).await?;
        remove(ctx, &container, &state.members).await
    }
}

pub struct GroupMembershipResource;

#[async_trait]
impl Resource for GroupMembershipResource {
    type Model = GroupMembershipModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_group_membership"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["group"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: GroupMembershipModel) -> AzdoResult<GroupMembershipModel> {
        apply(ctx, &planned.group, planned.mode, &BTreeSet::new(), &planned.members).await?;
        Ok(planned)
    }

    async fn read(&self, ctx: &ProviderContext, state: GroupMembershipModel) -> AzdoResult<Option<GroupMembershipModel>> {
        let members = observe(ctx, &state.group, state.mode, &state.members).await?;
        Ok(Some(GroupMembershipModel { members, ..state }))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: GroupMembershipModel,
        planned: GroupMembershipModel,
    ) -> AzdoResult<GroupMembershipModel> {
        apply(ctx, &planned.group, planned.mode, &prior.members, &planned.members).await?;
        Ok(planned)
    }

    async fn delete(&self, ctx: &ProviderContext, state: GroupMembershipModel) -> AzdoResult<()> {
        remove(ctx, &state.group, &state.members).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_defaults_to_add() {
        let m: GroupMembershipModel = serde_json::from_value(serde_json::json!({
            "group": "vssgp.abc",
            "members": ["aad.one", "aad.two"]
        }))
        .unwrap();
        assert_eq!(m.mode, MembershipMode::Add);
        assert_eq!(m.members.len(), 2);
    }

    #[test]
    fn test_empty_group_is_rejected() {
        let m: GroupMembershipModel = serde_json::from_value(serde_json::json!({"group": ""})).unwrap();
        assert!(m.validate().is_err());
    }
}
