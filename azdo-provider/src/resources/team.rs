//! `azuredevops_team`

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::clients::core::{TeamArgs, WebApiTeam};
use azdo_core::utils::validate_non_blank;
use azdo_core::{AzdoError, AzdoResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TeamModel {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub project_id: Uuid,
    #[validate(custom(function = "validate_non_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Graph descriptor, usable as a membership container.
    #[serde(default)]
    pub descriptor: Option<String>,
}

impl TeamModel {
    fn from_team(team: WebApiTeam, project_id: Uuid, descriptor: Option<String>) -> Self {
        Self {
            id: team.id,
            project_id,
            name: team.name,
            description: team.description,
            descriptor,
        }
    }

    fn key(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_else(|| self.name.clone())
    }
}

pub struct TeamResource;

async fn team_descriptor(ctx: &ProviderContext, team: &WebApiTeam) -> AzdoResult<Option<String>> {
    match team.id {
        Some(id) => Ok(Some(ctx.clients.graph.get_descriptor(&id).await?)),
        None => Ok(None),
    }
}

#[async_trait]
impl Resource for TeamResource {
    type Model = TeamModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_team"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: TeamModel) -> AzdoResult<TeamModel> {
        let project = planned.project_id.to_string();
        let args = TeamArgs {
            name: Some(planned.name.clone()),
            description: Some(planned.description.clone()),
        };
        let team = ctx.clients.core.create_team(&project, &args).await?;
        let descriptor = team_descriptor(ctx, &team).await?;
        info!(project_id = %project, team = %team.name, "Created team");
        Ok(TeamModel::from_team(team, planned.project_id, descriptor))
    }

    async fn read(&self, ctx: &ProviderContext, state: TeamModel) -> AzdoResult<Option<TeamModel>> {
        let team = ctx
            .clients
            .core
            .get_team(&state.project_id.to_string(), &state.key())
            .await?;
        let descriptor = match &state.descriptor {
            Some(d) if team.id == state.id => Some(d.clone()),
            _ => team_descriptor(ctx, &team).await?,
        };
        Ok(Some(TeamModel::from_team(team, state.project_id, descriptor)))
    }

    async fn update(&self, ctx: &ProviderContext, prior: TeamModel, planned: TeamModel) -> AzdoResult<TeamModel> {
        let id = prior
            .id
            .ok_or_else(|| AzdoError::Validation(format!("team '{}' has no id in state", prior.name)))?;
        let args = TeamArgs {
            name: (prior.name != planned.name).then(|| planned.name.clone()),
            description: Some(planned.description.clone()),
        };
        let team = ctx
            .clients
            .core
            .update_team(&planned.project_id.to_string(), &id.to_string(), &args)
            .await?;
        Ok(TeamModel::from_team(team, planned.project_id, prior.descriptor))
    }

    async fn delete(&self, ctx: &ProviderContext, state: TeamModel) -> AzdoResult<()> {
        ctx.clients
            .core
            .delete_team(&state.project_id.to_string(), &state.key())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefers_id() {
        let mut m: TeamModel = serde_json::from_value(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "name": "Platform"
        }))
        .unwrap();
        assert_eq!(m.key(), "Platform");
        m.id = Some(Uuid::nil());
        assert_eq!(m.key(), Uuid::nil().to_string());
    }
}
