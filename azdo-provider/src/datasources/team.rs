//! `azuredevops_team` and `azuredevops_teams`.

use crate::context::ProviderContext;
use crate::registry::{DataSource, ProviderRegistry};
use async_trait::async_trait;
use azdo_core::clients::core::WebApiTeam;
use azdo_core::utils::validate_non_blank;
use azdo_core::{AzdoResult, NotFoundExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub fn register(registry: &mut ProviderRegistry) {
    registry.register_data_source(TeamDataSource);
    registry.register_data_source(TeamsDataSource);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamData {
    pub id: Option<Uuid>,
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub descriptor: Option<String>,
}

async fn team_data(ctx: &ProviderContext, project_id: Uuid, team: WebApiTeam) -> AzdoResult<TeamData> {
    let descriptor = match &team.id {
        Some(id) => ctx.clients.graph.get_descriptor(id).await.optional()?,
        None => None,
    };
    Ok(TeamData {
        id: team.id,
        project_id,
        name: team.name,
        description: team.description,
        descriptor,
    })
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TeamLookup {
    pub project_id: Uuid,
    #[validate(custom(function = "validate_non_blank"))]
    pub name: String,
}

pub struct TeamDataSource;

#[async_trait]
impl DataSource for TeamDataSource {
    type Args = TeamLookup;
    type Output = TeamData;

    fn type_name(&self) -> &'static str {
        "azuredevops_team"
    }

    async fn read(&self, ctx: &ProviderContext, args: TeamLookup) -> AzdoResult<TeamData> {
        let team = ctx
            .clients
            .core
            .get_team(&args.project_id.to_string(), &args.name)
            .await?;
        team_data(ctx, args.project_id, team).await
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TeamsQuery {
    /// Every project when unset.
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub top: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamsData {
    pub teams: Vec<TeamData>,
}

pub struct TeamsDataSource;

#[async_trait]
impl DataSource for TeamsDataSource {
    type Args = TeamsQuery;
    type Output = TeamsData;

    fn type_name(&self) -> &'static str {
        "azuredevops_teams"
    }

    async fn read(&self, ctx: &ProviderContext, args: TeamsQuery) -> AzdoResult<TeamsData> {
        let projects = match args.project_id {
            Some(id) => vec![id],
            None => ctx
                .clients
                .core
                .get_all_projects(None)
                .await?
                .into_iter()
                .filter_map(|p| p.id)
                .collect(),
        };

        let mut teams = Vec::new();
        for project_id in projects {
            let found = ctx
                .clients
                .core
                .get_teams(&project_id.to_string(), false, args.top)
                .await?;
            for team in found {
                teams.push(team_data(ctx, project_id, team).await?);
            }
        }
        Ok(TeamsData { teams })
    }
}
