//! Project, process and feature lookups.

use crate::context::ProviderContext;
use crate::registry::{DataSource, ProviderRegistry};
use async_trait::async_trait;
use azdo_core::clients::core::{Process, ProjectVisibility, TeamProject};
use azdo_core::utils::FeatureState;
use azdo_core::{AzdoError, AzdoResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub fn register(registry: &mut ProviderRegistry) {
    registry.register_data_source(ProjectDataSource);
    registry.register_data_source(ProjectsDataSource);
    registry.register_data_source(ProcessDataSource);
    registry.register_data_source(ProjectFeaturesDataSource);
}

fn exactly_one(a: bool, b: bool, message: &'static str) -> Result<(), ValidationError> {
    if a == b {
        let mut err = ValidationError::new("lookup");
        err.message = Some(message.into());
        return Err(err);
    }
    Ok(())
}

// --- azuredevops_project ---

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_project_lookup"))]
pub struct ProjectLookup {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
}

fn validate_project_lookup(args: &ProjectLookup) -> Result<(), ValidationError> {
    exactly_one(
        args.project_id.is_some(),
        args.name.as_deref().is_some_and(|n| !n.trim().is_empty()),
        "set either project_id or name",
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectData {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub state: Option<String>,
    pub visibility: Option<ProjectVisibility>,
    pub version_control: Option<String>,
    pub process_template_id: Option<String>,
    pub work_item_template: Option<String>,
}

impl ProjectData {
    fn from_project(project: &TeamProject, work_item_template: Option<String>) -> AzdoResult<Self> {
        let id = project
            .id
            .ok_or_else(|| AzdoError::Internal(anyhow::anyhow!("project without an id")))?;
        Ok(Self {
            id,
            name: project.name.clone().unwrap_or_default(),
            description: project.description.clone().unwrap_or_default(),
            state: project.state.clone(),
            visibility: project.visibility,
            version_control: project.version_control().map(str::to_string),
            process_template_id: project.process_template_id().map(str::to_string),
            work_item_template,
        })
    }
}

pub struct ProjectDataSource;

#[async_trait]
impl DataSource for ProjectDataSource {
    type Args = ProjectLookup;
    type Output = ProjectData;

    fn type_name(&self) -> &'static str {
        "azuredevops_project"
    }

    async fn read(&self, ctx: &ProviderContext, args: ProjectLookup) -> AzdoResult<ProjectData> {
        let key = match (&args.project_id, &args.name) {
            (Some(id), _) => id.to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => return Err(AzdoError::Validation("set either project_id or name".into())),
        };
        let project = ctx.clients.core.get_project(&key).await?;

        let process = match project.process_template_id().and_then(|p| Uuid::parse_str(p).ok()) {
            Some(id) => ctx.clients.core.get_process(&id).await.ok().map(|p| p.name),
            None => None,
        };
        ProjectData::from_project(&project, process)
    }
}

// --- azuredevops_projects ---

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProjectsQuery {
    /// `wellFormed`, `createPending`, `all`, ...
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project_id: Uuid,
    pub name: String,
    pub state: Option<String>,
    pub project_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectsData {
    pub projects: Vec<ProjectSummary>,
}

pub struct ProjectsDataSource;

#[async_trait]
impl DataSource for ProjectsDataSource {
    type Args = ProjectsQuery;
    type Output = ProjectsData;

    fn type_name(&self) -> &'static str {
        "azuredevops_projects"
    }

    async fn read(&self, ctx: &ProviderContext, args: ProjectsQuery) -> AzdoResult<ProjectsData> {
        let projects = ctx
            .clients
            .core
            .get_all_projects(args.state.as_deref())
            .await?
            .into_iter()
            .filter(|p| match (&args.name, &p.name) {
                (Some(wanted), Some(name)) => wanted.eq_ignore_ascii_case(name),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter_map(|p| {
                Some(ProjectSummary {
                    project_id: p.id?,
                    name: p.name.unwrap_or_default(),
                    state: p.state,
                    project_url: p.url,
                })
            })
            .collect();
        Ok(ProjectsData { projects })
    }
}

// --- azuredevops_process ---

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_process_lookup"))]
pub struct ProcessLookup {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
}

fn validate_process_lookup(args: &ProcessLookup) -> Result<(), ValidationError> {
    exactly_one(
        args.id.is_some(),
        args.name.as_deref().is_some_and(|n| !n.trim().is_empty()),
        "set either id or name",
    )
}

pub struct ProcessDataSource;

#[async_trait]
impl DataSource for ProcessDataSource {
    type Args = ProcessLookup;
    type Output = Process;

    fn type_name(&self) -> &'static str {
        "azuredevops_process"
    }

    async fn read(&self, ctx: &ProviderContext, args: ProcessLookup) -> AzdoResult<Process> {
        if let Some(id) = &args.id {
            return ctx.clients.core.get_process(id).await;
        }
        let name = args.name.unwrap_or_default();
        ctx.clients
            .core
            .get_processes()
            .await?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(&name))
            .ok_or_else(|| AzdoError::Misconfigured(format!("process '{name}' not found")))
    }
}

// --- azuredevops_project_features ---

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProjectFeaturesLookup {
    pub project_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectFeaturesData {
    pub project_id: Uuid,
    pub features: BTreeMap<&'static str, FeatureState>,
}

pub struct ProjectFeaturesDataSource;

#[async_trait]
impl DataSource for ProjectFeaturesDataSource {
    type Args = ProjectFeaturesLookup;
    type Output = ProjectFeaturesData;

    fn type_name(&self) -> &'static str {
        "azuredevops_project_features"
    }

    async fn read(&self, ctx: &ProviderContext, args: ProjectFeaturesLookup) -> AzdoResult<ProjectFeaturesData> {
        let features = ctx
            .clients
            .core
            .get_project_features(&args.project_id)
            .await?
            .into_iter()
            .map(|(feature, state)| (feature.name(), state))
            .collect();
        Ok(ProjectFeaturesData {
            project_id: args.project_id,
            features,
        })
    }
}
