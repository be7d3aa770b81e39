//! `azuredevops_project`

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::clients::core::{
    CreateProjectArgs, ProjectVisibility, SourceControlType, TeamProject, UpdateProjectArgs,
};
use azdo_core::utils::validate_non_blank;
use azdo_core::{AzdoError, AzdoResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProjectModel {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(custom(function = "validate_non_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_visibility")]
    pub visibility: ProjectVisibility,
    #[serde(default = "default_version_control")]
    pub version_control: SourceControlType,
    /// Process name (`Agile`, `Scrum`, ...); the organization default when unset.
    #[serde(default)]
    pub work_item_template: Option<String>,
    #[serde(default)]
    pub process_template_id: Option<Uuid>,
}

fn default_visibility() -> ProjectVisibility {
    ProjectVisibility::Private
}

fn default_version_control() -> SourceControlType {
    SourceControlType::Git
}

impl ProjectModel {
    fn from_project(project: &TeamProject, prior: &ProjectModel) -> AzdoResult<Self> {
        let id = project
            .id
            .ok_or_else(|| AzdoError::UnexpectedState {
                operation: format!("read project {}", prior.name),
                state: "missing id".into(),
                expected: vec!["id".into()],
            })?;
        let version_control = project
            .version_control()
            .and_then(SourceControlType::parse)
            .unwrap_or(prior.version_control);
        let process_template_id = project
            .process_template_id()
            .and_then(|p| Uuid::parse_str(p).ok())
            .or(prior.process_template_id);

        Ok(Self {
            id: Some(id),
            name: project.name.clone().unwrap_or_else(|| prior.name.clone()),
            description: project.description.clone().unwrap_or_default(),
            visibility: project.visibility.unwrap_or(prior.visibility),
            version_control,
            work_item_template: prior.work_item_template.clone(),
            process_template_id,
        })
    }

    fn require_id(&self) -> AzdoResult<Uuid> {
        self.id
            .ok_or_else(|| AzdoError::Validation(format!("project '{}' has no id in state", self.name)))
    }
}

pub struct ProjectResource;

impl ProjectResource {
    /// Process id by explicit id, by name, or the organization default.
    async fn process_id(ctx: &ProviderContext, model: &ProjectModel) -> AzdoResult<Uuid> {
        if let Some(id) = model.process_template_id {
            return Ok(id);
        }
        let processes = ctx.clients.core.get_processes().await?;
        let found = match model.work_item_template.as_deref() {
            Some(name) => processes.iter().find(|p| p.name.eq_ignore_ascii_case(name)),
            None => processes.iter().find(|p| p.is_default),
        };
        found.map(|p| p.id).ok_or_else(|| {
            AzdoError::Misconfigured(match &model.work_item_template {
                Some(name) => format!("process '{name}' does not exist"),
                None => "organization has no default process".to_string(),
            })
        })
    }
}

#[async_trait]
impl Resource for ProjectResource {
    type Model = ProjectModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_project"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["version_control", "work_item_template", "process_template_id"]
    }

    fn modify_plan(&self, prior: Option<&ProjectModel>, planned: &mut ProjectModel) {
        let Some(prior) = prior else {
            return;
        };
        if prior.work_item_template == planned.work_item_template {
            if planned.process_template_id.is_none() {
                planned.process_template_id = prior.process_template_id;
            }
        } else if planned.process_template_id == prior.process_template_id {
            // The resolved id belongs to the old template; resolve again on create.
            planned.process_template_id = None;
        }
    }

    async fn create(&self, ctx: &ProviderContext, planned: ProjectModel) -> AzdoResult<ProjectModel> {
        let process_id = Self::process_id(ctx, &planned).await?;
        let args = CreateProjectArgs::new(
            &planned.name,
            &planned.description,
            planned.visibility,
            &process_id.to_string(),
            planned.version_control,
        );

        let operation = ctx.clients.core.create_project(&args).await?;
        ctx.clients
            .core
            .wait_for_operation(&operation, ctx.poll.project_operations, &ctx.cancel)
            .await?;

        let project = ctx.clients.core.get_project(&planned.name).await?;
        let mut created = ProjectModel::from_project(&project, &planned)?;
        created.process_template_id.get_or_insert(process_id);
        info!(project_id = ?created.id, name = %created.name, "Created project");
        Ok(created)
    }

    async fn read(&self, ctx: &ProviderContext, state: ProjectModel) -> AzdoResult<Option<ProjectModel>> {
        let key = match state.id {
            Some(id) => id.to_string(),
            None => state.name.clone(),
        };
        let project = ctx.clients.core.get_project(&key).await?;
        if project.state.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("deleting")) {
            return Ok(None);
        }
        Ok(Some(ProjectModel::from_project(&project, &state)?))
    }

    async fn update(&self, ctx: &ProviderContext, prior: ProjectModel, planned: ProjectModel) -> AzdoResult<ProjectModel> {
        let id = prior.require_id()?;
        let args = UpdateProjectArgs {
            name: (prior.name != planned.name).then(|| planned.name.clone()),
            description: Some(planned.description.clone()),
            visibility: (prior.visibility != planned.visibility).then_some(planned.visibility),
        };

        let operation = ctx.clients.core.update_project(&id, &args).await?;
        ctx.clients
            .core
            .wait_for_operation(&operation, ctx.poll.project_operations, &ctx.cancel)
            .await?;

        let project = ctx.clients.core.get_project(&id.to_string()).await?;
        ProjectModel::from_project(&project, &planned)
    }

    async fn delete(&self, ctx: &ProviderContext, state: ProjectModel) -> AzdoResult<()> {
        let id = state.require_id()?;
        let operation = ctx.clients.core.delete_project(&id).await?;
        ctx.clients
            .core
            .wait_for_operation(&operation, ctx.poll.project_operations, &ctx.cancel)
            .await?;
        info!(project_id = %id, "Deleted project");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn project() -> TeamProject {
        serde_json::from_value(serde_json::json!({
            "id": "9a3b1e5c-0000-4000-8000-000000000001",
            "name": "demo",
            "description": "",
            "visibility": "private",
            "state": "wellFormed",
            "capabilities": {
                "processTemplate": {"templateTypeId": "6b724908-ef14-45cf-84f8-768b5384da45", "templateName": "Agile"},
                "versioncontrol": {"sourceControlType": "Git"}
            }
        }))
        .unwrap()
    }

    fn model() -> ProjectModel {
        serde_json::from_value(serde_json::json!({"name": "demo"})).unwrap()
    }

    #[test]
    fn test_model_defaults() {
        let m = model();
        assert_eq!(m.visibility, ProjectVisibility::Private);
        assert_eq!(m.version_control, SourceControlType::Git);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let m: ProjectModel = serde_json::from_value(serde_json::json!({"name": "  "})).unwrap();
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_from_project_reads_capabilities() {
        let m = ProjectModel::from_project(&project(), &model()).unwrap();
        assert_eq!(m.id.unwrap().to_string(), "9a3b1e5c-0000-4000-8000-000000000001");
        assert_eq!(
            m.process_template_id.unwrap().to_string(),
            "6b724908-ef14-45cf-84f8-768b5384da45"
        );
        assert_eq!(m.version_control, SourceControlType::Git);
    }

    fn prior_state() -> serde_json::Value {
        serde_json::json!({
            "id": "9a3b1e5c-0000-4000-8000-000000000001",
            "name": "demo",
            "description": "",
            "visibility": "private",
            "version_control": "Git",
            "work_item_template": "Agile",
            "process_template_id": "6b724908-ef14-45cf-84f8-768b5384da45"
        })
    }

    #[test]
    fn test_description_change_keeps_project() {
        let plan = crate::Provider::new()
            .plan(
                "azuredevops_project",
                Some(&prior_state()),
                &serde_json::json!({"name": "demo", "description": "new", "work_item_template": "Agile"}),
            )
            .unwrap();
        assert!(plan.requires_replace.is_empty());
        assert_eq!(
            plan.planned_state["process_template_id"],
            "6b724908-ef14-45cf-84f8-768b5384da45"
        );
    }

    #[test]
    fn test_changed_process_id_requires_replacement() {
        let plan = crate::Provider::new()
            .plan(
                "azuredevops_project",
                Some(&prior_state()),
                &serde_json::json!({
                    "name": "demo",
                    "work_item_template": "Agile",
                    "process_template_id": "27450541-8e31-4150-9947-dc59f998fc01"
                }),
            )
            .unwrap();
        assert_eq!(plan.requires_replace, vec!["process_template_id".to_string()]);
    }

    #[test]
    fn test_changed_template_drops_resolved_id() {
        let plan = crate::Provider::new()
            .plan(
                "azuredevops_project",
                Some(&prior_state()),
                &serde_json::json!({"name": "demo", "work_item_template": "Scrum"}),
            )
            .unwrap();
        assert!(plan.requires_replace.contains(&"work_item_template".to_string()));
        assert!(plan.planned_state["process_template_id"].is_null());
    }

    #[test]
    fn test_from_project_without_capabilities_keeps_prior() {
        let mut p = project();
        p.capabilities = BTreeMap::new();
        let mut prior = model();
        prior.version_control = SourceControlType::Tfvc;
        let m = ProjectModel::from_project(&p, &prior).unwrap();
        assert_eq!(m.version_control, SourceControlType::Tfvc);
        assert!(m.process_template_id.is_none());
    }
}
