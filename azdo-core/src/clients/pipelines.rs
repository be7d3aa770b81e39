//! Pipelines area: pipeline permissions, general settings and retention.

use crate::error::AzdoResult;
use crate::rest::RestClient;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

const PERMISSIONS_API_VERSION: &str = "7.0-preview.1";
const GENERAL_SETTINGS_API_VERSION: &str = "7.1-preview.1";
const RETENTION_API_VERSION: &str = "7.0";

/// Resource kinds that pipelines must be authorized to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResourceType {
    Queue,
    Endpoint,
    Environment,
    VariableGroup,
    SecureFile,
    Repository,
}

impl PipelineResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineResourceType::Queue => "queue",
            PipelineResourceType::Endpoint => "endpoint",
            PipelineResourceType::Environment => "environment",
            PipelineResourceType::VariableGroup => "variablegroup",
            PipelineResourceType::SecureFile => "securefile",
            PipelineResourceType::Repository => "repository",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResource {
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub authorized: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelinePermission {
    pub id: i32,
    pub authorized: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePipelinePermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<PermissionResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_pipelines: Option<Permission>,
    #[serde(default)]
    pub pipelines: Vec<PipelinePermission>,
}

impl ResourcePipelinePermissions {
    pub fn all_pipelines_authorized(&self) -> bool {
        self.all_pipelines.as_ref().is_some_and(|p| p.authorized)
    }
}

/// Project-level pipeline switches; unset fields are left untouched on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineGeneralSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_classic_pipeline_creation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_job_auth_scope: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_job_auth_scope_for_releases: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_referenced_repo_scoped_token: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_settable_var: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_pipeline_metadata: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_badges_are_private: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionSetting {
    #[serde(default)]
    pub min: i32,
    #[serde(default)]
    pub max: i32,
    pub value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRetentionSetting {
    #[serde(default)]
    pub purge_artifacts: RetentionSetting,
    #[serde(default)]
    pub purge_pull_request_runs: RetentionSetting,
    #[serde(default)]
    pub purge_runs: RetentionSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateRetentionValue {
    pub value: i32,
}

/// Retention values in days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRetentionSetting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_retention: Option<UpdateRetentionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_run_retention: Option<UpdateRetentionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_retention: Option<UpdateRetentionValue>,
}

impl UpdateProjectRetentionSetting {
    pub fn new(artifacts: i32, pull_request_runs: i32, runs: i32) -> Self {
        Self {
            artifacts_retention: Some(UpdateRetentionValue { value: artifacts }),
            pull_request_run_retention: Some(UpdateRetentionValue { value: pull_request_runs }),
            run_retention: Some(UpdateRetentionValue { value: runs }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelinesClient {
    rest: RestClient,
}

impl PipelinesClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    fn permission_segments(project: &str, resource_type: PipelineResourceType, resource_id: &str) -> [String; 6] {
        [
            project.to_string(),
            "_apis".to_string(),
            "pipelines".to_string(),
            "pipelinepermissions".to_string(),
            resource_type.as_str().to_string(),
            resource_id.to_string(),
        ]
    }

    #[instrument(skip(self))]
    pub async fn get_pipeline_permissions(
        &self,
        project: &str,
        resource_type: PipelineResourceType,
        resource_id: &str,
    ) -> AzdoResult<ResourcePipelinePermissions> {
        self.rest
            .get(Self::permission_segments(project, resource_type, resource_id))
            .api_version(PERMISSIONS_API_VERSION)
            .send()
            .await
    }

    #[instrument(skip(self, permissions))]
    pub async fn update_pipeline_permissions(
        &self,
        project: &str,
        resource_type: PipelineResourceType,
        resource_id: &str,
        permissions: &ResourcePipelinePermissions,
    ) -> AzdoResult<ResourcePipelinePermissions> {
        self.rest
            .patch(Self::permission_segments(project, resource_type, resource_id))
            .api_version(PERMISSIONS_API_VERSION)
            .json(permissions)?
            .send()
            .await
    }

    /// Set `allPipelines.authorized` on a resource.
    pub async fn set_all_pipelines_authorized(
        &self,
        project: &str,
        resource_type: PipelineResourceType,
        resource_id: &str,
        authorized: bool,
    ) -> AzdoResult<ResourcePipelinePermissions> {
        let body = ResourcePipelinePermissions {
            resource: Some(PermissionResource {
                resource_type: resource_type.as_str().to_string(),
                id: resource_id.to_string(),
                name: None,
            }),
            all_pipelines: Some(Permission { authorized }),
            pipelines: Vec::new(),
        };
        let result = self
            .update_pipeline_permissions(project, resource_type, resource_id, &body)
            .await?;
        info!(
            project = %project,
            resource_type = resource_type.as_str(),
            resource_id = %resource_id,
            authorized,
            "Updated pipeline authorization"
        );
        Ok(result)
    }

    /// Authorize every pipeline in the project to use the resource.
    pub async fn grant_all_pipelines(
        &self,
        project: &str,
        resource_type: PipelineResourceType,
        resource_id: &str,
    ) -> AzdoResult<ResourcePipelinePermissions> {
        self.set_all_pipelines_authorized(project, resource_type, resource_id, true)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_general_settings(&self, project: &str) -> AzdoResult<PipelineGeneralSettings> {
        self.rest
            .get([project, "_apis", "build", "generalsettings"])
            .api_version(GENERAL_SETTINGS_API_VERSION)
            .send()
            .await
    }

    #[instrument(skip(self, settings))]
    pub async fn update_general_settings(
        &self,
        project: &str,
        settings: &PipelineGeneralSettings,
    ) -> AzdoResult<PipelineGeneralSettings> {
        self.rest
            .patch([project, "_apis", "build", "generalsettings"])
            .api_version(GENERAL_SETTINGS_API_VERSION)
            .json(settings)?
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_retention_settings(&self, project: &str) -> AzdoResult<ProjectRetentionSetting> {
        self.rest
            .get([project, "_apis", "build", "retention"])
            .api_version(RETENTION_API_VERSION)
            .send()
            .await
    }

    #[instrument(skip(self, settings))]
    pub async fn update_retention_settings(
        &self,
        project: &str,
        settings: &UpdateProjectRetentionSetting,
    ) -> AzdoResult<ProjectRetentionSetting> {
        self.rest
            .patch([project, "_apis", "build", "retention"])
            .api_version(RETENTION_API_VERSION)
            .json(settings)?
            .send()
            .await
    }
}
