//! `azuredevops_project_pipeline_settings`

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::AzdoResult;
use azdo_core::clients::pipelines::{
    PipelineGeneralSettings, ProjectRetentionSetting, UpdateProjectRetentionSetting, UpdateRetentionValue,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// General switches and retention days. Unset attributes are left as they are on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PipelineSettingsModel {
    pub project_id: Uuid,
    #[serde(default)]
    pub disable_classic_pipeline_creation: Option<bool>,
    #[serde(default)]
    pub enforce_job_auth_scope: Option<bool>,
    #[serde(default)]
    pub enforce_job_auth_scope_for_releases: Option<bool>,
    #[serde(default)]
    pub enforce_referenced_repo_scoped_token: Option<bool>,
    #[serde(default)]
    pub enforce_settable_var: Option<bool>,
    #[serde(default)]
    pub publish_pipeline_metadata: Option<bool>,
    #[serde(default)]
    pub status_badges_are_private: Option<bool>,
    #[serde(default)]
    #[validate(range(min = 1, max = 60))]
    pub artifacts_retention_days: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, max = 30))]
    pub pull_request_run_retention_days: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 30, max = 731))]
    pub run_retention_days: Option<i32>,
}

/// Values a new project starts with.
pub fn default_general_settings() -> PipelineGeneralSettings {
    PipelineGeneralSettings {
        disable_classic_pipeline_creation: Some(false),
        enforce_job_auth_scope: Some(true),
        enforce_job_auth_scope_for_releases: Some(true),
        enforce_referenced_repo_scoped_token: Some(true),
        enforce_settable_var: Some(true),
        publish_pipeline_metadata: Some(false),
        status_badges_are_private: Some(true),
    }
}

pub fn default_retention() -> UpdateProjectRetentionSetting {
    UpdateProjectRetentionSetting::new(30, 10, 30)
}

impl PipelineSettingsModel {
    pub fn general(&self) -> PipelineGeneralSettings {
        PipelineGeneralSettings {
            disable_classic_pipeline_creation: self.disable_classic_pipeline_creation,
            enforce_job_auth_scope: self.enforce_job_auth_scope,
            enforce_job_auth_scope_for_releases: self.enforce_job_auth_scope_for_releases,
            enforce_referenced_repo_scoped_token: self.enforce_referenced_repo_scoped_token,
            enforce_settable_var: self.enforce_settable_var,
            publish_pipeline_metadata: self.publish_pipeline_metadata,
            status_badges_are_private: self.status_badges_are_private,
        }
    }

    pub fn retention(&self) -> UpdateProjectRetentionSetting {
        let value = |days: Option<i32>| days.map(|value| UpdateRetentionValue { value });
        UpdateProjectRetentionSetting {
            artifacts_retention: value(self.artifacts_retention_days),
            pull_request_run_retention: value(self.pull_request_run_retention_days),
            run_retention: value(self.run_retention_days),
        }
    }

    pub fn from_settings(project_id: Uuid, general: &PipelineGeneralSettings, retention: &ProjectRetentionSetting) -> Self {
        Self {
            project_id,
            disable_classic_pipeline_creation: general.disable_classic_pipeline_creation,
            enforce_job_auth_scope: general.enforce_job_auth_scope,
            enforce_job_auth_scope_for_releases: general.enforce_job_auth_scope_for_releases,
            enforce_referenced_repo_scoped_token: general.enforce_referenced_repo_scoped_token,
            enforce_settable_var: general.enforce_settable_var,
            publish_pipeline_metadata: general.publish_pipeline_metadata,
            status_badges_are_private: general.status_badges_are_private,
            artifacts_retention_days: Some(retention.purge_artifacts.value),
            pull_request_run_retention_days: Some(retention.purge_pull_request_runs.value),
            run_retention_days: Some(retention.purge_runs.value),
        }
    }
}

pub struct PipelineSettingsResource;

impl PipelineSettingsResource {
    pub async fn fetch(ctx: &ProviderContext, project_id: Uuid) -> AzdoResult<PipelineSettingsModel> {
        let project = project_id.to_string();
        let general = ctx.clients.pipelines.get_general_settings(&project).await?;
        let retention = ctx.clients.pipelines.get_retention_settings(&project).await?;
        Ok(PipelineSettingsModel::from_settings(project_id, &general, &retention))
    }

    async fn apply(
        ctx: &ProviderContext,
        project_id: Uuid,
        general: &PipelineGeneralSettings,
        retention: &UpdateProjectRetentionSetting,
    ) -> AzdoResult<()> {
        let project = project_id.to_string();
        if *general != PipelineGeneralSettings::default() {
            ctx.clients.pipelines.update_general_settings(&project, general).await?;
        }
        if *retention != UpdateProjectRetentionSetting::default() {
            ctx.clients.pipelines.update_retention_settings(&project, retention).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for PipelineSettingsResource {
    type Model = PipelineSettingsModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_project_pipeline_settings"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: PipelineSettingsModel) -> AzdoResult<PipelineSettingsModel> {
        Self::apply(ctx, planned.project_id, &planned.general(), &planned.retention()).await?;
        Self::fetch(ctx, planned.project_id).await
    }

    async fn read(&self, ctx: &ProviderContext, state: PipelineSettingsModel) -> AzdoResult<Option<PipelineSettingsModel>> {
        Ok(Some(Self::fetch(ctx, state.project_id).await?))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: PipelineSettingsModel,
        planned: PipelineSettingsModel,
    ) -> AzdoResult<PipelineSettingsModel> {
        Self::apply(ctx, planned.project_id, &planned.general(), &planned.retention()).await?;
        Self::fetch(ctx, planned.project_id).await
    }

    /// Restores the settings a new project has.
    async fn delete(&self, ctx: &ProviderContext, state: PipelineSettingsModel) -> AzdoResult<()> {
        Self::apply(ctx, state.project_id, &default_general_settings(), &default_retention()).await?;
        info!(project_id = %state.project_id, "Restored default pipeline settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(json: serde_json::Value) -> PipelineSettingsModel {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_retention_ranges() {
        let ok = model(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "artifacts_retention_days": 60,
            "pull_request_run_retention_days": 1,
            "run_retention_days": 731
        }));
        assert!(ok.validate().is_ok());

        let too_short = model(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "run_retention_days": 29
        }));
        assert!(too_short.validate().is_err());

        let too_long = model(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "pull_request_run_retention_days": 31
        }));
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_only_configured_values_are_sent() {
        let m = model(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "enforce_settable_var": false,
            "run_retention_days": 45
        }));
        assert_eq!(
            serde_json::to_value(m.general()).unwrap(),
            serde_json::json!({"enforceSettableVar": false})
        );
        assert_eq!(
            serde_json::to_value(m.retention()).unwrap(),
            serde_json::json!({"runRetention": {"value": 45}})
        );
    }

    #[test]
    fn test_defaults() {
        let general = default_general_settings();
        assert_eq!(general.disable_classic_pipeline_creation, Some(false));
        assert_eq!(general.status_badges_are_private, Some(true));
        assert_eq!(
            serde_json::to_value(default_retention()).unwrap(),
            serde_json::json!({
                "artifactsRetention": {"value": 30},
                "pullRequestRunRetention": {"value": 10},
                "runRetention": {"value": 30}
            })
        );
    }
}
