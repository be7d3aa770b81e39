//! `azuredevops_project_pipeline_settings`

use crate::context::ProviderContext;
use crate::registry::{DataSource, ProviderRegistry};
use crate::resources::pipeline_settings::{PipelineSettingsModel, PipelineSettingsResource};
use async_trait::async_trait;
use azdo_core::AzdoResult;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

pub fn register(registry: &mut ProviderRegistry) {
    registry.register_data_source(PipelineSettingsDataSource);
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PipelineSettingsLookup {
    pub project_id: Uuid,
}

pub struct PipelineSettingsDataSource;

#[async_trait]
impl DataSource for PipelineSettingsDataSource {
    type Args = PipelineSettingsLookup;
    type Output = PipelineSettingsModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_project_pipeline_settings"
    }

    async fn read(&self, ctx: &ProviderContext, args: PipelineSettingsLookup) -> AzdoResult<PipelineSettingsModel> {
        PipelineSettingsResource::fetch(ctx, args.project_id).await
    }
}
