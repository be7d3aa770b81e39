//! `azuredevops_environment` and `azuredevops_environment_resource_kubernetes`.

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::clients::distributedtask::{EnvironmentArgs, EnvironmentInstance, KubernetesResource, KubernetesResourceArgs};
use azdo_core::clients::pipelines::PipelineResourceType;
use azdo_core::utils::validate_non_blank;
use azdo_core::{AzdoError, AzdoResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EnvironmentModel {
    #[serde(default)]
    pub id: Option<i32>,
    pub project_id: Uuid,
    #[validate(custom(function = "validate_non_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl EnvironmentModel {
    fn from_instance(env: EnvironmentInstance, project_id: Uuid) -> Self {
        Self {
            id: Some(env.id),
            project_id,
            name: env.name,
            description: env.description,
        }
    }

    fn args(&self) -> EnvironmentArgs {
        EnvironmentArgs {
            name: Some(self.name.clone()),
            description: Some(self.description.clone()),
        }
    }

    fn require_id(&self) -> AzdoResult<i32> {
        self.id
            .ok_or_else(|| AzdoError::Validation(format!("environment '{}' has no id in state", self.name)))
    }
}

pub struct EnvironmentResource;

impl EnvironmentResource {
    async fn grant(ctx: &ProviderContext, project_id: &Uuid, environment_id: i32) -> AzdoResult<()> {
        ctx.clients
            .pipelines
            .grant_all_pipelines(
                &project_id.to_string(),
                PipelineResourceType::Environment,
                &environment_id.to_string(),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for EnvironmentResource {
    type Model = EnvironmentModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_environment"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: EnvironmentModel) -> AzdoResult<EnvironmentModel> {
        let env = ctx
            .clients
            .distributed_task
            .add_environment(&planned.project_id.to_string(), &planned.args())
            .await?;
        Self::grant(ctx, &planned.project_id, env.id).await?;
        info!(environment_id = env.id, project_id = %planned.project_id, "Created environment");
        Ok(EnvironmentModel::from_instance(env, planned.project_id))
    }

    async fn read(&self, ctx: &ProviderContext, state: EnvironmentModel) -> AzdoResult<Option<EnvironmentModel>> {
        let env = ctx
            .clients
            .distributed_task
            .get_environment(&state.project_id.to_string(), state.require_id()?)
            .await?;
        Ok(Some(EnvironmentModel::from_instance(env, state.project_id)))
    }

    async fn update(&self, ctx: &ProviderContext, prior: EnvironmentModel, planned: EnvironmentModel) -> AzdoResult<EnvironmentModel> {
        let id = prior.require_id()?;
        let env = ctx
            .clients
            .distributed_task
            .update_environment(&planned.project_id.to_string(), id, &planned.args())
            .await?;
        Self::grant(ctx, &planned.project_id, id).await?;
        Ok(EnvironmentModel::from_instance(env, planned.project_id))
    }

    async fn delete(&self, ctx: &ProviderContext, state: EnvironmentModel) -> AzdoResult<()> {
        ctx.clients
            .distributed_task
            .delete_environment(&state.project_id.to_string(), state.require_id()?)
            .await
    }
}

/// Every attribute forces replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct KubernetesResourceModel {
    #[serde(default)]
    pub id: Option<i32>,
    pub project_id: Uuid,
    pub environment_id: i32,
    pub service_endpoint_id: Uuid,
    #[validate(custom(function = "validate_non_blank"))]
    pub name: String,
    #[validate(custom(function = "validate_non_blank"))]
    pub namespace: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
}

impl KubernetesResourceModel {
    fn from_resource(resource: KubernetesResource, prior: &Self) -> Self {
        Self {
            id: Some(resource.id),
            project_id: prior.project_id,
            environment_id: resource
                .environment_reference
                .map(|e| e.id)
                .unwrap_or(prior.environment_id),
            service_endpoint_id: resource.service_endpoint_id,
            name: resource.name,
            namespace: resource.namespace,
            cluster_name: resource.cluster_name.or_else(|| prior.cluster_name.clone()),
        }
    }

    fn require_id(&self) -> AzdoResult<i32> {
        self.id
            .ok_or_else(|| AzdoError::Validation(format!("kubernetes resource '{}' has no id in state", self.name)))
    }
}

pub struct KubernetesResourceResource;

#[async_trait]
impl Resource for KubernetesResourceResource {
    type Model = KubernetesResourceModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_environment_resource_kubernetes"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id", "environment_id", "service_endpoint_id", "name", "namespace", "cluster_name"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: KubernetesResourceModel) -> AzdoResult<KubernetesResourceModel> {
        let args = KubernetesResourceArgs {
            name: planned.name.clone(),
            namespace: planned.namespace.clone(),
            cluster_name: planned.cluster_name.clone(),
            service_endpoint_id: planned.service_endpoint_id,
        };
        let resource = ctx
            .clients
            .distributed_task
            .add_kubernetes_resource(&planned.project_id.to_string(), planned.environment_id, &args)
            .await?;
        Ok(KubernetesResourceModel::from_resource(resource, &planned))
    }

    async fn read(&self, ctx: &ProviderContext, state: KubernetesResourceModel) -> AzdoResult<Option<KubernetesResourceModel>> {
        let resource = ctx
            .clients
            .distributed_task
            .get_kubernetes_resource(&state.project_id.to_string(), state.environment_id, state.require_id()?)
            .await?;
        Ok(Some(KubernetesResourceModel::from_resource(resource, &state)))
    }

    async fn update(
        &self,
        _ctx: &ProviderContext,
        _prior: KubernetesResourceModel,
        _planned: KubernetesResourceModel,
    ) -> AzdoResult<KubernetesResourceModel> {
        Err(AzdoError::RequiresReplace("a kubernetes environment resource".into()))
    }

    async fn delete(&self, ctx: &ProviderContext, state: KubernetesResourceModel) -> AzdoResult<()> {
        ctx.clients
            .distributed_task
            .delete_kubernetes_resource(&state.project_id.to_string(), state.environment_id, state.require_id()?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_kubernetes_resource_has_no_update() {
        let ctx = crate::testing::offline_context();
        let model: KubernetesResourceModel = serde_json::from_value(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "environment_id": 3,
            "service_endpoint_id": "5f6a1c2d-0000-4000-8000-000000000002",
            "name": "cluster",
            "namespace": "default"
        }))
        .unwrap();
        let err = KubernetesResourceResource
            .update(&ctx, model.clone(), model)
            .await
            .unwrap_err();
        assert!(matches!(err, AzdoError::RequiresReplace(_)));
    }

    #[test]
    fn test_environment_args() {
        let m: EnvironmentModel = serde_json::from_value(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "name": "prod"
        }))
        .unwrap();
        let args = serde_json::to_value(m.args()).unwrap();
        assert_eq!(args, serde_json::json!({"name": "prod", "description": ""}));
    }
}
