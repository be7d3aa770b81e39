//! `azuredevops_serviceendpoint_share`: which other projects may use an endpoint.

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::clients::serviceendpoint::{ProjectReference, ServiceEndpoint, ServiceEndpointProjectReference};
use azdo_core::utils::{SetDiff, set_diff};
use azdo_core::AzdoResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ServiceEndpointShareModel {
    /// Owning project.
    pub project_id: Uuid,
    pub serviceendpoint_id: Uuid,
    /// Projects the endpoint is shared with, besides the owner.
    #[serde(default)]
    pub project_ids: BTreeSet<Uuid>,
}

/// Changes needed to go from `current` to `desired`, never touching the owner.
pub fn share_changes(owner: &Uuid, current: &[Uuid], desired: &BTreeSet<Uuid>) -> SetDiff<Uuid> {
    let current: Vec<Uuid> = current.iter().filter(|id| *id != owner).copied().collect();
    let desired: Vec<Uuid> = desired.iter().filter(|id| *id != owner).copied().collect();
    set_diff(&current, &desired)
}

pub struct ServiceEndpointShareResource;

impl ServiceEndpointShareResource {
    async fn endpoint(ctx: &ProviderContext, model: &ServiceEndpointShareModel) -> AzdoResult<ServiceEndpoint> {
        ctx.clients
            .service_endpoints
            .get_service_endpoint(&model.project_id.to_string(), &model.serviceendpoint_id)
            .await
    }

    async fn apply(ctx: &ProviderContext, model: &ServiceEndpointShareModel, changes: SetDiff<Uuid>) -> AzdoResult<()> {
        let client = &ctx.clients.service_endpoints;
        if !changes.removed.is_empty() {
            client
                .delete_service_endpoint(&model.serviceendpoint_id, &changes.removed)
                .await?;
            info!(endpoint_id = %model.serviceendpoint_id, count = changes.removed.len(), "Unshared service endpoint");
        }
        if !changes.added.is_empty() {
            let endpoint = Self::endpoint(ctx, model).await?;
            let references: Vec<ServiceEndpointProjectReference> = changes
                .added
                .iter()
                .map(|id| ServiceEndpointProjectReference {
                    project_reference: ProjectReference { id: *id, name: None },
                    name: endpoint.name.clone(),
                    description: endpoint.description.clone(),
                })
                .collect();
            client
                .share_service_endpoint(&model.serviceendpoint_id, &references)
                .await?;
            info!(endpoint_id = %model.serviceendpoint_id, count = references.len(), "Shared service endpoint");
        }
        Ok(())
    }

    async fn sync(ctx: &ProviderContext, model: ServiceEndpointShareModel) -> AzdoResult<ServiceEndpointShareModel> {
        let current = Self::endpoint(ctx, &model).await?.project_ids();
        let changes = share_changes(&model.project_id, &current, &model.project_ids);
        Self::apply(ctx, &model, changes).await?;
        Ok(model)
    }
}

#[async_trait]
impl Resource for ServiceEndpointShareResource {
    type Model = ServiceEndpointShareModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_serviceendpoint_share"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id", "serviceendpoint_id"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: Self::Model) -> AzdoResult<Self::Model> {
        Self::sync(ctx, planned).await
    }

    async fn read(&self, ctx: &ProviderContext, state: Self::Model) -> AzdoResult<Option<Self::Model>> {
        let endpoint = Self::endpoint(ctx, &state).await?;
        let project_ids = endpoint
            .project_ids()
            .into_iter()
            .filter(|id| *id != state.project_id)
            .collect();
        Ok(Some(ServiceEndpointShareModel { project_ids, ..state }))
    }

    async fn update(&self, ctx: &ProviderContext, _prior: Self::Model, planned: Self::Model) -> AzdoResult<Self::Model> {
        Self::sync(ctx, planned).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: Self::Model) -> AzdoResult<()> {
        let current = Self::endpoint(ctx, &state).await?.project_ids();
        let changes = share_changes(&state.project_id, &current, &BTreeSet::new());
        // only projects this resource shared
        let removed = changes
            .removed
            .into_iter()
            .filter(|id| state.project_ids.contains(id))
            .collect();
        Self::apply(
            ctx,
            &state,
            SetDiff {
                added: Vec::new(),
                removed,
            },
        )
        .await
    }
}
