//! Service endpoints of every flavor, plus cross-project sharing.
//!
//! Each flavor is an [`EndpointFlavor`]: it turns its configuration into a
//! URL, an authorization scheme and parameters, and optional `data`. The
//! lifecycle (create, wait for readiness, authorize for all pipelines) is
//! shared by [`ServiceEndpointResource`].

pub mod flavors;
pub mod kubeconfig;
pub mod share;

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::clients::pipelines::PipelineResourceType;
use azdo_core::clients::serviceendpoint::{
    EndpointAuthorization, OWNER_LIBRARY, ProjectReference, STATE_FAILED, STATE_IN_PROGRESS, STATE_READY,
    ServiceEndpoint, ServiceEndpointProjectReference,
};
use azdo_core::{AzdoError, AzdoResult, StateChangeConf};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

pub const DEFAULT_DESCRIPTION: &str = "Managed by Terraform";

/// A credential held in state. `Debug` never shows the value.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Sensitive(Secret<String>);

impl Sensitive {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Secret::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_blank(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl Default for Sensitive {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl PartialEq for Sensitive {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl fmt::Debug for Sensitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sensitive([REDACTED])")
    }
}

impl Serialize for Sensitive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

/// What a flavor contributes to the endpoint body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointDefinition {
    pub url: String,
    pub scheme: &'static str,
    pub parameters: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
}

impl EndpointDefinition {
    pub fn new(url: impl Into<String>, scheme: &'static str) -> Self {
        Self {
            url: url.into(),
            scheme,
            ..Default::default()
        }
    }

    pub fn parameter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

pub trait EndpointFlavor: Send + Sync + 'static {
    type Config: Serialize + DeserializeOwned + Validate + Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    const TYPE_NAME: &'static str;
    /// Service-side `type` of the endpoint.
    const ENDPOINT_TYPE: &'static str;

    fn build(config: &Self::Config) -> AzdoResult<EndpointDefinition>;

    /// Copy non-secret values the server reports back into the configuration.
    fn observe(_config: &mut Self::Config, _endpoint: &ServiceEndpoint) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpointModel<C> {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub project_id: Uuid,
    pub service_endpoint_name: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(flatten)]
    pub config: C,
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

impl<C: Validate> Validate for ServiceEndpointModel<C> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.config.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if self.service_endpoint_name.trim().is_empty() {
            let mut err = ValidationError::new("blank");
            err.message = Some("service_endpoint_name must not be empty".into());
            errors.add("service_endpoint_name", err);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl<C> ServiceEndpointModel<C> {
    fn require_id(&self) -> AzdoResult<Uuid> {
        self.id.ok_or_else(|| {
            AzdoError::Validation(format!(
                "service endpoint '{}' has no id in state",
                self.service_endpoint_name
            ))
        })
    }
}

pub struct ServiceEndpointResource<F>(PhantomData<F>);

impl<F> ServiceEndpointResource<F> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<F> Default for ServiceEndpointResource<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: EndpointFlavor> ServiceEndpointResource<F> {
    /// Request body: owned by the library, referencing the owning project.
    pub fn endpoint(model: &ServiceEndpointModel<F::Config>) -> AzdoResult<ServiceEndpoint> {
        let definition = F::build(&model.config)?;
        Ok(ServiceEndpoint {
            id: model.id,
            name: model.service_endpoint_name.clone(),
            description: model.description.clone(),
            endpoint_type: F::ENDPOINT_TYPE.to_string(),
            url: definition.url,
            data: definition.data,
            authorization: Some(EndpointAuthorization {
                scheme: definition.scheme.to_string(),
                parameters: definition.parameters,
            }),
            owner: Some(OWNER_LIBRARY.to_string()),
            service_endpoint_project_references: vec![ServiceEndpointProjectReference {
                project_reference: ProjectReference {
                    id: model.project_id,
                    name: None,
                },
                name: model.service_endpoint_name.clone(),
                description: model.description.clone(),
            }],
            ..Default::default()
        })
    }

    async fn grant(ctx: &ProviderContext, model: &ServiceEndpointModel<F::Config>, id: &Uuid) -> AzdoResult<()> {
        ctx.clients
            .pipelines
            .grant_all_pipelines(
                &model.project_id.to_string(),
                PipelineResourceType::Endpoint,
                &id.to_string(),
            )
            .await?;
        Ok(())
    }
}

/// Poll until the endpoint is `Ready`; `Failed` is an error.
pub async fn wait_until_ready(ctx: &ProviderContext, project_id: &Uuid, endpoint_id: &Uuid) -> AzdoResult<ServiceEndpoint> {
    let project = project_id.to_string();
    let operation = format!("service endpoint {endpoint_id} readiness");
    let conf = StateChangeConf::new(operation.clone(), ctx.poll.endpoint_readiness)
        .pending([STATE_IN_PROGRESS])
        .target([STATE_READY, STATE_FAILED]);

    let endpoint = conf
        .wait_for_state(&ctx.cancel, || async {
            let endpoint = ctx
                .clients
                .service_endpoints
                .get_service_endpoint(&project, endpoint_id)
                .await?;
            let state = endpoint.readiness_state().to_string();
            Ok((endpoint, state))
        })
        .await?;

    if endpoint.readiness_state() == STATE_FAILED {
        let message = endpoint.status_message().unwrap_or("no status message");
        return Err(AzdoError::UnexpectedState {
            operation: format!("{operation}: {message}"),
            state: STATE_FAILED.to_string(),
            expected: vec![STATE_READY.to_string()],
        });
    }
    Ok(endpoint)
}

#[async_trait]
impl<F: EndpointFlavor> Resource for ServiceEndpointResource<F> {
    type Model = ServiceEndpointModel<F::Config>;

    fn type_name(&self) -> &'static str {
        F::TYPE_NAME
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: Self::Model) -> AzdoResult<Self::Model> {
        let body = Self::endpoint(&planned)?;
        let created = ctx.clients.service_endpoints.create_service_endpoint(&body).await?;
        let id = created
            .id
            .ok_or_else(|| AzdoError::Internal(anyhow::anyhow!("service endpoint created without an id")))?;
        info!(endpoint_id = %id, endpoint_type = F::ENDPOINT_TYPE, "Created service endpoint");

        if let Err(e) = wait_until_ready(ctx, &planned.project_id, &id).await {
            warn!(endpoint_id = %id, error = %e, "Service endpoint not ready, deleting it");
            if let Err(cleanup) = ctx
                .clients
                .service_endpoints
                .delete_service_endpoint(&id, &[planned.project_id])
                .await
            {
                warn!(endpoint_id = %id, error = %cleanup, "Failed to delete unready service endpoint");
            }
            return Err(e);
        }

        Self::grant(ctx, &planned, &id).await?;
        Ok(ServiceEndpointModel {
            id: Some(id),
            ..planned
        })
    }

    async fn read(&self, ctx: &ProviderContext, state: Self::Model) -> AzdoResult<Option<Self::Model>> {
        let id = state.require_id()?;
        let endpoint = ctx
            .clients
            .service_endpoints
            .get_service_endpoint(&state.project_id.to_string(), &id)
            .await?;

        let mut config = state.config.clone();
        F::observe(&mut config, &endpoint);
        Ok(Some(ServiceEndpointModel {
            id: Some(id),
            project_id: state.project_id,
            service_endpoint_name: endpoint.name,
            description: endpoint.description,
            config,
        }))
    }

    async fn update(&self, ctx: &ProviderContext, prior: Self::Model, planned: Self::Model) -> AzdoResult<Self::Model> {
        let id = prior.require_id()?;
        let planned = ServiceEndpointModel {
            id: Some(id),
            ..planned
        };
        let body = Self::endpoint(&planned)?;
        ctx.clients
            .service_endpoints
            .update_service_endpoint(&id, &body)
            .await?;
        Self::grant(ctx, &planned, &id).await?;
        info!(endpoint_id = %id, "Updated service endpoint");
        Ok(planned)
    }

    async fn delete(&self, ctx: &ProviderContext, state: Self::Model) -> AzdoResult<()> {
        let id = state.require_id()?;
        ctx.clients
            .service_endpoints
            .delete_service_endpoint(&id, &[state.project_id])
            .await?;
        info!(endpoint_id = %id, "Deleted service endpoint");
        Ok(())
    }
}
