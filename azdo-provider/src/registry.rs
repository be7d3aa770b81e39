//! Host-facing capability interface.
//!
//! Handlers implement [`Resource`] or [`DataSource`] over typed models. The
//! [`ProviderRegistry`] erases those types so a host can drive any kind by
//! name with JSON state, and [`Provider`] turns errors into [`Diagnostic`]s.

use crate::context::ProviderContext;
use crate::diagnostics::Diagnostic;
use async_trait::async_trait;
use azdo_core::{AzdoError, AzdoResult, ProviderConfig};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};
use validator::Validate;

/// One managed resource kind.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    type Model: Serialize + DeserializeOwned + Validate + Clone + Send + Sync + 'static;

    /// Host-visible name, e.g. `azuredevops_project`.
    fn type_name(&self) -> &'static str;

    /// Top-level attributes whose change forces replacement.
    fn replace_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Fill in attributes the server will compute so the plan shows them.
    fn modify_plan(&self, _prior: Option<&Self::Model>, _planned: &mut Self::Model) {}

    async fn create(&self, ctx: &ProviderContext, planned: Self::Model) -> AzdoResult<Self::Model>;

    /// `None` when the object no longer exists remotely.
    async fn read(&self, ctx: &ProviderContext, state: Self::Model) -> AzdoResult<Option<Self::Model>>;

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Self::Model,
        planned: Self::Model,
    ) -> AzdoResult<Self::Model>;

    async fn delete(&self, ctx: &ProviderContext, state: Self::Model) -> AzdoResult<()>;
}

/// One read-only lookup.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    type Args: DeserializeOwned + Validate + Send + Sync + 'static;
    type Output: Serialize + Send + 'static;

    fn type_name(&self) -> &'static str;

    async fn read(&self, ctx: &ProviderContext, args: Self::Args) -> AzdoResult<Self::Output>;
}

/// Outcome of planning a change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanResult {
    pub planned_state: Value,
    pub requires_replace: Vec<String>,
    pub has_changes: bool,
}

fn decode<T: DeserializeOwned + Validate>(value: Value) -> AzdoResult<T> {
    let model: T = serde_json::from_value(value)
        .map_err(|e| AzdoError::Validation(format!("invalid attributes: {e}")))?;
    model.validate()?;
    Ok(model)
}

fn encode<T: Serialize>(model: &T) -> AzdoResult<Value> {
    Ok(serde_json::to_value(model)?)
}

/// Configuration overlaid on prior state: attributes the configuration leaves
/// null keep their prior (computed) values.
fn overlay(prior: Option<&Value>, config: &Value) -> Value {
    match (prior, config) {
        (Some(Value::Object(prior)), Value::Object(config)) => {
            let mut merged: Map<String, Value> = config.clone();
            for (key, value) in prior {
                if merged.get(key).is_none_or(Value::is_null) {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Value::Object(merged)
        }
        _ => config.clone(),
    }
}

/// A missing attribute and an explicit null are the same value.
fn attribute<'a>(state: &'a Value, field: &str) -> Option<&'a Value> {
    state.get(field).filter(|v| !v.is_null())
}

#[async_trait]
trait ErasedResource: Send + Sync {
    fn plan(&self, prior: Option<&Value>, config: &Value) -> AzdoResult<PlanResult>;
    async fn create(&self, ctx: &ProviderContext, planned: Value) -> AzdoResult<Value>;
    async fn read(&self, ctx: &ProviderContext, state: Value) -> AzdoResult<Option<Value>>;
    async fn update(&self, ctx: &ProviderContext, prior: Value, planned: Value) -> AzdoResult<Value>;
    async fn delete(&self, ctx: &ProviderContext, state: Value) -> AzdoResult<()>;
}

struct ErasedR<R>(R);

#[async_trait]
impl<R: Resource> ErasedResource for ErasedR<R> {
    fn plan(&self, prior: Option<&Value>, config: &Value) -> AzdoResult<PlanResult> {
        let prior_model = prior.map(|p| decode::<R::Model>(p.clone())).transpose()?;
        let mut planned: R::Model = decode(overlay(prior, config))?;
        self.0.modify_plan(prior_model.as_ref(), &mut planned);
        let planned_state = encode(&planned)?;
        // Re-encode prior so omitted optional attributes read as null on both sides.
        let prior_state = prior_model.as_ref().map(encode).transpose()?;

        let requires_replace = match &prior_state {
            Some(prior) => self
                .0
                .replace_fields()
                .iter()
                .filter(|field| attribute(prior, field) != attribute(&planned_state, field))
                .map(|field| field.to_string())
                .collect(),
            None => Vec::new(),
        };
        let has_changes = prior_state.as_ref() != Some(&planned_state);

        Ok(PlanResult {
            planned_state,
            requires_replace,
            has_changes,
        })
    }

    async fn create(&self, ctx: &ProviderContext, planned: Value) -> AzdoResult<Value> {
        let model = decode(planned)?;
        let created = self
            .0
            .create(ctx, model)
            .await
            .map_err(|e| e.parent_context("project"))?;
        encode(&created)
    }

    async fn read(&self, ctx: &ProviderContext, state: Value) -> AzdoResult<Option<Value>> {
        let model: R::Model = serde_json::from_value(state)?;
        match self.0.read(ctx, model).await {
            Ok(Some(observed)) => Ok(Some(encode(&observed)?)),
            Ok(None) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update(&self, ctx: &ProviderContext, prior: Value, planned: Value) -> AzdoResult<Value> {
        let prior: R::Model = serde_json::from_value(prior)?;
        let planned = decode(planned)?;
        let updated = self
            .0
            .update(ctx, prior, planned)
            .await
            .map_err(|e| e.parent_context("project"))?;
        encode(&updated)
    }

    async fn delete(&self, ctx: &ProviderContext, state: Value) -> AzdoResult<()> {
        let model: R::Model = serde_json::from_value(state)?;
        match self.0.delete(ctx, model).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

#[async_trait]
trait ErasedDataSource: Send + Sync {
    async fn read(&self, ctx: &ProviderContext, args: Value) -> AzdoResult<Value>;
}

struct ErasedD<D>(D);

#[async_trait]
impl<D: DataSource> ErasedDataSource for ErasedD<D> {
    async fn read(&self, ctx: &ProviderContext, args: Value) -> AzdoResult<Value> {
        let args = decode(args)?;
        encode(&self.0.read(ctx, args).await?)
    }
}

/// Every resource and data source kind by name.
#[derive(Default)]
pub struct ProviderRegistry {
    resources: BTreeMap<&'static str, Box<dyn ErasedResource>>,
    data_sources: BTreeMap<&'static str, Box<dyn ErasedDataSource>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every kind this provider manages.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::resources::register(&mut registry);
        crate::datasources::register(&mut registry);
        registry
    }

    pub fn register_resource<R: Resource>(&mut self, resource: R) {
        let name = resource.type_name();
        if self.resources.insert(name, Box::new(ErasedR(resource))).is_some() {
            warn!(type_name = name, "Resource registered twice");
        }
    }

    pub fn register_data_source<D: DataSource>(&mut self, data_source: D) {
        let name = data_source.type_name();
        if self.data_sources.insert(name, Box::new(ErasedD(data_source))).is_some() {
            warn!(type_name = name, "Data source registered twice");
        }
    }

    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    pub fn data_source_types(&self) -> Vec<&'static str> {
        self.data_sources.keys().copied().collect()
    }

    fn resource(&self, type_name: &str) -> AzdoResult<&dyn ErasedResource> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| AzdoError::Misconfigured(format!("unknown resource type '{type_name}'")))
    }

    fn data_source(&self, type_name: &str) -> AzdoResult<&dyn ErasedDataSource> {
        self.data_sources
            .get(type_name)
            .map(|d| d.as_ref())
            .ok_or_else(|| AzdoError::Misconfigured(format!("unknown data source '{type_name}'")))
    }
}

/// Entry point a host drives: configure once, then lifecycle calls by type name.
pub struct Provider {
    registry: ProviderRegistry,
    context: Option<ProviderContext>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider {
    pub fn new() -> Self {
        Self {
            registry: ProviderRegistry::with_defaults(),
            context: None,
        }
    }

    pub fn with_registry(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            context: None,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Build the clients for the configured organization.
    pub fn configure(&mut self, config: ProviderConfig) -> Result<(), Diagnostic> {
        azdo_core::observability::init_logging();
        let context = ProviderContext::from_config(&config)?;
        info!(organization_url = %config.organization_url(), "Provider configured");
        self.context = Some(context);
        Ok(())
    }

    /// Use a prepared context (tests, embedding hosts).
    pub fn configure_with(&mut self, context: ProviderContext) {
        self.context = Some(context);
    }

    fn context(&self) -> Result<ProviderContext, Diagnostic> {
        self.context
            .as_ref()
            .map(ProviderContext::child)
            .ok_or_else(|| Diagnostic::error("Provider not configured", "configure must be called before any lifecycle operation"))
    }

    /// Cancel every in-flight operation.
    pub fn stop(&self) {
        if let Some(ctx) = &self.context {
            ctx.cancel.cancel();
        }
    }

    pub fn plan(&self, type_name: &str, prior: Option<&Value>, config: &Value) -> Result<PlanResult, Diagnostic> {
        Ok(self.registry.resource(type_name)?.plan(prior, config)?)
    }

    #[instrument(skip(self, planned))]
    pub async fn create(&self, type_name: &str, planned: Value) -> Result<Value, Diagnostic> {
        let ctx = self.context()?;
        Ok(self.registry.resource(type_name)?.create(&ctx, planned).await?)
    }

    /// `None` tells the host to drop the resource from state.
    #[instrument(skip(self, state))]
    pub async fn read(&self, type_name: &str, state: Value) -> Result<Option<Value>, Diagnostic> {
        let ctx = self.context()?;
        let observed = self.registry.resource(type_name)?.read(&ctx, state).await?;
        if observed.is_none() {
            info!(type_name, "Resource no longer exists");
        }
        Ok(observed)
    }

    #[instrument(skip(self, prior, planned))]
    pub async fn update(&self, type_name: &str, prior: Value, planned: Value) -> Result<Value, Diagnostic> {
        let ctx = self.context()?;
        Ok(self.registry.resource(type_name)?.update(&ctx, prior, planned).await?)
    }

    #[instrument(skip(self, state))]
    pub async fn delete(&self, type_name: &str, state: Value) -> Result<(), Diagnostic> {
        let ctx = self.context()?;
        Ok(self.registry.resource(type_name)?.delete(&ctx, state).await?)
    }

    #[instrument(skip(self, args))]
    pub async fn read_data_source(&self, type_name: &str, args: Value) -> Result<Value, Diagnostic> {
        let ctx = self.context()?;
        Ok(self.registry.data_source(type_name)?.read(&ctx, args).await?)
    }
}
