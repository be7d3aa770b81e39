//! The seven `azuredevops_*_permissions` resources.
//!
//! They share one model and lifecycle; a [`PermissionScope`] supplies the
//! namespace, write discipline and token for each secured object kind.

use crate::context::ProviderContext;
use crate::registry::Resource;
use crate::security::tokens;
use crate::security::{AclWriteMode, PermissionEngine, PermissionSet, PermissionState, Principal, SecurityNamespaceId, SubjectKind, resolve_descriptor};
use async_trait::async_trait;
use azdo_core::clients::workitems::TreeStructureGroup;
use azdo_core::utils::validate_non_blank;
use azdo_core::{AzdoError, AzdoResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

/// What distinguishes one permissions resource from another.
#[async_trait]
pub trait PermissionScope: Send + Sync + 'static {
    type Args: Serialize + DeserializeOwned + Validate + Clone + PartialEq + Debug + Send + Sync + 'static;

    const TYPE_NAME: &'static str;
    const NAMESPACE: SecurityNamespaceId;
    const WRITE_MODE: AclWriteMode;
    const REPLACE_FIELDS: &'static [&'static str];

    async fn token(ctx: &ProviderContext, project_id: &Uuid, args: &Self::Args) -> AzdoResult<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionsModel<A> {
    /// The ACL token.
    #[serde(default)]
    pub id: Option<String>,
    pub project_id: Uuid,
    #[serde(flatten)]
    pub scope: A,
    /// Identity or graph subject descriptor; alternative to name and type.
    #[serde(default)]
    pub principal: Option<String>,
    #[serde(default)]
    pub identity_name: Option<String>,
    #[serde(default)]
    pub identity_type: Option<SubjectKind>,
    pub permissions: BTreeMap<String, PermissionState>,
    /// Reset actions not listed in `permissions`.
    #[serde(default = "default_replace")]
    pub replace: bool,
    #[serde(default)]
    pub identity_descriptor: Option<String>,
}

fn default_replace() -> bool {
    true
}

impl<A: Validate> Validate for PermissionsModel<A> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.scope.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        let named = self.identity_name.as_deref().is_some_and(|n| !n.trim().is_empty());
        if self.principal.is_some() == named {
            let mut err = ValidationError::new("principal");
            err.message = Some("set either principal or identity_name".into());
            errors.add("principal", err);
        }
        if self.permissions.is_empty() {
            let mut err = ValidationError::new("length");
            err.message = Some("at least one permission is required".into());
            errors.add("permissions", err);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl<A> PermissionsModel<A> {
    fn principal(&self) -> Principal {
        match &self.principal {
            Some(descriptor) => Principal::from_descriptor(descriptor),
            None => Principal::Named {
                name: self.identity_name.clone().unwrap_or_default(),
                kind: self.identity_type.unwrap_or_default(),
            },
        }
    }

    /// Configured actions with the observed state, notset when the identity has no entry.
    fn observed_permissions(&self, actual: Option<&PermissionSet>) -> BTreeMap<String, PermissionState> {
        self.permissions
            .keys()
            .map(|action| {
                let state = actual
                    .and_then(|set| {
                        set.permissions
                            .iter()
                            .find(|(name, _)| name.eq_ignore_ascii_case(action))
                            .map(|(_, state)| *state)
                    })
                    .unwrap_or(PermissionState::NotSet);
                (action.clone(), state)
            })
            .collect()
    }
}

pub struct PermissionsResource<S>(PhantomData<S>);

impl<S> PermissionsResource<S> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<S> Default for PermissionsResource<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PermissionScope> PermissionsResource<S> {
    fn engine(ctx: &ProviderContext) -> PermissionEngine {
        PermissionEngine::new(ctx, S::NAMESPACE, S::WRITE_MODE)
    }

    async fn token(ctx: &ProviderContext, model: &PermissionsModel<S::Args>) -> AzdoResult<String> {
        match &model.id {
            Some(token) => Ok(token.clone()),
            None => S::token(ctx, &model.project_id, &model.scope).await,
        }
    }

    async fn apply(ctx: &ProviderContext, mut model: PermissionsModel<S::Args>) -> AzdoResult<PermissionsModel<S::Args>> {
        let token = S::token(ctx, &model.project_id, &model.scope).await?;
        let project = model.project_id.to_string();
        let descriptor = resolve_descriptor(&ctx.clients, &project, &model.principal()).await?;

        let set = PermissionSet {
            identity_descriptor: descriptor.clone(),
            identity_name: model.identity_name.clone().unwrap_or_default(),
            identity_type: SubjectKind::of_descriptor(&descriptor),
            permissions: model.permissions.clone(),
        };
        Self::engine(ctx)
            .create_or_update(&project, &token, &[set], model.replace)
            .await?;

        info!(type_name = S::TYPE_NAME, token = %token, "Set permissions");
        model.id = Some(token);
        model.identity_descriptor = Some(descriptor);
        Ok(model)
    }
}

#[async_trait]
impl<S: PermissionScope> Resource for PermissionsResource<S> {
    type Model = PermissionsModel<S::Args>;

    fn type_name(&self) -> &'static str {
        S::TYPE_NAME
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        S::REPLACE_FIELDS
    }

    async fn create(&self, ctx: &ProviderContext, planned: Self::Model) -> AzdoResult<Self::Model> {
        Self::apply(ctx, planned).await
    }

    async fn read(&self, ctx: &ProviderContext, state: Self::Model) -> AzdoResult<Option<Self::Model>> {
        let token = Self::token(ctx, &state).await?;
        let Some(sets) = Self::engine(ctx).read(&token).await? else {
            return Ok(None);
        };
        let descriptor = state.identity_descriptor.clone().unwrap_or_default();
        let actual = sets
            .iter()
            .find(|s| s.identity_descriptor.eq_ignore_ascii_case(&descriptor));
        let permissions = state.observed_permissions(actual);
        Ok(Some(PermissionsModel {
            id: Some(token),
            permissions,
            ..state
        }))
    }

    async fn update(&self, ctx: &ProviderContext, _prior: Self::Model, planned: Self::Model) -> AzdoResult<Self::Model> {
        Self::apply(ctx, PermissionsModel { id: None, ..planned }).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: Self::Model) -> AzdoResult<()> {
        let token = Self::token(ctx, &state).await?;
        let descriptor = match &state.identity_descriptor {
            Some(d) => d.clone(),
            None => resolve_descriptor(&ctx.clients, &state.project_id.to_string(), &state.principal()).await?,
        };
        Self::engine(ctx).remove(&token, &[descriptor]).await
    }
}

// ===========================================================================
// Scopes
// ===========================================================================

const COMMON_REPLACE: [&str; 4] = ["project_id", "principal", "identity_name", "identity_type"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProjectArgs {}

pub struct ProjectScope;

#[async_trait]
impl PermissionScope for ProjectScope {
    type Args = ProjectArgs;
    const TYPE_NAME: &'static str = "azuredevops_project_permissions";
    const NAMESPACE: SecurityNamespaceId = SecurityNamespaceId::Project;
    const WRITE_MODE: AclWriteMode = AclWriteMode::List;
    const REPLACE_FIELDS: &'static [&'static str] = &COMMON_REPLACE;

    async fn token(_ctx: &ProviderContext, project_id: &Uuid, _args: &ProjectArgs) -> AzdoResult<String> {
        Ok(tokens::project_token(&project_id.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct GitArgs {
    #[serde(default)]
    pub repository_id: Option<Uuid>,
    #[serde(default)]
    pub branch_name: Option<String>,
}

pub struct GitScope;

#[async_trait]
impl PermissionScope for GitScope {
    type Args = GitArgs;
    const TYPE_NAME: &'static str = "azuredevops_git_permissions";
    const NAMESPACE: SecurityNamespaceId = SecurityNamespaceId::GitRepositories;
    const WRITE_MODE: AclWriteMode = AclWriteMode::List;
    const REPLACE_FIELDS: &'static [&'static str] = &[
        "project_id",
        "principal",
        "identity_name",
        "identity_type",
        "repository_id",
        "branch_name",
    ];

    async fn token(_ctx: &ProviderContext, project_id: &Uuid, args: &GitArgs) -> AzdoResult<String> {
        let repository = args.repository_id.map(|r| r.to_string());
        tokens::git_token(&project_id.to_string(), repository.as_deref(), args.branch_name.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct BuildDefinitionArgs {
    #[validate(custom(function = "validate_non_blank"))]
    pub build_definition_id: String,
    /// Folder of the definition, `\` or `/` separated.
    #[serde(default)]
    pub path: Option<String>,
}

pub struct BuildDefinitionScope;

#[async_trait]
impl PermissionScope for BuildDefinitionScope {
    type Args = BuildDefinitionArgs;
    const TYPE_NAME: &'static str = "azuredevops_build_definition_permissions";
    const NAMESPACE: SecurityNamespaceId = SecurityNamespaceId::Build;
    const WRITE_MODE: AclWriteMode = AclWriteMode::List;
    const REPLACE_FIELDS: &'static [&'static str] = &[
        "project_id",
        "principal",
        "identity_name",
        "identity_type",
        "build_definition_id",
        "path",
    ];

    async fn token(_ctx: &ProviderContext, project_id: &Uuid, args: &BuildDefinitionArgs) -> AzdoResult<String> {
        Ok(tokens::build_token(
            &project_id.to_string(),
            args.path.as_deref(),
            Some(&args.build_definition_id),
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct EnvironmentArgs {
    pub environment_id: i32,
}

pub struct EnvironmentScope;

#[async_trait]
impl PermissionScope for EnvironmentScope {
    type Args = EnvironmentArgs;
    const TYPE_NAME: &'static str = "azuredevops_environment_permissions";
    const NAMESPACE: SecurityNamespaceId = SecurityNamespaceId::Environment;
    const WRITE_MODE: AclWriteMode = AclWriteMode::Entries { merge: false };
    const REPLACE_FIELDS: &'static [&'static str] = &[
        "project_id",
        "principal",
        "identity_name",
        "identity_type",
        "environment_id",
    ];

    async fn token(_ctx: &ProviderContext, project_id: &Uuid, args: &EnvironmentArgs) -> AzdoResult<String> {
        Ok(tokens::environment_token(
            &project_id.to_string(),
            &args.environment_id.to_string(),
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ServiceEndpointArgs {
    /// Every endpoint in the project when unset.
    #[serde(default)]
    pub serviceendpoint_id: Option<Uuid>,
}

pub struct ServiceEndpointScope;

#[async_trait]
impl PermissionScope for ServiceEndpointScope {
    type Args = ServiceEndpointArgs;
    const TYPE_NAME: &'static str = "azuredevops_serviceendpoint_permissions";
    const NAMESPACE: SecurityNamespaceId = SecurityNamespaceId::ServiceEndpoints;
    const WRITE_MODE: AclWriteMode = AclWriteMode::Entries { merge: false };
    const REPLACE_FIELDS: &'static [&'static str] = &[
        "project_id",
        "principal",
        "identity_name",
        "identity_type",
        "serviceendpoint_id",
    ];

    async fn token(_ctx: &ProviderContext, project_id: &Uuid, args: &ServiceEndpointArgs) -> AzdoResult<String> {
        let endpoint = args.serviceendpoint_id.map(|e| e.to_string());
        Ok(tokens::service_endpoint_token(&project_id.to_string(), endpoint.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ClassificationArgs {
    /// `/`-separated path below the root; the root itself when empty.
    #[serde(default)]
    pub path: String,
}

/// One `$depth` fetch of the root, walked locally.
async fn classification_token(
    ctx: &ProviderContext,
    project_id: &Uuid,
    group: TreeStructureGroup,
    path: &str,
) -> AzdoResult<String> {
    let depth = tokens::classification_depth(path);
    let root = ctx
        .clients
        .work_items
        .get_classification_node(&project_id.to_string(), group, &[], (depth > 0).then_some(depth))
        .await
        .map_err(|e| match e {
            AzdoError::NotFound(_) => AzdoError::ParentMissing(format!("project {project_id}")),
            other => other,
        })?;
    tokens::classification_token(&root, path)
}

pub struct AreaScope;

#[async_trait]
impl PermissionScope for AreaScope {
    type Args = ClassificationArgs;
    const TYPE_NAME: &'static str = "azuredevops_area_permissions";
    const NAMESPACE: SecurityNamespaceId = SecurityNamespaceId::Css;
    const WRITE_MODE: AclWriteMode = AclWriteMode::List;
    const REPLACE_FIELDS: &'static [&'static str] =
        &["project_id", "principal", "identity_name", "identity_type", "path"];

    async fn token(ctx: &ProviderContext, project_id: &Uuid, args: &ClassificationArgs) -> AzdoResult<String> {
        classification_token(ctx, project_id, TreeStructureGroup::Areas, &args.path).await
    }
}

pub struct IterationScope;

#[async_trait]
impl PermissionScope for IterationScope {
    type Args = ClassificationArgs;
    const TYPE_NAME: &'static str = "azuredevops_iteration_permissions";
    const NAMESPACE: SecurityNamespaceId = SecurityNamespaceId::Iteration;
    const WRITE_MODE: AclWriteMode = AclWriteMode::List;
    const REPLACE_FIELDS: &'static [&'static str] =
        &["project_id", "principal", "identity_name", "identity_type", "path"];

    async fn token(ctx: &ProviderContext, project_id: &Uuid, args: &ClassificationArgs) -> AzdoResult<String> {
        classification_token(ctx, project_id, TreeStructureGroup::Iterations, &args.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_model(json: serde_json::Value) -> PermissionsModel<GitArgs> {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_model_flattens_scope_arguments() {
        let m = git_model(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "repository_id": "5f6a1c2d-0000-4000-8000-000000000002",
            "branch_name": "main",
            "identity_name": "Contributors",
            "permissions": {"GenericContribute": "allow"}
        }));
        assert_eq!(m.scope.branch_name.as_deref(), Some("main"));
        assert!(m.replace);
        assert!(m.validate().is_ok());
        assert_eq!(
            m.principal(),
            Principal::Named {
                name: "Contributors".into(),
                kind: SubjectKind::Group
            }
        );

        let back = serde_json::to_value(&m).unwrap();
        assert_eq!(back["branch_name"], "main");
    }

    #[test]
    fn test_principal_xor_name() {
        let both = git_model(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "principal": "vssgp.abc",
            "identity_name": "Contributors",
            "permissions": {"GenericRead": "allow"}
        }));
        assert!(both.validate().is_err());

        let neither = git_model(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "permissions": {"GenericRead": "allow"}
        }));
        assert!(neither.validate().is_err());
    }

    #[test]
    fn test_empty_permissions_rejected() {
        let m = git_model(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "principal": "vssgp.abc",
            "permissions": {}
        }));
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_observed_permissions_default_to_notset() {
        let m = git_model(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "principal": "vssgp.abc",
            "permissions": {"GenericRead": "allow", "ForcePush": "deny"}
        }));
        let actual = PermissionSet {
            identity_descriptor: "d".into(),
            permissions: BTreeMap::from([
                ("GENERICREAD".to_string(), PermissionState::Allow),
                ("ManagePermissions".to_string(), PermissionState::Deny),
            ]),
            ..Default::default()
        };
        let observed = m.observed_permissions(Some(&actual));
        assert_eq!(observed["GenericRead"], PermissionState::Allow);
        assert_eq!(observed["ForcePush"], PermissionState::NotSet);
        assert_eq!(observed.len(), 2);

        let none = m.observed_permissions(None);
        assert!(none.values().all(|s| *s == PermissionState::NotSet));
    }

    #[tokio::test]
    async fn test_static_tokens() {
        let ctx = crate::testing::offline_context();
        let project = Uuid::parse_str("9a3b1e5c-0000-4000-8000-000000000001").unwrap();
        assert_eq!(
            ProjectScope::token(&ctx, &project, &ProjectArgs {}).await.unwrap(),
            "$PROJECT:vstfs:///Classification/TeamProject/9a3b1e5c-0000-4000-8000-000000000001"
        );
        assert_eq!(
            EnvironmentScope::token(&ctx, &project, &EnvironmentArgs { environment_id: 4 })
                .await
                .unwrap(),
            "Environments/9a3b1e5c-0000-4000-8000-000000000001/4"
        );
    }
}
