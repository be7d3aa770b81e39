//! `azuredevops_group`

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::clients::graph::{GraphGroup, GroupCreationContext, JsonPatchOperation};
use azdo_core::{AzdoError, AzdoResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// A group is either created in Azure DevOps (`display_name`) or linked from
/// Entra ID by `origin_id` or `mail`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_source"))]
pub struct GroupModel {
    /// Subject descriptor.
    #[serde(default)]
    pub id: Option<String>,
    /// Project to scope the group to; organization level when unset.
    #[serde(default)]
    pub scope: Option<Uuid>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub origin_id: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub principal_name: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
}

fn validate_source(model: &GroupModel) -> Result<(), ValidationError> {
    let sources = [&model.display_name, &model.origin_id, &model.mail]
        .iter()
        .filter(|s| s.as_deref().is_some_and(|v| !v.trim().is_empty()))
        .count();
    if sources != 1 {
        let mut err = ValidationError::new("group_source");
        err.message = Some("exactly one of display_name, origin_id or mail must be set".into());
        return Err(err);
    }
    Ok(())
}

impl GroupModel {
    fn creation_context(&self) -> GroupCreationContext {
        if let Some(origin_id) = &self.origin_id {
            GroupCreationContext::OriginId {
                origin_id: origin_id.clone(),
            }
        } else if let Some(mail) = &self.mail {
            GroupCreationContext::MailAddress {
                mail_address: mail.clone(),
            }
        } else {
            GroupCreationContext::Vsts {
                display_name: self.display_name.clone().unwrap_or_default(),
                description: self.description.clone(),
            }
        }
    }

    fn observed(&self, group: GraphGroup) -> Self {
        Self {
            id: Some(group.descriptor),
            scope: self.scope,
            display_name: Some(group.display_name),
            description: group.description.or_else(|| self.description.clone()),
            origin_id: self.origin_id.clone(),
            mail: self.mail.clone(),
            principal_name: group.principal_name,
            origin: group.origin,
        }
    }

    fn descriptor(&self) -> AzdoResult<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| AzdoError::Validation("group has no descriptor in state".into()))
    }
}

pub struct GroupResource;

#[async_trait]
impl Resource for GroupResource {
    type Model = GroupModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_group"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["scope", "origin_id", "mail"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: GroupModel) -> AzdoResult<GroupModel> {
        let scope = match planned.scope {
            Some(project_id) => Some(ctx.clients.graph.get_descriptor(&project_id).await?),
            None => None,
        };
        let group = ctx
            .clients
            .graph
            .create_group(&planned.creation_context(), scope.as_deref(), &[])
            .await?;
        info!(descriptor = %group.descriptor, "Created group");
        Ok(planned.observed(group))
    }

    async fn read(&self, ctx: &ProviderContext, state: GroupModel) -> AzdoResult<Option<GroupModel>> {
        let group = ctx.clients.graph.get_group(state.descriptor()?).await?;
        Ok(Some(state.observed(group)))
    }

    async fn update(&self, ctx: &ProviderContext, prior: GroupModel, planned: GroupModel) -> AzdoResult<GroupModel> {
        let mut operations = Vec::new();
        if planned.description != prior.description {
            operations.push(JsonPatchOperation::replace(
                "/description",
                planned.description.clone().unwrap_or_default(),
            ));
        }
        if planned.origin_id.is_none() && planned.mail.is_none() && planned.display_name != prior.display_name {
            operations.push(JsonPatchOperation::replace(
                "/displayName",
                planned.display_name.clone().unwrap_or_default(),
            ));
        }

        let descriptor = prior.descriptor()?;
        let group = if operations.is_empty() {
            ctx.clients.graph.get_group(descriptor).await?
        } else {
            ctx.clients.graph.update_group(descriptor, &operations).await?
        };
        Ok(planned.observed(group))
    }

    async fn delete(&self, ctx: &ProviderContext, state: GroupModel) -> AzdoResult<()> {
        ctx.clients.graph.delete_group(state.descriptor()?).await
    }
}
