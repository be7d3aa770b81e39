//! `azuredevops_group`, `azuredevops_groups` and `azuredevops_users`.

use crate::context::ProviderContext;
use crate::registry::{DataSource, ProviderRegistry};
use crate::security::identity::matching_groups;
use async_trait::async_trait;
use azdo_core::clients::graph::{GraphGroup, GraphUser};
use azdo_core::utils::validate_non_blank;
use azdo_core::{AzdoError, AzdoResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub fn register(registry: &mut ProviderRegistry) {
    registry.register_data_source(GroupDataSource);
    registry.register_data_source(GroupsDataSource);
    registry.register_data_source(UsersDataSource);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupData {
    pub descriptor: String,
    pub name: String,
    pub principal_name: Option<String>,
    pub description: Option<String>,
    pub origin: Option<String>,
    pub origin_id: Option<String>,
    pub mail_address: Option<String>,
}

impl From<GraphGroup> for GroupData {
    fn from(g: GraphGroup) -> Self {
        Self {
            descriptor: g.descriptor,
            name: g.display_name,
            principal_name: g.principal_name,
            description: g.description,
            origin: g.origin,
            origin_id: g.origin_id,
            mail_address: g.mail_address,
        }
    }
}

/// Groups in the project's scope, or organization-wide.
async fn scoped_groups(ctx: &ProviderContext, project_id: Option<&Uuid>) -> AzdoResult<Vec<GraphGroup>> {
    let scope = match project_id {
        Some(id) => Some(ctx.clients.graph.get_descriptor(id).await?),
        None => None,
    };
    ctx.clients.graph.get_all_groups(scope.as_deref()).await
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GroupLookup {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[validate(custom(function = "validate_non_blank"))]
    pub name: String,
}

pub struct GroupDataSource;

#[async_trait]
impl DataSource for GroupDataSource {
    type Args = GroupLookup;
    type Output = GroupData;

    fn type_name(&self) -> &'static str {
        "azuredevops_group"
    }

    async fn read(&self, ctx: &ProviderContext, args: GroupLookup) -> AzdoResult<GroupData> {
        let groups = scoped_groups(ctx, args.project_id.as_ref()).await?;
        let mut matches = matching_groups(groups, &args.name);
        match matches.len() {
            1 => Ok(matches.remove(0).into()),
            0 => Err(AzdoError::Misconfigured(format!("group '{}' not found", args.name))),
            n => Err(AzdoError::Misconfigured(format!(
                "group name '{}' is ambiguous ({n} matches)",
                args.name
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GroupsQuery {
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupsData {
    pub groups: Vec<GroupData>,
}

pub struct GroupsDataSource;

#[async_trait]
impl DataSource for GroupsDataSource {
    type Args = GroupsQuery;
    type Output = GroupsData;

    fn type_name(&self) -> &'static str {
        "azuredevops_groups"
    }

    async fn read(&self, ctx: &ProviderContext, args: GroupsQuery) -> AzdoResult<GroupsData> {
        let groups = scoped_groups(ctx, args.project_id.as_ref()).await?;
        Ok(GroupsData {
            groups: groups.into_iter().map(GroupData::from).collect(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UsersQuery {
    #[serde(default)]
    pub principal_name: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub origin_id: Option<String>,
    /// Graph subject types, e.g. `aad`, `msa`.
    #[serde(default)]
    pub subject_types: Vec<String>,
}

impl UsersQuery {
    fn matches(&self, user: &GraphUser) -> bool {
        let eq = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            Some(w) => actual.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(w)),
            None => true,
        };
        eq(&self.principal_name, &user.principal_name)
            && eq(&self.origin, &user.origin)
            && eq(&self.origin_id, &user.origin_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserData {
    pub descriptor: String,
    pub display_name: String,
    pub principal_name: Option<String>,
    pub mail_address: Option<String>,
    pub origin: Option<String>,
    pub origin_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsersData {
    pub users: Vec<UserData>,
}

pub struct UsersDataSource;

#[async_trait]
impl DataSource for UsersDataSource {
    type Args = UsersQuery;
    type Output = UsersData;

    fn type_name(&self) -> &'static str {
        "azuredevops_users"
    }

    async fn read(&self, ctx: &ProviderContext, args: UsersQuery) -> AzdoResult<UsersData> {
        let users = ctx
            .clients
            .graph
            .get_all_users(&args.subject_types)
            .await?
            .into_iter()
            .filter(|u| args.matches(u))
            .map(|u| UserData {
                descriptor: u.descriptor,
                display_name: u.display_name,
                principal_name: u.principal_name,
                mail_address: u.mail_address,
                origin: u.origin,
                origin_id: u.origin_id,
            })
            .collect();
        Ok(UsersData { users })
    }
}
