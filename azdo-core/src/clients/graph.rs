//! Graph area (identity host): descriptors, groups, users and memberships.

use crate::error::AzdoResult;
use crate::rest::{ListResponse, NoContent, Page, RestClient};
use crate::utils::set_diff;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

const API_VERSION: &str = "7.0-preview.1";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphGroup {
    #[serde(default)]
    pub descriptor: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphUser {
    #[serde(default)]
    pub descriptor: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMembership {
    pub container_descriptor: String,
    pub member_descriptor: String,
}

#[derive(Debug, Deserialize)]
struct DescriptorResult {
    value: String,
}

#[derive(Debug, Deserialize)]
struct StorageKeyResult {
    value: Uuid,
}

/// How a new group is sourced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupCreationContext {
    #[serde(rename_all = "camelCase")]
    Vsts {
        display_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    OriginId { origin_id: String },
    #[serde(rename_all = "camelCase")]
    MailAddress { mail_address: String },
}

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonPatchOperation {
    pub op: &'static str,
    pub path: String,
    pub value: serde_json::Value,
}

impl JsonPatchOperation {
    pub fn replace(path: &str, value: impl Into<serde_json::Value>) -> Self {
        Self {
            op: "replace",
            path: path.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphClient {
    rest: RestClient,
}

impl GraphClient {
    /// `rest` must point at the identity (vssps) host.
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Graph descriptor for a storage key (project id, team id, ...).
    #[instrument(skip(self))]
    pub async fn get_descriptor(&self, storage_key: &Uuid) -> AzdoResult<String> {
        let result: DescriptorResult = self
            .rest
            .get(["_apis".to_string(), "graph".to_string(), "descriptors".to_string(), storage_key.to_string()])
            .api_version(API_VERSION)
            .send()
            .await?;
        Ok(result.value)
    }

    #[instrument(skip(self))]
    pub async fn get_storage_key(&self, subject_descriptor: &str) -> AzdoResult<Uuid> {
        let result: StorageKeyResult = self
            .rest
            .get(["_apis", "graph", "storagekeys", subject_descriptor])
            .api_version(API_VERSION)
            .send()
            .await?;
        Ok(result.value)
    }

    // --- groups ---

    #[instrument(skip(self))]
    pub async fn get_group(&self, descriptor: &str) -> AzdoResult<GraphGroup> {
        self.rest
            .get(["_apis", "graph", "groups", descriptor])
            .api_version(API_VERSION)
            .send()
            .await
    }

    /// One page of groups, optionally limited to a scope (project) descriptor.
    #[instrument(skip(self))]
    pub async fn get_groups(
        &self,
        scope_descriptor: Option<&str>,
        continuation_token: Option<&str>,
    ) -> AzdoResult<Page<GraphGroup>> {
        let response = self
            .rest
            .get(["_apis", "graph", "groups"])
            .query_opt("scopeDescriptor", scope_descriptor)
            .query_opt("continuationToken", continuation_token)
            .api_version(API_VERSION)
            .send_with_headers::<ListResponse<GraphGroup>>()
            .await?;
        Ok(Page {
            items: response.body.value,
            continuation_token: response.continuation_token,
        })
    }

    /// Every group in scope, following continuation tokens.
    pub async fn get_all_groups(&self, scope_descriptor: Option<&str>) -> AzdoResult<Vec<GraphGroup>> {
        let mut groups = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.get_groups(scope_descriptor, token.as_deref()).await?;
            debug!(count = page.items.len(), "Fetched group page");
            groups.extend(page.items);
            match page.continuation_token {
                Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
                _ => return Ok(groups),
            }
        }
    }

    #[instrument(skip(self, context))]
    pub async fn create_group(
        &self,
        context: &GroupCreationContext,
        scope_descriptor: Option<&str>,
        group_descriptors: &[String],
    ) -> AzdoResult<GraphGroup> {
        let groups = (!group_descriptors.is_empty()).then(|| group_descriptors.join(","));
        self.rest
            .post(["_apis", "graph", "groups"])
            .query_opt("scopeDescriptor", scope_descriptor)
            .query_opt("groupDescriptors", groups)
            .api_version(API_VERSION)
            .json(context)?
            .send()
            .await
    }

    #[instrument(skip(self, operations))]
    pub async fn update_group(
        &self,
        descriptor: &str,
        operations: &[JsonPatchOperation],
    ) -> AzdoResult<GraphGroup> {
        self.rest
            .patch(["_apis", "graph", "groups", descriptor])
            .api_version(API_VERSION)
            .json(operations)?
            .json_patch()
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_group(&self, descriptor: &str) -> AzdoResult<()> {
        self.rest
            .delete(["_apis", "graph", "groups", descriptor])
            .api_version(API_VERSION)
            .send::<NoContent>()
            .await?;
        Ok(())
    }

    // --- users ---

    #[instrument(skip(self))]
    pub async fn get_user(&self, descriptor: &str) -> AzdoResult<GraphUser> {
        self.rest
            .get(["_apis", "graph", "users", descriptor])
            .api_version(API_VERSION)
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_users(
        &self,
        subject_types: &[String],
        continuation_token: Option<&str>,
    ) -> AzdoResult<Page<GraphUser>> {
        let subject_types = (!subject_types.is_empty()).then(|| subject_types.join(","));
        let response = self
            .rest
            .get(["_apis", "graph", "users"])
            .query_opt("subjectTypes", subject_types)
            .query_opt("continuationToken", continuation_token)
            .api_version(API_VERSION)
            .send_with_headers::<ListResponse<GraphUser>>()
            .await?;
        Ok(Page {
            items: response.body.value,
            continuation_token: response.continuation_token,
        })
    }

    pub async fn get_all_users(&self, subject_types: &[String]) -> AzdoResult<Vec<GraphUser>> {
        let mut users = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.get_users(subject_types, token.as_deref()).await?;
            users.extend(page.items);
            match page.continuation_token {
                Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
                _ => return Ok(users),
            }
        }
    }

    // --- memberships ---

    /// Direct members of a container (group or team).
    #[instrument(skip(self))]
    pub async fn get_group_memberships(&self, container_descriptor: &str) -> AzdoResult<Vec<GraphMembership>> {
        Ok(self
            .rest
            .get(["_apis", "graph", "Memberships", container_descriptor])
            .query("direction", "down")
            .api_version(API_VERSION)
            .send::<ListResponse<GraphMembership>>()
            .await?
            .into_inner())
    }

    /// Member descriptors of a container.
    pub async fn get_member_descriptors(&self, container_descriptor: &str) -> AzdoResult<Vec<String>> {
        Ok(self
            .get_group_memberships(container_descriptor)
            .await?
            .into_iter()
            .map(|m| m.member_descriptor)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn add_membership(&self, member: &str, container: &str) -> AzdoResult<GraphMembership> {
        self.rest
            .put(["_apis", "graph", "memberships", member, container])
            .api_version(API_VERSION)
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn remove_membership(&self, member: &str, container: &str) -> AzdoResult<()> {
        self.rest
            .delete(["_apis", "graph", "memberships", member, container])
            .api_version(API_VERSION)
            .send::<NoContent>()
            .await?;
        Ok(())
    }

    /// Add every member to the container.
    pub async fn create_group_memberships(&self, container: &str, members: &[String]) -> AzdoResult<()> {
        for member in members {
            self.add_membership(member, container).await?;
        }
        Ok(())
    }

    /// Remove every listed member; already-removed members are ignored.
    pub async fn delete_group_memberships(&self, container: &str, members: &[String]) -> AzdoResult<()> {
        use crate::error::NotFoundExt;
        for member in members {
            self.remove_membership(member, container).await.ignore_not_found()?;
        }
        Ok(())
    }

    /// Make the container's direct members exactly `desired`.
    pub async fn update_group_memberships(&self, container: &str, desired: &[String]) -> AzdoResult<()> {
        let current = self.get_member_descriptors(container).await?;
        let diff = set_diff(&current, desired);
        debug!(added = diff.added.len(), removed = diff.removed.len(), "Reconciling memberships");
        self.create_group_memberships(container, &diff.added).await?;
        self.delete_group_memberships(container, &diff.removed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_creation_context_shapes() {
        let vsts = GroupCreationContext::Vsts {
            display_name: "Readers".into(),
            description: None,
        };
        assert_eq!(serde_json::to_value(&vsts).unwrap(), serde_json::json!({"displayName": "Readers"}));

        let aad = GroupCreationContext::OriginId { origin_id: "abc".into() };
        assert_eq!(serde_json::to_value(&aad).unwrap(), serde_json::json!({"originId": "abc"}));
    }

    #[test]
    fn test_json_patch_replace() {
        let op = JsonPatchOperation::replace("/description", "new");
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            serde_json::json!({"op": "replace", "path": "/description", "value": "new"})
        );
    }
}
