//! Work item tracking area: area and iteration classification nodes.

use crate::error::AzdoResult;
use crate::rest::{ListResponse, NoContent, RestClient};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;
use uuid::Uuid;

const API_VERSION: &str = "7.0";

/// Which of the two classification trees of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TreeStructureGroup {
    Areas,
    Iterations,
}

impl TreeStructureGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeStructureGroup::Areas => "areas",
            TreeStructureGroup::Iterations => "iterations",
        }
    }

    /// Root folder name as it appears in API paths (`\<Project>\Area`).
    pub fn root_name(&self) -> &'static str {
        match self {
            TreeStructureGroup::Areas => "Area",
            TreeStructureGroup::Iterations => "Iteration",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemClassificationNode {
    pub id: i32,
    pub identifier: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_type: Option<String>,
    /// Backslash separated, rooted at `\<Project>\Area` or `\<Project>\Iteration`.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<WorkItemClassificationNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl WorkItemClassificationNode {
    /// Depth-first search by API path, case-insensitive.
    pub fn find_by_path(&self, path: &str) -> Option<&WorkItemClassificationNode> {
        if self.path.eq_ignore_ascii_case(path) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_path(path))
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

/// Body for create, rename and attribute updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationNodeArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize)]
struct MoveNodeArgs {
    id: i32,
}

#[derive(Debug, Clone)]
pub struct WorkItemTrackingClient {
    rest: RestClient,
}

impl WorkItemTrackingClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    fn segments(project: &str, group: TreeStructureGroup, path: &[String]) -> Vec<String> {
        let mut segments = vec![
            project.to_string(),
            "_apis".to_string(),
            "wit".to_string(),
            "classificationnodes".to_string(),
            group.as_str().to_string(),
        ];
        segments.extend(path.iter().filter(|s| !s.is_empty()).cloned());
        segments
    }

    /// Node at `path` (components below the root), with `depth` levels of children.
    #[instrument(skip(self))]
    pub async fn get_classification_node(
        &self,
        project: &str,
        group: TreeStructureGroup,
        path: &[String],
        depth: Option<u32>,
    ) -> AzdoResult<WorkItemClassificationNode> {
        self.rest
            .get(Self::segments(project, group, path))
            .query_opt("$depth", depth)
            .api_version(API_VERSION)
            .send()
            .await
    }

    /// Nodes by id, from either tree.
    #[instrument(skip(self))]
    pub async fn get_classification_nodes(
        &self,
        project: &str,
        ids: &[i32],
        depth: Option<u32>,
    ) -> AzdoResult<Vec<WorkItemClassificationNode>> {
        let ids = ids.iter().map(i32::to_string).collect::<Vec<_>>().join(",");
        Ok(self
            .rest
            .get([project, "_apis", "wit", "classificationnodes"])
            .query("ids", ids)
            .query_opt("$depth", depth)
            .query("errorPolicy", "omit")
            .api_version(API_VERSION)
            .send::<ListResponse<Option<WorkItemClassificationNode>>>()
            .await?
            .into_inner()
            .into_iter()
            .flatten()
            .collect())
    }

    /// Create `args.name` below `parent_path`.
    #[instrument(skip(self, args))]
    pub async fn create_classification_node(
        &self,
        project: &str,
        group: TreeStructureGroup,
        parent_path: &[String],
        args: &ClassificationNodeArgs,
    ) -> AzdoResult<WorkItemClassificationNode> {
        self.rest
            .post(Self::segments(project, group, parent_path))
            .api_version(API_VERSION)
            .json(args)?
            .send()
            .await
    }

    /// Reparent node `node_id` under `new_parent_path`.
    #[instrument(skip(self))]
    pub async fn move_classification_node(
        &self,
        project: &str,
        group: TreeStructureGroup,
        new_parent_path: &[String],
        node_id: i32,
    ) -> AzdoResult<WorkItemClassificationNode> {
        self.rest
            .post(Self::segments(project, group, new_parent_path))
            .api_version(API_VERSION)
            .json(&MoveNodeArgs { id: node_id })?
            .send()
            .await
    }

    #[instrument(skip(self, args))]
    pub async fn update_classification_node(
        &self,
        project: &str,
        group: TreeStructureGroup,
        path: &[String],
        args: &ClassificationNodeArgs,
    ) -> AzdoResult<WorkItemClassificationNode> {
        self.rest
            .patch(Self::segments(project, group, path))
            .api_version(API_VERSION)
            .json(args)?
            .send()
            .await
    }

    /// Delete a node; work items in it move to `reclassify_id` when given.
    #[instrument(skip(self))]
    pub async fn delete_classification_node(
        &self,
        project: &str,
        group: TreeStructureGroup,
        path: &[String],
        reclassify_id: Option<i32>,
    ) -> AzdoResult<()> {
        self.rest
            .delete(Self::segments(project, group, path))
            .query_opt("$reclassifyId", reclassify_id)
            .api_version(API_VERSION)
            .send::<NoContent>()
            .await?;
        Ok(())
    }
}
