//! `azuredevops_area` and `azuredevops_iteration`.

use crate::context::ProviderContext;
use crate::registry::{DataSource, ProviderRegistry};
use crate::resources::classification::{FINISH_DATE, START_DATE, segments, strip_root, to_user_path};
use async_trait::async_trait;
use azdo_core::clients::workitems::{TreeStructureGroup, WorkItemClassificationNode};
use azdo_core::AzdoResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub fn register(registry: &mut ProviderRegistry) {
    registry.register_data_source(ClassificationDataSource::areas());
    registry.register_data_source(ClassificationDataSource::iterations());
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NodeLookup {
    pub project_id: Uuid,
    /// `/`-separated; the root when empty.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub fetch_children: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeData {
    pub id: i32,
    pub identifier: Uuid,
    pub name: String,
    pub path: String,
    pub has_children: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeData>,
}

impl NodeData {
    fn from_node(node: &WorkItemClassificationNode, with_children: bool) -> Self {
        Self {
            id: node.id,
            identifier: node.identifier,
            name: node.name.clone(),
            path: to_user_path(&strip_root(&node.path)),
            has_children: node.has_children,
            start_date: node.attribute_str(START_DATE).map(str::to_string),
            finish_date: node.attribute_str(FINISH_DATE).map(str::to_string),
            children: if with_children {
                node.children.iter().map(|c| Self::from_node(c, false)).collect()
            } else {
                Vec::new()
            },
        }
    }
}

pub struct ClassificationDataSource {
    group: TreeStructureGroup,
}

impl ClassificationDataSource {
    pub fn areas() -> Self {
        Self {
            group: TreeStructureGroup::Areas,
        }
    }

    pub fn iterations() -> Self {
        Self {
            group: TreeStructureGroup::Iterations,
        }
    }
}

#[async_trait]
impl DataSource for ClassificationDataSource {
    type Args = NodeLookup;
    type Output = NodeData;

    fn type_name(&self) -> &'static str {
        match self.group {
            TreeStructureGroup::Areas => "azuredevops_area",
            TreeStructureGroup::Iterations => "azuredevops_iteration",
        }
    }

    async fn read(&self, ctx: &ProviderContext, args: NodeLookup) -> AzdoResult<NodeData> {
        let node = ctx
            .clients
            .work_items
            .get_classification_node(
                &args.project_id.to_string(),
                self.group,
                &segments(&args.path),
                args.fetch_children.then_some(1),
            )
            .await?;
        Ok(NodeData::from_node(&node, args.fetch_children))
    }
}
