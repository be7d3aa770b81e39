//! `azuredevops_area` and `azuredevops_iteration`.
//!
//! Paths in state are `/`-separated and relative to the tree root; the API
//! uses `\` and includes the project and root folder.

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::clients::workitems::{ClassificationNodeArgs, TreeStructureGroup, WorkItemClassificationNode};
use azdo_core::utils::{validate_date, validate_non_blank};
use azdo_core::{AzdoError, AzdoResult, Time};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub const START_DATE: &str = "startDate";
pub const FINISH_DATE: &str = "finishDate";

/// `One/Two` → `\One\Two`.
pub fn to_api_path(user_path: &str) -> String {
    user_path
        .split('/')
        .filter(|p| !p.is_empty())
        .map(|p| format!("\\{p}"))
        .collect()
}

/// `\One\Two` → `One/Two`.
pub fn to_user_path(api_path: &str) -> String {
    api_path
        .split('\\')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `\<project>\Area\One\Two` → `\One\Two`.
pub fn strip_root(node_path: &str) -> String {
    node_path
        .split('\\')
        .skip(3)
        .map(|p| format!("\\{p}"))
        .collect()
}

pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn parent_of(path: &str) -> String {
    path.rsplit_once('/').map(|(parent, _)| parent.to_string()).unwrap_or_default()
}

/// Path components as URL segments.
pub fn segments(user_path: &str) -> Vec<String> {
    user_path
        .split('/')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Date-only values are sent as midnight UTC.
fn api_date(value: &str) -> String {
    if value.len() == 10 && !value.contains('T') {
        format!("{value}T00:00:00Z")
    } else {
        value.to_string()
    }
}

fn same_instant(configured: &str, observed: &str) -> bool {
    matches!(
        (Time::parse(&api_date(configured)), Time::parse(observed)),
        (Ok(a), Ok(b)) if a == b
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ClassificationModel {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub identifier: Option<Uuid>,
    pub project_id: Uuid,
    #[validate(custom(function = "validate_non_blank"))]
    pub name: String,
    /// Empty for a node directly below the root.
    #[serde(default)]
    pub parent_path: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default)]
    #[validate(custom(function = "validate_date"))]
    pub start_date: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_date"))]
    pub finish_date: Option<String>,
}

impl ClassificationModel {
    fn current_path(&self) -> String {
        self.path
            .clone()
            .unwrap_or_else(|| join_path(&self.parent_path, &self.name))
    }

    fn attributes(&self) -> Option<BTreeMap<String, Value>> {
        let mut attributes = BTreeMap::new();
        if let Some(start) = &self.start_date {
            attributes.insert(START_DATE.to_string(), Value::String(api_date(start)));
        }
        if let Some(finish) = &self.finish_date {
            attributes.insert(FINISH_DATE.to_string(), Value::String(api_date(finish)));
        }
        (!attributes.is_empty()).then_some(attributes)
    }

    fn observed(&self, node: &WorkItemClassificationNode) -> Self {
        let path = to_user_path(&strip_root(&node.path));
        let keep = |configured: &Option<String>, key: &str| -> Option<String> {
            let observed = node.attribute_str(key)?;
            match configured {
                Some(c) if same_instant(c, observed) => Some(c.clone()),
                _ => Some(observed.to_string()),
            }
        };
        Self {
            id: Some(node.id),
            identifier: Some(node.identifier),
            project_id: self.project_id,
            name: node.name.clone(),
            parent_path: parent_of(&path),
            path: Some(path),
            has_children: node.has_children,
            start_date: keep(&self.start_date, START_DATE),
            finish_date: keep(&self.finish_date, FINISH_DATE),
        }
    }
}

pub struct ClassificationResource {
    group: TreeStructureGroup,
}

impl ClassificationResource {
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

    fn check_dates(&self, model: &ClassificationModel) -> AzdoResult<()> {
        if self.group == TreeStructureGroup::Areas && (model.start_date.is_some() || model.finish_date.is_some()) {
            return Err(AzdoError::Validation("areas do not have start or finish dates".into()));
        }
        Ok(())
    }

    async fn fetch(&self, ctx: &ProviderContext, model: &ClassificationModel, path: &str) -> AzdoResult<ClassificationModel> {
        let node = ctx
            .clients
            .work_items
            .get_classification_node(&model.project_id.to_string(), self.group, &segments(path), None)
            .await?;
        Ok(model.observed(&node))
    }
}

#[async_trait]
impl Resource for ClassificationResource {
    type Model = ClassificationModel;

    fn type_name(&self) -> &'static str {
        match self.group {
            TreeStructureGroup::Areas => "azuredevops_area",
            TreeStructureGroup::Iterations => "azuredevops_iteration",
        }
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id"]
    }

    /// Show the path the node will end up at.
    fn modify_plan(&self, prior: Option<&ClassificationModel>, planned: &mut ClassificationModel) {
        let path = match prior {
            Some(prior) if prior.parent_path.trim_matches('/') == planned.parent_path.trim_matches('/') => {
                join_path(&parent_of(&prior.current_path()), &planned.name)
            }
            _ => join_path(&planned.parent_path, &planned.name),
        };
        planned.path = Some(path);
    }

    async fn create(&self, ctx: &ProviderContext, planned: ClassificationModel) -> AzdoResult<ClassificationModel> {
        self.check_dates(&planned)?;
        let args = ClassificationNodeArgs {
            name: Some(planned.name.clone()),
            attributes: planned.attributes(),
        };
        let node = ctx
            .clients
            .work_items
            .create_classification_node(
                &planned.project_id.to_string(),
                self.group,
                &segments(&planned.parent_path),
                &args,
            )
            .await?;
        info!(group = self.group.as_str(), node_id = node.id, path = %node.path, "Created classification node");
        Ok(planned.observed(&node))
    }

    async fn read(&self, ctx: &ProviderContext, state: ClassificationModel) -> AzdoResult<Option<ClassificationModel>> {
        let Some(id) = state.id else {
            return Ok(Some(self.fetch(ctx, &state, &state.current_path()).await?));
        };
        let nodes = ctx
            .clients
            .work_items
            .get_classification_nodes(&state.project_id.to_string(), &[id], None)
            .await?;
        Ok(nodes.first().map(|node| state.observed(node)))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: ClassificationModel,
        planned: ClassificationModel,
    ) -> AzdoResult<ClassificationModel> {
        self.check_dates(&planned)?;
        let project = planned.project_id.to_string();
        let id = prior
            .id
            .ok_or_else(|| AzdoError::Validation(format!("node '{}' has no id in state", prior.name)))?;

        let mut current_path = prior.current_path();
        if prior.parent_path.trim_matches('/') != planned.parent_path.trim_matches('/') {
            let moved = ctx
                .clients
                .work_items
                .move_classification_node(&project, self.group, &segments(&planned.parent_path), id)
                .await?;
            current_path = to_user_path(&strip_root(&moved.path));
            info!(node_id = id, path = %current_path, "Moved classification node");
        }

        let renamed = prior.name != planned.name;
        let attributes_changed = prior.start_date != planned.start_date || prior.finish_date != planned.finish_date;
        if renamed || attributes_changed {
            let args = ClassificationNodeArgs {
                name: renamed.then(|| planned.name.clone()),
                attributes: if attributes_changed { planned.attributes() } else { None },
            };
            let node = ctx
                .clients
                .work_items
                .update_classification_node(&project, self.group, &segments(&current_path), &args)
                .await?;
            return Ok(planned.observed(&node));
        }

        self.fetch(ctx, &planned, &current_path).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: ClassificationModel) -> AzdoResult<()> {
        ctx.clients
            .work_items
            .delete_classification_node(
                &state.project_id.to_string(),
                self.group,
                &segments(&state.current_path()),
                None,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(parent: &str, name: &str) -> ClassificationModel {
        ClassificationModel {
            project_id: Uuid::nil(),
            name: name.into(),
            parent_path: parent.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_path_conversion_round_trips() {
        for user in ["One", "One/Two", "One/Two/Three"] {
            assert_eq!(to_user_path(&to_api_path(user)), user);
        }
        for api in ["\\One", "\\One\\Two"] {
            assert_eq!(to_api_path(&to_user_path(api)), api);
        }
        assert_eq!(to_api_path(""), "");
        assert_eq!(to_user_path(""), "");
    }

    #[test]
    fn test_strip_root() {
        assert_eq!(strip_root("\\demo\\Area\\One\\Two"), "\\One\\Two");
        assert_eq!(strip_root("\\demo\\Area"), "");
    }

    #[test]
    fn test_plan_for_rename_in_place() {
        let mut prior = model("One", "Two");
        prior.path = Some("One/Two".into());
        let mut planned = model("One", "Three");
        ClassificationResource::areas().modify_plan(Some(&prior), &mut planned);
        assert_eq!(planned.path.as_deref(), Some("One/Three"));
    }

    #[test]
    fn test_plan_for_move() {
        let mut prior = model("One", "Two");
        prior.path = Some("One/Two".into());
        let mut planned = model("Other", "Two");
        ClassificationResource::areas().modify_plan(Some(&prior), &mut planned);
        assert_eq!(planned.path.as_deref(), Some("Other/Two"));
    }

    #[test]
    fn test_observed_node() {
        let node: WorkItemClassificationNode = serde_json::from_value(serde_json::json!({
            "id": 7, "identifier": "33333333-3333-3333-3333-333333333333",
            "name": "Sprint 1", "path": "\\demo\\Iteration\\2024\\Sprint 1",
            "attributes": {"startDate": "2024-01-01T00:00:00Z", "finishDate": "2024-01-14T00:00:00Z"}
        }))
        .unwrap();
        let mut configured = model("2024", "Sprint 1");
        configured.start_date = Some("2024-01-01".into());
        let observed = configured.observed(&node);
        assert_eq!(observed.path.as_deref(), Some("2024/Sprint 1"));
        assert_eq!(observed.parent_path, "2024");
        assert_eq!(observed.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(observed.finish_date.as_deref(), Some("2024-01-14T00:00:00Z"));
    }

    #[test]
    fn test_areas_reject_dates() {
        let mut m = model("", "Team");
        m.start_date = Some("2024-01-01".into());
        assert!(ClassificationResource::areas().check_dates(&m).is_err());
        assert!(ClassificationResource::iterations().check_dates(&m).is_ok());
    }

    #[test]
    fn test_attributes_use_midnight_utc() {
        let mut m = model("", "Sprint");
        m.finish_date = Some("2024-02-01".into());
        let attrs = m.attributes().unwrap();
        assert_eq!(attrs[FINISH_DATE], "2024-02-01T00:00:00Z");
    }
}
