//! `azuredevops_project_features`

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::clients::core::ProjectFeature;
use azdo_core::utils::FeatureState;
use azdo_core::{AzdoError, AzdoResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Only features given a value are managed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_feature_combination"))]
pub struct ProjectFeaturesModel {
    pub project_id: Uuid,
    #[serde(default)]
    pub boards: Option<FeatureState>,
    #[serde(default)]
    pub repositories: Option<FeatureState>,
    #[serde(default)]
    pub pipelines: Option<FeatureState>,
    #[serde(default)]
    pub testplans: Option<FeatureState>,
    #[serde(default)]
    pub artifacts: Option<FeatureState>,
}

/// Test plans depend on boards.
fn validate_feature_combination(model: &ProjectFeaturesModel) -> Result<(), ValidationError> {
    if model.testplans == Some(FeatureState::Enabled) && model.boards == Some(FeatureState::Disabled) {
        let mut err = ValidationError::new("testplans_requires_boards");
        err.message = Some("testplans cannot be enabled while boards is disabled".into());
        return Err(err);
    }
    Ok(())
}

impl ProjectFeaturesModel {
    pub fn get(&self, feature: ProjectFeature) -> Option<FeatureState> {
        match feature {
            ProjectFeature::Boards => self.boards,
            ProjectFeature::Repositories => self.repositories,
            ProjectFeature::Pipelines => self.pipelines,
            ProjectFeature::Testplans => self.testplans,
            ProjectFeature::Artifacts => self.artifacts,
        }
    }

    fn slot(&mut self, feature: ProjectFeature) -> &mut Option<FeatureState> {
        match feature {
            ProjectFeature::Boards => &mut self.boards,
            ProjectFeature::Repositories => &mut self.repositories,
            ProjectFeature::Pipelines => &mut self.pipelines,
            ProjectFeature::Testplans => &mut self.testplans,
            ProjectFeature::Artifacts => &mut self.artifacts,
        }
    }

    pub fn configured(&self) -> BTreeMap<ProjectFeature, FeatureState> {
        ProjectFeature::ALL
            .into_iter()
            .filter_map(|f| self.get(f).map(|s| (f, s)))
            .collect()
    }

    /// Keep only the features this model manages, with the observed values.
    fn observed(&self, actual: &BTreeMap<ProjectFeature, FeatureState>) -> Self {
        let mut observed = Self {
            project_id: self.project_id,
            ..Default::default()
        };
        for feature in ProjectFeature::ALL {
            if self.get(feature).is_some() {
                *observed.slot(feature) = Some(actual.get(&feature).copied().unwrap_or_default());
            }
        }
        observed
    }
}

/// Disable test plans before boards, enable boards before test plans.
pub fn ordered_changes(changes: &BTreeMap<ProjectFeature, FeatureState>) -> Vec<(ProjectFeature, FeatureState)> {
    let mut ordered: Vec<_> = changes.iter().map(|(f, s)| (*f, *s)).collect();
    ordered.sort_by_key(|(feature, state)| match (state, feature) {
        (FeatureState::Disabled, ProjectFeature::Testplans) => 0,
        (FeatureState::Disabled, _) => 1,
        (FeatureState::Enabled, ProjectFeature::Boards) => 2,
        (FeatureState::Enabled, _) => 3,
    });
    ordered
}

pub struct ProjectFeaturesResource;

impl ProjectFeaturesResource {
    async fn apply(
        ctx: &ProviderContext,
        project_id: &Uuid,
        changes: &BTreeMap<ProjectFeature, FeatureState>,
    ) -> AzdoResult<()> {
        for (feature, state) in ordered_changes(changes) {
            let result = ctx
                .clients
                .core
                .update_project_feature(project_id, feature, state)
                .await?;
            if !result.state.eq_ignore_ascii_case(state.as_str()) && !result.state.is_empty() {
                return Err(AzdoError::UnexpectedState {
                    operation: format!("set feature {} on project {project_id}", feature.name()),
                    state: result.state,
                    expected: vec![state.as_str().to_string()],
                });
            }
            info!(project_id = %project_id, feature = feature.name(), state = state.as_str(), "Updated project feature");
        }
        Ok(())
    }

    async fn observe(ctx: &ProviderContext, model: &ProjectFeaturesModel) -> AzdoResult<ProjectFeaturesModel> {
        let actual = ctx.clients.core.get_project_features(&model.project_id).await?;
        Ok(model.observed(&actual))
    }
}

#[async_trait]
impl Resource for ProjectFeaturesResource {
    type Model = ProjectFeaturesModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_project_features"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: ProjectFeaturesModel) -> AzdoResult<ProjectFeaturesModel> {
        Self::apply(ctx, &planned.project_id, &planned.configured()).await?;
        Self::observe(ctx, &planned).await
    }

    async fn read(&self, ctx: &ProviderContext, state: ProjectFeaturesModel) -> AzdoResult<Option<ProjectFeaturesModel>> {
        Ok(Some(Self::observe(ctx, &state).await?))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: ProjectFeaturesModel,
        planned: ProjectFeaturesModel,
    ) -> AzdoResult<ProjectFeaturesModel> {
        let prior = prior.configured();
        let changes: BTreeMap<_, _> = planned
            .configured()
            .into_iter()
            .filter(|(f, s)| prior.get(f) != Some(s))
            .collect();
        Self::apply(ctx, &planned.project_id, &changes).await?;
        Self::observe(ctx, &planned).await
    }

    /// Every feature goes back to enabled.
    async fn delete(&self, ctx: &ProviderContext, state: ProjectFeaturesModel) -> AzdoResult<()> {
        let all_enabled: BTreeMap<_, _> = ProjectFeature::ALL
            .into_iter()
            .map(|f| (f, FeatureState::Enabled))
            .collect();
        Self::apply(ctx, &state.project_id, &all_enabled).await
    }
}
