//! Service endpoint area: endpoint CRUD and cross-project sharing.

use crate::error::{AzdoError, AzdoResult, WrappedError};
use crate::rest::{NoContent, RestClient};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;
use uuid::Uuid;

const API_VERSION: &str = "7.0";

/// Owner every endpoint managed here carries.
pub const OWNER_LIBRARY: &str = "library";

pub const STATE_READY: &str = "Ready";
pub const STATE_FAILED: &str = "Failed";
pub const STATE_IN_PROGRESS: &str = "InProgress";

/// Maps where the service sends `null` for masked values.
fn string_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error> {
    let raw = Option::<BTreeMap<String, Option<String>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAuthorization {
    pub scheme: String,
    #[serde(default, deserialize_with = "string_map")]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpointProjectReference {
    pub project_reference: ProjectReference,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub endpoint_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "string_map")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<EndpointAuthorization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_shared: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_status: Option<OperationStatus>,
    #[serde(default)]
    pub service_endpoint_project_references: Vec<ServiceEndpointProjectReference>,
}

impl ServiceEndpoint {
    /// `Ready`, `Failed` or `InProgress`.
    pub fn readiness_state(&self) -> &'static str {
        if self.is_ready.unwrap_or(false) {
            return STATE_READY;
        }
        match self.operation_status.as_ref().and_then(|s| s.state.as_deref()) {
            Some(state) if state.eq_ignore_ascii_case(STATE_FAILED) => STATE_FAILED,
            Some(state) if state.eq_ignore_ascii_case(STATE_READY) => STATE_READY,
            _ => STATE_IN_PROGRESS,
        }
    }

    pub fn status_message(&self) -> Option<&str> {
        self.operation_status
            .as_ref()
            .and_then(|s| s.status_message.as_deref())
    }

    /// Project ids the endpoint is currently shared with.
    pub fn project_ids(&self) -> Vec<Uuid> {
        self.service_endpoint_project_references
            .iter()
            .map(|r| r.project_reference.id)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceEndpointClient {
    rest: RestClient,
}

impl ServiceEndpointClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    #[instrument(skip(self, endpoint), fields(name = %endpoint.name, endpoint_type = %endpoint.endpoint_type))]
    pub async fn create_service_endpoint(&self, endpoint: &ServiceEndpoint) -> AzdoResult<ServiceEndpoint> {
        self.rest
            .post(["_apis", "serviceendpoint", "endpoints"])
            .api_version(API_VERSION)
            .json(endpoint)?
            .redact_response()
            .send()
            .await
    }

    /// A deleted endpoint is answered with `200` and a `null` body; that is reported as not found.
    #[instrument(skip(self))]
    pub async fn get_service_endpoint(&self, project: &str, endpoint_id: &Uuid) -> AzdoResult<ServiceEndpoint> {
        let endpoint: Option<ServiceEndpoint> = self
            .rest
            .get([
                project.to_string(),
                "_apis".to_string(),
                "serviceendpoint".to_string(),
                "endpoints".to_string(),
                endpoint_id.to_string(),
            ])
            .api_version(API_VERSION)
            .redact_response()
            .send()
            .await?;

        endpoint
            .filter(|e| e.id.is_some())
            .ok_or_else(|| {
                AzdoError::NotFound(WrappedError {
                    message: Some(format!("service endpoint {endpoint_id} does not exist")),
                    status_code: 404,
                    ..Default::default()
                })
            })
    }

    #[instrument(skip(self, endpoint), fields(name = %endpoint.name))]
    pub async fn update_service_endpoint(
        &self,
        endpoint_id: &Uuid,
        endpoint: &ServiceEndpoint,
    ) -> AzdoResult<ServiceEndpoint> {
        self.rest
            .put([
                "_apis".to_string(),
                "serviceendpoint".to_string(),
                "endpoints".to_string(),
                endpoint_id.to_string(),
            ])
            .api_version(API_VERSION)
            .json(endpoint)?
            .redact_response()
            .send()
            .await
    }

    /// Remove the endpoint from the listed projects; removing it from its owner deletes it.
    #[instrument(skip(self))]
    pub async fn delete_service_endpoint(&self, endpoint_id: &Uuid, project_ids: &[Uuid]) -> AzdoResult<()> {
        let project_ids = project_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.rest
            .delete([
                "_apis".to_string(),
                "serviceendpoint".to_string(),
                "endpoints".to_string(),
                endpoint_id.to_string(),
            ])
            .query("projectIds", project_ids)
            .api_version(API_VERSION)
            .send::<NoContent>()
            .await?;
        Ok(())
    }

    /// Share the endpoint with additional projects.
    #[instrument(skip(self, references), fields(count = references.len()))]
    pub async fn share_service_endpoint(
        &self,
        endpoint_id: &Uuid,
        references: &[ServiceEndpointProjectReference],
    ) -> AzdoResult<()> {
        self.rest
            .patch([
                "_apis".to_string(),
                "serviceendpoint".to_string(),
                "endpoints".to_string(),
                endpoint_id.to_string(),
            ])
            .api_version(API_VERSION)
            .json(references)?
            .send::<NoContent>()
            .await?;
        Ok(())
    }
}
