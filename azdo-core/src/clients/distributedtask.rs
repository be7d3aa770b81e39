//! Distributed task area: agent pools, agent queues, environments and their resources.

use crate::error::AzdoResult;
use crate::rest::{ListResponse, NoContent, RestClient};
use crate::time::Time;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

const API_VERSION: &str = "7.0";
const ENVIRONMENT_API_VERSION: &str = "7.0-preview.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    Automation,
    Deployment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAgentPool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_type: Option<PoolType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_provision: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hosted: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAgentPoolReference {
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAgentQueue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<TaskAgentPoolReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInstance {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_on: Option<Time>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentReference {
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesResource {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    pub service_endpoint_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_reference: Option<EnvironmentReference>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesResourceArgs {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    pub service_endpoint_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct DistributedTaskClient {
    rest: RestClient,
}

impl DistributedTaskClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    // --- agent pools (organization level) ---

    #[instrument(skip(self, pool), fields(name = %pool.name))]
    pub async fn add_agent_pool(&self, pool: &TaskAgentPool) -> AzdoResult<TaskAgentPool> {
        self.rest
            .post(["_apis", "distributedtask", "pools"])
            .api_version(API_VERSION)
            .json(pool)?
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_agent_pool(&self, pool_id: i32) -> AzdoResult<TaskAgentPool> {
        self.rest
            .get(["_apis".to_string(), "distributedtask".to_string(), "pools".to_string(), pool_id.to_string()])
            .api_version(API_VERSION)
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_agent_pools(&self, pool_name: Option<&str>) -> AzdoResult<Vec<TaskAgentPool>> {
        Ok(self
            .rest
            .get(["_apis", "distributedtask", "pools"])
            .query_opt("poolName", pool_name)
            .api_version(API_VERSION)
            .send::<ListResponse<TaskAgentPool>>()
            .await?
            .into_inner())
    }

    #[instrument(skip(self, pool))]
    pub async fn update_agent_pool(&self, pool_id: i32, pool: &TaskAgentPool) -> AzdoResult<TaskAgentPool> {
        self.rest
            .patch(["_apis".to_string(), "distributedtask".to_string(), "pools".to_string(), pool_id.to_string()])
            .api_version(API_VERSION)
            .json(pool)?
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_agent_pool(&self, pool_id: i32) -> AzdoResult<()> {
        self.rest
            .delete(["_apis".to_string(), "distributedtask".to_string(), "pools".to_string(), pool_id.to_string()])
            .api_version(API_VERSION)
            .send::<NoContent>()
            .await?;
        Ok(())
    }

    // --- agent queues (project level) ---

    #[instrument(skip(self, queue), fields(name = %queue.name))]
    pub async fn add_agent_queue(&self, project: &str, queue: &TaskAgentQueue) -> AzdoResult<TaskAgentQueue> {
        self.rest
            .post([project, "_apis", "distributedtask", "queues"])
            .query("authorizePipelines", false)
            .api_version(API_VERSION)
            .json(queue)?
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_agent_queue(&self, project: &str, queue_id: i32) -> AzdoResult<TaskAgentQueue> {
        self.rest
            .get([
                project.to_string(),
                "_apis".to_string(),
                "distributedtask".to_string(),
                "queues".to_string(),
                queue_id.to_string(),
            ])
            .api_version(API_VERSION)
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_agent_queues(&self, project: &str, queue_name: Option<&str>) -> AzdoResult<Vec<TaskAgentQueue>> {
        Ok(self
            .rest
            .get([project, "_apis", "distributedtask", "queues"])
            .query_opt("queueName", queue_name)
            .api_version(API_VERSION)
            .send::<ListResponse<TaskAgentQueue>>()
            .await?
            .into_inner())
    }

    #[instrument(skip(self))]
    pub async fn delete_agent_queue(&self, project: &str, queue_id: i32) -> AzdoResult<()> {
        self.rest
            .delete([
                project.to_string(),
                "_apis".to_string(),
                "distributedtask".to_string(),
                "queues".to_string(),
                queue_id.to_string(),
            ])
            .api_version(API_VERSION)
            .send::<NoContent>()
            .await?;
        Ok(())
    }

    // --- environments ---

    fn environment_segments(project: &str, tail: &[String]) -> Vec<String> {
        let mut segments = vec![
            project.to_string(),
            "_apis".to_string(),
            "distributedtask".to_string(),
            "environments".to_string(),
        ];
        segments.extend(tail.iter().cloned());
        segments
    }

    #[instrument(skip(self, args))]
    pub async fn add_environment(&self, project: &str, args: &EnvironmentArgs) -> AzdoResult<EnvironmentInstance> {
        self.rest
            .post(Self::environment_segments(project, &[]))
            .api_version(ENVIRONMENT_API_VERSION)
            .json(args)?
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_environment(&self, project: &str, environment_id: i32) -> AzdoResult<EnvironmentInstance> {
        self.rest
            .get(Self::environment_segments(project, &[environment_id.to_string()]))
            .api_version(ENVIRONMENT_API_VERSION)
            .send()
            .await
    }

    #[instrument(skip(self, args))]
    pub async fn update_environment(
        &self,
        project: &str,
        environment_id: i32,
        args: &EnvironmentArgs,
    ) -> AzdoResult<EnvironmentInstance> {
        self.rest
            .patch(Self::environment_segments(project, &[environment_id.to_string()]))
            .api_version(ENVIRONMENT_API_VERSION)
            .json(args)?
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_environment(&self, project: &str, environment_id: i32) -> AzdoResult<()> {
        self.rest
            .delete(Self::environment_segments(project, &[environment_id.to_string()]))
            .api_version(ENVIRONMENT_API_VERSION)
            .send::<NoContent>()
            .await?;
        Ok(())
    }

    // --- environment resources ---

    fn kubernetes_segments(project: &str, environment_id: i32, resource_id: Option<i32>) -> Vec<String> {
        let mut tail = vec![
            environment_id.to_string(),
            "providers".to_string(),
            "kubernetes".to_string(),
        ];
        if let Some(id) = resource_id {
            tail.push(id.to_string());
        }
        Self::environment_segments(project, &tail)
    }

    #[instrument(skip(self, args))]
    pub async fn add_kubernetes_resource(
        &self,
        project: &str,
        environment_id: i32,
        args: &KubernetesResourceArgs,
    ) -> AzdoResult<KubernetesResource> {
        self.rest
            .post(Self::kubernetes_segments(project, environment_id, None))
            .api_version(ENVIRONMENT_API_VERSION)
            .json(args)?
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_kubernetes_resource(
        &self,
        project: &str,
        environment_id: i32,
        resource_id: i32,
    ) -> AzdoResult<KubernetesResource> {
        self.rest
            .get(Self::kubernetes_segments(project, environment_id, Some(resource_id)))
            .api_version(ENVIRONMENT_API_VERSION)
            .send()
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_kubernetes_resource(
        &self,
        project: &str,
        environment_id: i32,
        resource_id: i32,
    ) -> AzdoResult<()> {
        self.rest
            .delete(Self::kubernetes_segments(project, environment_id, Some(resource_id)))
            .api_version(ENVIRONMENT_API_VERSION)
            .send::<NoContent>()
            .await?;
        Ok(())
    }
}
