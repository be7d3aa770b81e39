//! `azuredevops_agent_pool` and `azuredevops_agent_queue`.

use crate::context::ProviderContext;
use crate::registry::Resource;
use async_trait::async_trait;
use azdo_core::clients::distributedtask::{PoolType, TaskAgentPool, TaskAgentPoolReference, TaskAgentQueue};
use azdo_core::clients::pipelines::PipelineResourceType;
use azdo_core::utils::validate_non_blank;
use azdo_core::{AzdoError, AzdoResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AgentPoolModel {
    #[serde(default)]
    pub id: Option<i32>,
    #[validate(custom(function = "validate_non_blank"))]
    pub name: String,
    #[serde(default = "default_pool_type")]
    pub pool_type: PoolType,
    #[serde(default)]
    pub auto_provision: bool,
    #[serde(default = "default_true")]
    pub auto_update: bool,
}

fn default_pool_type() -> PoolType {
    PoolType::Automation
}

fn default_true() -> bool {
    true
}

impl AgentPoolModel {
    fn to_pool(&self) -> TaskAgentPool {
        TaskAgentPool {
            id: self.id,
            name: self.name.clone(),
            pool_type: Some(self.pool_type),
            auto_provision: Some(self.auto_provision),
            auto_update: Some(self.auto_update),
            is_hosted: None,
        }
    }

    fn from_pool(pool: TaskAgentPool, prior: &Self) -> Self {
        Self {
            id: pool.id.or(prior.id),
            name: pool.name,
            pool_type: pool.pool_type.unwrap_or(prior.pool_type),
            auto_provision: pool.auto_provision.unwrap_or(prior.auto_provision),
            auto_update: pool.auto_update.unwrap_or(prior.auto_update),
        }
    }

    fn require_id(&self) -> AzdoResult<i32> {
        self.id
            .ok_or_else(|| AzdoError::Validation(format!("agent pool '{}' has no id in state", self.name)))
    }
}

pub struct AgentPoolResource;

#[async_trait]
impl Resource for AgentPoolResource {
    type Model = AgentPoolModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_agent_pool"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["pool_type"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: AgentPoolModel) -> AzdoResult<AgentPoolModel> {
        let pool = ctx.clients.distributed_task.add_agent_pool(&planned.to_pool()).await?;
        info!(pool_id = ?pool.id, name = %pool.name, "Created agent pool");
        Ok(AgentPoolModel::from_pool(pool, &planned))
    }

    async fn read(&self, ctx: &ProviderContext, state: AgentPoolModel) -> AzdoResult<Option<AgentPoolModel>> {
        let pool = ctx.clients.distributed_task.get_agent_pool(state.require_id()?).await?;
        Ok(Some(AgentPoolModel::from_pool(pool, &state)))
    }

    async fn update(&self, ctx: &ProviderContext, prior: AgentPoolModel, planned: AgentPoolModel) -> AzdoResult<AgentPoolModel> {
        let id = prior.require_id()?;
        let mut pool = planned.to_pool();
        pool.id = Some(id);
        let pool = ctx.clients.distributed_task.update_agent_pool(id, &pool).await?;
        Ok(AgentPoolModel::from_pool(pool, &planned))
    }

    async fn delete(&self, ctx: &ProviderContext, state: AgentPoolModel) -> AzdoResult<()> {
        ctx.clients.distributed_task.delete_agent_pool(state.require_id()?).await
    }
}

/// Links an organization pool into a project and authorizes every pipeline to use it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AgentQueueModel {
    #[serde(default)]
    pub id: Option<i32>,
    pub project_id: Uuid,
    pub agent_pool_id: i32,
    #[serde(default)]
    pub name: Option<String>,
}

impl AgentQueueModel {
    fn require_id(&self) -> AzdoResult<i32> {
        self.id
            .ok_or_else(|| AzdoError::Validation("agent queue has no id in state".into()))
    }

    fn from_queue(queue: TaskAgentQueue, prior: &Self) -> Self {
        Self {
            id: queue.id.or(prior.id),
            project_id: prior.project_id,
            agent_pool_id: queue.pool.map(|p| p.id).unwrap_or(prior.agent_pool_id),
            name: Some(queue.name).filter(|n| !n.is_empty()).or_else(|| prior.name.clone()),
        }
    }
}

pub struct AgentQueueResource;

impl AgentQueueResource {
    async fn grant(ctx: &ProviderContext, model: &AgentQueueModel) -> AzdoResult<()> {
        ctx.clients
            .pipelines
            .grant_all_pipelines(
                &model.project_id.to_string(),
                PipelineResourceType::Queue,
                &model.require_id()?.to_string(),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for AgentQueueResource {
    type Model = AgentQueueModel;

    fn type_name(&self) -> &'static str {
        "azuredevops_agent_queue"
    }

    fn replace_fields(&self) -> &'static [&'static str] {
        &["project_id", "agent_pool_id", "name"]
    }

    async fn create(&self, ctx: &ProviderContext, planned: AgentQueueModel) -> AzdoResult<AgentQueueModel> {
        let name = match &planned.name {
            Some(name) => name.clone(),
            None => ctx.clients.distributed_task.get_agent_pool(planned.agent_pool_id).await?.name,
        };
        let queue = TaskAgentQueue {
            id: None,
            name,
            pool: Some(TaskAgentPoolReference {
                id: planned.agent_pool_id,
                name: None,
            }),
            project_id: None,
        };
        let queue = ctx
            .clients
            .distributed_task
            .add_agent_queue(&planned.project_id.to_string(), &queue)
            .await?;
        let created = AgentQueueModel::from_queue(queue, &planned);
        Self::grant(ctx, &created).await?;
        info!(queue_id = ?created.id, project_id = %created.project_id, "Created agent queue");
        Ok(created)
    }

    async fn read(&self, ctx: &ProviderContext, state: AgentQueueModel) -> AzdoResult<Option<AgentQueueModel>> {
        let queue = ctx
            .clients
            .distributed_task
            .get_agent_queue(&state.project_id.to_string(), state.require_id()?)
            .await?;
        Ok(Some(AgentQueueModel::from_queue(queue, &state)))
    }

    /// Every field forces replacement; only the grant is reapplied.
    async fn update(&self, ctx: &ProviderContext, prior: AgentQueueModel, planned: AgentQueueModel) -> AzdoResult<AgentQueueModel> {
        let updated = AgentQueueModel { id: prior.id, ..planned };
        Self::grant(ctx, &updated).await?;
        Ok(updated)
    }

    async fn delete(&self, ctx: &ProviderContext, state: AgentQueueModel) -> AzdoResult<()> {
        ctx.clients
            .distributed_task
            .delete_agent_queue(&state.project_id.to_string(), state.require_id()?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_defaults() {
        let m: AgentPoolModel = serde_json::from_value(serde_json::json!({"name": "linux"})).unwrap();
        assert_eq!(m.pool_type, PoolType::Automation);
        assert!(m.auto_update);
        assert!(!m.auto_provision);
        let pool = m.to_pool();
        assert_eq!(pool.pool_type, Some(PoolType::Automation));
    }

    #[test]
    fn test_queue_from_response_keeps_project() {
        let prior: AgentQueueModel = serde_json::from_value(serde_json::json!({
            "project_id": "9a3b1e5c-0000-4000-8000-000000000001",
            "agent_pool_id": 4
        }))
        .unwrap();
        let queue = TaskAgentQueue {
            id: Some(12),
            name: "linux".into(),
            pool: Some(TaskAgentPoolReference { id: 4, name: None }),
            project_id: None,
        };
        let m = AgentQueueModel::from_queue(queue, &prior);
        assert_eq!(m.id, Some(12));
        assert_eq!(m.name.as_deref(), Some("linux"));
        assert_eq!(m.project_id, prior.project_id);
    }
}
