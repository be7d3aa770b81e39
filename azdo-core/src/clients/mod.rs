//! Typed clients, one per Azure DevOps area.
//!
//! Each client knows its path layout and API versions and nothing else.

pub mod core;
pub mod distributedtask;
pub mod graph;
pub mod pipelines;
pub mod security;
pub mod serviceendpoint;
pub mod workitems;

use crate::config::ProviderConfig;
use crate::error::AzdoResult;
use crate::rest::RestClient;

pub use self::core::CoreClient;
pub use distributedtask::DistributedTaskClient;
pub use graph::GraphClient;
pub use pipelines::PipelinesClient;
pub use security::SecurityClient;
pub use serviceendpoint::ServiceEndpointClient;
pub use workitems::WorkItemTrackingClient;

/// Every domain client, sharing one connection pool.
#[derive(Debug, Clone)]
pub struct AzdoClients {
    pub core: CoreClient,
    pub graph: GraphClient,
    pub security: SecurityClient,
    pub distributed_task: DistributedTaskClient,
    pub pipelines: PipelinesClient,
    pub service_endpoints: ServiceEndpointClient,
    pub work_items: WorkItemTrackingClient,
}

impl AzdoClients {
    pub fn from_config(config: &ProviderConfig) -> AzdoResult<Self> {
        let rest = RestClient::from_config(config)?;
        let identity = rest.rebase(&config.identity_url()?)?;
        tracing::info!(
            organization_url = %rest.base_url(),
            identity_url = %identity.base_url(),
            "Configured Azure DevOps clients"
        );
        Ok(Self::new(rest, identity))
    }

    pub fn new(rest: RestClient, identity: RestClient) -> Self {
        Self {
            core: CoreClient::new(rest.clone()),
            graph: GraphClient::new(identity.clone()),
            security: SecurityClient::new(rest.clone(), identity),
            distributed_task: DistributedTaskClient::new(rest.clone()),
            pipelines: PipelinesClient::new(rest.clone()),
            service_endpoints: ServiceEndpointClient::new(rest.clone()),
            work_items: WorkItemTrackingClient::new(rest),
        }
    }
}
