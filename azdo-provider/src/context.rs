//! Per-provider state shared by every handler.

use crate::security::NamespaceCache;
use azdo_core::{AzdoClients, AzdoResult, PollSettings, ProviderConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Handed to every lifecycle call. Cheap to clone.
#[derive(Clone)]
pub struct ProviderContext {
    pub clients: Arc<AzdoClients>,
    pub namespaces: Arc<NamespaceCache>,
    pub poll: PollSettings,
    pub cancel: CancellationToken,
}

impl ProviderContext {
    pub fn new(clients: AzdoClients, poll: PollSettings) -> Self {
        Self {
            clients: Arc::new(clients),
            namespaces: Arc::new(NamespaceCache::new()),
            poll,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> AzdoResult<Self> {
        Ok(Self::new(AzdoClients::from_config(config)?, config.poll))
    }

    /// Same clients and caches, cancelled together with `parent`.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }
}
