//! azdo-core: shared infrastructure for the Azure DevOps provider.
//!
//! REST transport, error taxonomy, configuration, logging, the async waiter
//! and the typed per-area API clients.
pub mod clients;
pub mod config;
pub mod error;
pub mod observability;
pub mod rest;
pub mod time;
pub mod utils;
pub mod waiter;

pub use clients::AzdoClients;
pub use config::{PollPolicy, PollSettings, ProviderConfig};
pub use error::{AzdoError, AzdoResult, NotFoundExt, WrappedError};
pub use rest::RestClient;
pub use time::Time;
pub use waiter::StateChangeConf;

pub use secrecy;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tokio_util;
pub use tracing;
pub use uuid;
pub use validator;
