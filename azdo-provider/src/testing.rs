//! Fixtures for unit tests.

use crate::context::ProviderContext;
use azdo_core::secrecy::Secret;
use azdo_core::{AzdoClients, PollSettings, RestClient};

/// A context whose clients point at a closed port.
pub(crate) fn offline_context() -> ProviderContext {
    let rest = RestClient::new("http://127.0.0.1:1", Secret::new("unused".to_string()))
        .expect("static URL parses");
    ProviderContext::new(AzdoClients::new(rest.clone(), rest), PollSettings::immediate())
}
