//! Shared setup for azdo-provider integration tests.

#![allow(dead_code)]

use azdo_core::rest::basic_authorization;
use azdo_core::secrecy::Secret;
use azdo_core::{AzdoClients, PollSettings, RestClient};
use azdo_provider::{Provider, ProviderContext};
use serde_json::{Value, json};
use wiremock::MockServer;

pub const TEST_PAT: &str = "provider-test-pat";

/// Every client pointed at `server`, organization and identity host alike.
pub fn context(server: &MockServer) -> ProviderContext {
    let rest = RestClient::new(&server.uri(), basic_authorization(&Secret::new(TEST_PAT.to_string())))
        .expect("mock server URI is valid");
    ProviderContext::new(AzdoClients::new(rest.clone(), rest), PollSettings::immediate())
}

/// A configured provider backed by `server`.
pub fn provider(server: &MockServer) -> Provider {
    let mut provider = Provider::new();
    provider.configure_with(context(server));
    provider
}

/// `{"count": n, "value": [...]}`
pub fn list(values: Vec<Value>) -> Value {
    json!({ "count": values.len(), "value": values })
}

/// A `404` the way Azure DevOps reports it.
pub fn not_found(message: &str) -> Value {
    json!({
        "message": message,
        "typeKey": "NotFoundException",
        "errorCode": 0
    })
}
