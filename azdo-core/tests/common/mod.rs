//! Shared helpers for azdo-core integration tests.

#![allow(dead_code)]

use azdo_core::rest::basic_authorization;
use azdo_core::{AzdoClients, RestClient};
use secrecy::Secret;
use wiremock::MockServer;

pub const TEST_PAT: &str = "test-pat";

/// `Basic base64(":test-pat")`.
pub const TEST_AUTHORIZATION: &str = "Basic OnRlc3QtcGF0";

pub fn rest_client(server: &MockServer) -> RestClient {
    RestClient::new(&server.uri(), basic_authorization(&Secret::new(TEST_PAT.to_string())))
        .expect("mock server URI is valid")
}

/// All clients pointed at one mock server (organization and identity host alike).
pub fn clients(server: &MockServer) -> AzdoClients {
    let rest = rest_client(server);
    AzdoClients::new(rest.clone(), rest)
}
