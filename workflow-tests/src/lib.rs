//! End-to-end provider workflows.
//!
//! Each test drives a configured [`Provider`] through plan and lifecycle
//! calls, the way a host would, against a [`MockServer`] standing in for the
//! organization (and its identity host). Assertions are made on the recorded
//! requests, so the tests run offline and need no credentials.
//!
//! ```bash
//! cargo test -p workflow-tests
//! ```

use azdo_core::config::PollSettings;
use azdo_core::rest::basic_authorization;
use azdo_core::secrecy::Secret;
use azdo_core::{AzdoClients, RestClient};
use azdo_provider::{Provider, ProviderContext};
use serde_json::{Value, json};
use std::sync::Once;
use uuid::Uuid;
use wiremock::MockServer;
use wiremock::http::Method;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

pub const TEST_PAT: &str = "workflow-pat";

/// Namespace id of the `Project` security namespace.
pub const PROJECT_NAMESPACE: &str = "52d39943-cb85-4d7f-8fa8-c6baac873819";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,azdo_provider=debug,workflow_tests=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A provider wired to its own mock organization.
///
/// Every test builds a fresh context so mocks and caches never leak between
/// tests.
pub struct WorkflowTestContext {
    pub server: MockServer,
    pub provider: Provider,
    /// Project the scenario works in.
    pub project_id: Uuid,
}

impl WorkflowTestContext {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_poll(PollSettings::immediate()).await
    }

    pub async fn with_poll(poll: PollSettings) -> anyhow::Result<Self> {
        init_tracing();

        let server = MockServer::start().await;
        let rest = RestClient::new(&server.uri(), basic_authorization(&Secret::new(TEST_PAT.to_string())))?;
        let context = ProviderContext::new(AzdoClients::new(rest.clone(), rest), poll);

        let mut provider = Provider::new();
        provider.configure_with(context);

        Ok(Self {
            server,
            provider,
            project_id: Uuid::new_v4(),
        })
    }

    /// `/<project id>/<rest>`
    pub fn project_path(&self, rest: &str) -> String {
        format!("/{}/{}", self.project_id, rest.trim_start_matches('/'))
    }

    /// Requests the server saw for `verb` on `url_path`, in arrival order.
    pub async fn requests(&self, verb: &str, url_path: &str) -> Vec<wiremock::Request> {
        let verb: Method = verb.parse().unwrap_or(Method::GET);
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method == verb && r.url.path() == url_path)
            .collect()
    }

    /// Position of the first request matching `verb` and `url_path`.
    pub async fn position_of(&self, verb: &str, url_path: &str) -> Option<usize> {
        let verb: Method = verb.parse().ok()?;
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .position(|r| r.method == verb && r.url.path() == url_path)
    }

    /// Serve the security namespace catalog with one namespace.
    pub async fn mount_namespace(&self, namespace_id: &str, name: &str, actions: &[(&str, i32)]) {
        Mock::given(method("GET"))
            .and(path("/_apis/securitynamespaces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![security_namespace(
                namespace_id,
                name,
                actions,
            )])))
            .mount(&self.server)
            .await;
    }
}

/// `{"count": n, "value": [...]}`
pub fn list(values: Vec<Value>) -> Value {
    json!({ "count": values.len(), "value": values })
}

pub fn security_namespace(namespace_id: &str, name: &str, actions: &[(&str, i32)]) -> Value {
    let actions: Vec<Value> = actions
        .iter()
        .map(|(action, bit)| json!({ "bit": bit, "name": action, "displayName": action }))
        .collect();
    json!({ "namespaceId": namespace_id, "name": name, "actions": actions })
}

/// Body of a JSON request, `Value::Null` when it has none.
pub fn body_json(request: &wiremock::Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

/// Value of query parameter `key` on a recorded request.
pub fn query_value(request: &wiremock::Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
