mod common;

use common::{list, not_found, provider};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENVIRONMENT_NAMESPACE: &str = "83d4c2e6-e57d-4d6e-892b-b87222b7ad20";
const READERS: &str = "Microsoft.TeamFoundation.Identity;S-1-9-1551374245-3746625429-1";

#[tokio::test]
async fn test_create_environment_authorizes_pipelines() {
    let server = MockServer::start().await;
    let project_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(format!("/{project_id}/_apis/distributedtask/environments").as_str()))
        .and(body_json(json!({"name": "staging", "description": ""})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "name": "staging",
            "description": "",
            "project": {"id": project_id}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/{project_id}/_apis/pipelines/pipelinepermissions/environment/7").as_str()))
        .and(body_partial_json(json!({
            "resource": {"type": "environment", "id": "7"},
            "allPipelines": {"authorized": true}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"allPipelines": {"authorized": true}})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let config = json!({"project_id": project_id, "name": "staging"});
    let plan = provider.plan("azuredevops_environment", None, &config).unwrap();
    let state = provider
        .create("azuredevops_environment", plan.planned_state)
        .await
        .unwrap();

    assert_eq!(state["id"], json!(7));
    assert_eq!(state["name"], json!("staging"));
}

#[tokio::test]
async fn test_deleted_environment_reads_as_gone() {
    let server = MockServer::start().await;
    let project_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/{project_id}/_apis/distributedtask/environments/7").as_str()))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found("Environment 7 not found")))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let state = json!({"id": 7, "project_id": project_id, "name": "staging", "description": ""});
    assert_eq!(provider.read("azuredevops_environment", state).await.unwrap(), None);
}

#[tokio::test]
async fn test_environment_permissions_write_entries_without_merge() {
    let server = MockServer::start().await;
    let project_id = Uuid::new_v4();
    let token = format!("Environments/{project_id}/7");

    Mock::given(method("GET"))
        .and(path("/_apis/securitynamespaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![json!({
            "namespaceId": ENVIRONMENT_NAMESPACE,
            "name": "Environment",
            "actions": [
                {"bit": 1, "name": "View", "displayName": "View environment"},
                {"bit": 2, "name": "Manage", "displayName": "Manage environment"},
                {"bit": 4, "name": "ManageHistory", "displayName": "Manage history"},
                {"bit": 8, "name": "Administer", "displayName": "Administer"},
                {"bit": 16, "name": "Use", "displayName": "Use environment"},
                {"bit": 32, "name": "Create", "displayName": "Create environment"}
            ]
        })])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/_apis/accesscontrollists/{ENVIRONMENT_NAMESPACE}").as_str()))
        .and(query_param("token", token.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/_apis/accesscontrolentries/{ENVIRONMENT_NAMESPACE}").as_str()))
        .and(body_partial_json(json!({
            "token": token,
            "merge": false,
            "accessControlEntries": [{"descriptor": READERS, "allow": 17, "deny": 8}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let config = json!({
        "project_id": project_id,
        "environment_id": 7,
        "principal": READERS,
        "permissions": {"View": "allow", "Use": "allow", "Administer": "deny"}
    });
    let plan = provider.plan("azuredevops_environment_permissions", None, &config).unwrap();
    let state = provider
        .create("azuredevops_environment_permissions", plan.planned_state)
        .await
        .unwrap();

    assert_eq!(state["id"], json!(token));
    assert_eq!(state["identity_descriptor"], json!(READERS));
}
