mod common;

use common::{list, provider};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GIT_NAMESPACE: &str = "2e9eb7ed-3c0a-47d4-87c1-0ffdd275fd87";
const CONTRIBUTORS: &str = "Microsoft.TeamFoundation.Identity;S-1-9-1551374245-1204400969-2";
const OTHER: &str = "Microsoft.TeamFoundation.Identity;S-1-9-1551374245-1204400969-3";

async fn mount_git_namespace(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/_apis/securitynamespaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![json!({
            "namespaceId": GIT_NAMESPACE,
            "name": "Git Repositories",
            "actions": [
                {"bit": 1, "name": "Administer"},
                {"bit": 2, "name": "GenericRead"},
                {"bit": 4, "name": "GenericContribute"},
                {"bit": 8, "name": "ForcePush"}
            ]
        })])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_branch_permissions_merge_into_existing_acl() {
    let server = MockServer::start().await;
    mount_git_namespace(&server).await;
    let project_id = Uuid::new_v4();
    let repository_id = Uuid::new_v4();
    // "main" as UTF-16LE hex
    let token = format!("repoV2/{project_id}/{repository_id}/refs/heads/6d00610069006e00");
    let acl_path = format!("/_apis/accesscontrollists/{GIT_NAMESPACE}");

    Mock::given(method("GET"))
        .and(path(acl_path.as_str()))
        .and(query_param("token", token.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![json!({
            "token": token,
            "inheritPermissions": true,
            "acesDictionary": {
                CONTRIBUTORS: {"descriptor": CONTRIBUTORS, "allow": 4, "deny": 0},
                OTHER: {"descriptor": OTHER, "allow": 2, "deny": 8}
            }
        })])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(acl_path.as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let config = json!({
        "project_id": project_id,
        "repository_id": repository_id,
        "branch_name": "refs/heads/main",
        "principal": CONTRIBUTORS,
        "replace": false,
        "permissions": {"GenericRead": "allow", "ForcePush": "deny"}
    });
    let plan = provider.plan("azuredevops_git_permissions", None, &config).unwrap();
    let state = provider
        .create("azuredevops_git_permissions", plan.planned_state)
        .await
        .unwrap();
    assert_eq!(state["id"], json!(token));

    let requests = server.received_requests().await.unwrap();
    let posted = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .expect("ACL was written");
    let body: serde_json::Value = serde_json::from_slice(&posted.body).unwrap();
    let aces = &body["value"][0]["acesDictionary"];

    // Existing GenericContribute bit is kept, the other identity is untouched.
    assert_eq!(aces[CONTRIBUTORS]["allow"], json!(6));
    assert_eq!(aces[CONTRIBUTORS]["deny"], json!(8));
    assert_eq!(aces[OTHER]["allow"], json!(2));
    assert_eq!(aces[OTHER]["deny"], json!(8));
}

#[tokio::test]
async fn test_read_without_entry_reports_notset() {
    let server = MockServer::start().await;
    mount_git_namespace(&server).await;
    let project_id = Uuid::new_v4();
    let token = format!("repoV2/{project_id}");

    Mock::given(method("GET"))
        .and(path(format!("/_apis/accesscontrollists/{GIT_NAMESPACE}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![json!({
            "token": token,
            "inheritPermissions": true,
            "acesDictionary": {
                OTHER: {"descriptor": OTHER, "allow": 2, "deny": 0}
            }
        })])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_apis/identities"))
        .and(query_param("descriptors", OTHER))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![json!({
            "descriptor": OTHER,
            "providerDisplayName": "[demo]\\Readers",
            "isContainer": true
        })])))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let state = json!({
        "id": token,
        "project_id": project_id,
        "principal": CONTRIBUTORS,
        "identity_descriptor": CONTRIBUTORS,
        "permissions": {"GenericRead": "allow"}
    });
    let read = provider
        .read("azuredevops_git_permissions", state)
        .await
        .unwrap()
        .expect("token still has an ACL");
    assert_eq!(read["permissions"], json!({"GenericRead": "notset"}));
}

#[tokio::test]
async fn test_branch_without_repository_is_rejected() {
    let server = MockServer::start().await;
    let provider = provider(&server);

    let config = json!({
        "project_id": Uuid::new_v4(),
        "branch_name": "main",
        "principal": CONTRIBUTORS,
        "permissions": {"GenericRead": "allow"}
    });
    let plan = provider.plan("azuredevops_git_permissions", None, &config).unwrap();
    let err = provider
        .create("azuredevops_git_permissions", plan.planned_state)
        .await
        .unwrap_err();
    assert!(err.detail.contains("repository"), "unexpected diagnostic: {err}");
}

async fn delete_answering(removed: bool) -> Result<(), azdo_provider::Diagnostic> {
    let server = MockServer::start().await;
    let project_id = Uuid::new_v4();
    let token = format!("repoV2/{project_id}");

    Mock::given(method("DELETE"))
        .and(path(format!("/_apis/accesscontrolentries/{GIT_NAMESPACE}").as_str()))
        .and(query_param("token", token.as_str()))
        .and(query_param("descriptors", CONTRIBUTORS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(removed)))
        .expect(1)
        .mount(&server)
        .await;

    let state = json!({
        "id": token,
        "project_id": project_id,
        "principal": CONTRIBUTORS,
        "identity_descriptor": CONTRIBUTORS,
        "permissions": {"GenericRead": "allow"}
    });
    provider(&server).delete("azuredevops_git_permissions", state).await
}

#[tokio::test]
async fn test_delete_removes_the_principal_entry() {
    delete_answering(true).await.unwrap();
}

#[tokio::test]
async fn test_delete_of_already_removed_entry_succeeds() {
    delete_answering(false).await.unwrap();
}
