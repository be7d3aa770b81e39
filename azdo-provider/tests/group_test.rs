mod common;

use common::{list, not_found, provider};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GROUP: &str = "vssgp.UmVhZGVycw";
const SCOPE: &str = "scp.ZGVtbw";

#[tokio::test]
async fn test_create_project_scoped_group() {
    let server = MockServer::start().await;
    let project_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/_apis/graph/descriptors/{project_id}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": SCOPE})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_apis/graph/groups"))
        .and(query_param("scopeDescriptor", SCOPE))
        .and(body_json(json!({"displayName": "Readers", "description": "read only"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "descriptor": GROUP,
            "displayName": "Readers",
            "principalName": "[demo]\\Readers",
            "description": "read only",
            "origin": "vsts"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let config = json!({"scope": project_id, "display_name": "Readers", "description": "read only"});
    let plan = provider.plan("azuredevops_group", None, &config).unwrap();
    let state = provider.create("azuredevops_group", plan.planned_state).await.unwrap();

    assert_eq!(state["id"], json!(GROUP));
    assert_eq!(state["principal_name"], json!("[demo]\\Readers"));
    assert_eq!(state["origin"], json!("vsts"));
}

#[tokio::test]
async fn test_update_description_sends_json_patch() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(format!("/_apis/graph/groups/{GROUP}").as_str()))
        .and(header("content-type", "application/json-patch+json"))
        .and(body_json(json!([{"op": "replace", "path": "/description", "value": "new"}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "descriptor": GROUP,
            "displayName": "Readers",
            "description": "new"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let prior = json!({"id": GROUP, "display_name": "Readers", "description": "old"});
    let config = json!({"display_name": "Readers", "description": "new"});
    let plan = provider.plan("azuredevops_group", Some(&prior), &config).unwrap();
    assert!(plan.requires_replace.is_empty());

    let state = provider
        .update("azuredevops_group", prior, plan.planned_state)
        .await
        .unwrap();
    assert_eq!(state["description"], json!("new"));
}

#[tokio::test]
async fn test_read_of_deleted_group_drops_it_from_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/_apis/graph/groups/{GROUP}").as_str()))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found("VS860012: group not found")))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let state = json!({"id": GROUP, "display_name": "Readers"});
    assert_eq!(provider.read("azuredevops_group", state).await.unwrap(), None);
}

#[tokio::test]
async fn test_two_group_sources_are_rejected_at_plan() {
    let server = MockServer::start().await;
    let provider = provider(&server);

    let config = json!({"display_name": "Readers", "mail": "readers@contoso.com"});
    let err = provider.plan("azuredevops_group", None, &config).unwrap_err();
    assert!(err.detail.contains("exactly one"), "unexpected diagnostic: {err}");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overwrite_membership_adds_and_removes() {
    let server = MockServer::start().await;
    let (keep, stale, new) = ("aad.a2VlcA", "aad.c3RhbGU", "aad.bmV3");

    Mock::given(method("GET"))
        .and(path(format!("/_apis/graph/Memberships/{GROUP}").as_str()))
        .and(query_param("direction", "down"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![
            json!({"containerDescriptor": GROUP, "memberDescriptor": keep}),
            json!({"containerDescriptor": GROUP, "memberDescriptor": stale}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/_apis/graph/memberships/{new}/{GROUP}").as_str()))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"containerDescriptor": GROUP, "memberDescriptor": new})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/_apis/graph/memberships/{stale}/{GROUP}").as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let config = json!({"group": GROUP, "mode": "overwrite", "members": [keep, new]});
    let plan = provider.plan("azuredevops_group_membership", None, &config).unwrap();
    provider
        .create("azuredevops_group_membership", plan.planned_state)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_add_membership_reads_only_configured_members() {
    let server = MockServer::start().await;
    let (mine, other) = ("aad.bWluZQ", "aad.b3RoZXI");

    Mock::given(method("GET"))
        .and(path(format!("/_apis/graph/Memberships/{GROUP}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![
            json!({"containerDescriptor": GROUP, "memberDescriptor": mine}),
            json!({"containerDescriptor": GROUP, "memberDescriptor": other}),
        ])))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let state = json!({"group": GROUP, "mode": "add", "members": [mine, "aad.Z29uZQ"]});
    let read = provider
        .read("azuredevops_group_membership", state)
        .await
        .unwrap()
        .expect("membership exists");
    assert_eq!(read["members"], json!([mine]));
}
