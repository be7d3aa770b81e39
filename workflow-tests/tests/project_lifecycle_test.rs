//! Project creation through the asynchronous operation API, followed by
//! feature toggles on the new project.

mod common;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};
use workflow_tests::list;

const AGILE: &str = "adcc42ab-9882-485e-a3ed-7678f01f66bc";

/// Flow: resolve process → POST project → poll operation → GET project →
/// disable test plans → read features back.
#[tokio::test]
async fn create_project_then_disable_testplans() {
    let ctx = common::setup().await;
    let operation_id = Uuid::new_v4();
    let project_id = ctx.project_id;

    Mock::given(method("GET"))
        .and(path("/_apis/process/processes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![
            json!({"id": AGILE, "name": "Agile", "isDefault": true}),
            json!({"id": Uuid::new_v4(), "name": "Scrum", "isDefault": false}),
        ])))
        .mount(&ctx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/_apis/projects"))
        .and(body_partial_json(json!({
            "name": "demo",
            "visibility": "private",
            "capabilities": {
                "processTemplate": {"templateTypeId": AGILE},
                "versioncontrol": {"sourceControlType": "Git"}
            }
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": operation_id, "status": "queued"})))
        .expect(1)
        .mount(&ctx.server)
        .await;

    let operation_path = format!("/_apis/operations/{operation_id}");
    Mock::given(method("GET"))
        .and(path(operation_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": operation_id, "status": "inProgress"})))
        .up_to_n_times(2)
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path(operation_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": operation_id, "status": "succeeded"})))
        .mount(&ctx.server)
        .await;

    let project = json!({
        "id": project_id,
        "name": "demo",
        "description": "",
        "visibility": "private",
        "state": "wellFormed",
        "capabilities": {
            "processTemplate": {"templateTypeId": AGILE, "templateName": "Agile"},
            "versioncontrol": {"sourceControlType": "Git"}
        }
    });
    Mock::given(method("GET"))
        .and(path("/_apis/projects/demo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(project.clone()))
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/_apis/projects/{project_id}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(project))
        .mount(&ctx.server)
        .await;

    // 1. Create the project
    let config = json!({"name": "demo", "work_item_template": "Agile"});
    let plan = ctx.provider.plan("azuredevops_project", None, &config).unwrap();
    assert!(plan.has_changes);

    let state = ctx
        .provider
        .create("azuredevops_project", plan.planned_state)
        .await
        .expect("project create failed");
    assert_eq!(state["id"], json!(project_id));
    assert_eq!(state["process_template_id"], json!(AGILE));
    assert_eq!(ctx.requests("GET", &operation_path).await.len(), 3);

    // 2. Disable test plans
    let feature_path = format!(
        "/_apis/FeatureManagement/FeatureStates/host/project/{project_id}/ms.vss-test-web.test"
    );
    Mock::given(method("PATCH"))
        .and(path(feature_path.as_str()))
        .and(body_partial_json(json!({"featureId": "ms.vss-test-web.test", "state": "disabled"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"featureId": "ms.vss-test-web.test", "state": "disabled"})),
        )
        .expect(1)
        .mount(&ctx.server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/_apis/FeatureManagement/FeatureStatesQuery/host/project/{project_id}").as_str()))
        .and(body_partial_json(json!({"scopeValues": {"project": project_id}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "featureIds": [],
            "featureStates": {
                "ms.vss-work.agile": {"featureId": "ms.vss-work.agile", "state": "enabled"},
                "ms.vss-test-web.test": {"featureId": "ms.vss-test-web.test", "state": "disabled"}
            },
            "scopeValues": {"project": project_id}
        })))
        .mount(&ctx.server)
        .await;

    let features = json!({"project_id": project_id, "testplans": "disabled"});
    let plan = ctx.provider.plan("azuredevops_project_features", None, &features).unwrap();
    let created = ctx
        .provider
        .create("azuredevops_project_features", plan.planned_state)
        .await
        .expect("feature update failed");
    assert_eq!(created["testplans"], json!("disabled"));
    assert_eq!(created["boards"], serde_json::Value::Null);

    // 3. Read both back
    let read = ctx
        .provider
        .read("azuredevops_project_features", created)
        .await
        .unwrap()
        .expect("features exist");
    assert_eq!(read["testplans"], json!("disabled"));

    let project_state = ctx
        .provider
        .read("azuredevops_project", state)
        .await
        .unwrap()
        .expect("project exists");
    assert_eq!(project_state["name"], json!("demo"));
    assert_eq!(project_state["work_item_template"], json!("Agile"));
}

/// A failed operation surfaces as an error and nothing is read back.
#[tokio::test]
async fn failed_project_operation_is_an_error() {
    let ctx = common::setup().await;
    let operation_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/_apis/projects"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": operation_id, "status": "queued"})))
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/_apis/operations/{operation_id}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": operation_id,
            "status": "failed",
            "resultMessage": "TF200019: project name already in use"
        })))
        .mount(&ctx.server)
        .await;

    let config = json!({"name": "demo", "process_template_id": AGILE});
    let plan = ctx.provider.plan("azuredevops_project", None, &config).unwrap();
    let err = ctx
        .provider
        .create("azuredevops_project", plan.planned_state)
        .await
        .unwrap_err();

    assert!(err.detail.contains("failed"), "unexpected diagnostic: {err}");
    assert!(ctx.requests("GET", "/_apis/projects/demo").await.is_empty());
}
