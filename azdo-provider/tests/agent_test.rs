mod common;

use common::provider;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_queue_takes_pool_name_and_authorizes_pipelines() {
    let server = MockServer::start().await;
    let project_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/_apis/distributedtask/pools/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4,
            "name": "linux",
            "poolType": "automation"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/{project_id}/_apis/distributedtask/queues").as_str()))
        .and(query_param("authorizePipelines", "false"))
        .and(body_partial_json(json!({"name": "linux", "pool": {"id": 4}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12,
            "name": "linux",
            "pool": {"id": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/{project_id}/_apis/pipelines/pipelinepermissions/queue/12").as_str()))
        .and(body_partial_json(json!({"allPipelines": {"authorized": true}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"allPipelines": {"authorized": true}})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let config = json!({"project_id": project_id, "agent_pool_id": 4});
    let plan = provider.plan("azuredevops_agent_queue", None, &config).unwrap();
    let state = provider
        .create("azuredevops_agent_queue", plan.planned_state)
        .await
        .unwrap();

    assert_eq!(state["id"], json!(12));
    assert_eq!(state["name"], json!("linux"));
}

#[tokio::test]
async fn test_changing_pool_type_requires_replacement() {
    let server = MockServer::start().await;
    let provider = provider(&server);

    let prior = json!({"id": 4, "name": "linux", "pool_type": "automation", "auto_provision": false, "auto_update": true});
    let config = json!({"name": "linux", "pool_type": "deployment"});
    let plan = provider.plan("azuredevops_agent_pool", Some(&prior), &config).unwrap();

    assert_eq!(plan.requires_replace, vec!["pool_type".to_string()]);
    assert!(plan.has_changes);
}
