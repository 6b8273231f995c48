//! Integration tests for the users sync against a mock director.

use fleet_nats_sync::auth_config::certificate_subject;
use fleet_nats_sync::config::DirectorConfig;
use fleet_nats_sync::{SyncError, UsersSync};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VMS: &str = r#"[
  {"agent_id": "fef068d8-bbdd-46ff-b4a5-bf0838f918d9", "cid": "vm-1", "job": "debug", "index": 0, "id": "9cb7120d-d817-40f5-9410-d2b6f01ba746"},
  {"agent_id": "c5e7c705-459e-41c0-b640-db32d8dc6e71", "cid": "vm-2", "job": "debug", "index": 0, "id": "209b96c8-e482-43c7-9f3e-04de9f93c535"},
  {"agent_id": null, "cid": null, "job": "debug", "index": 1, "id": "3a1b"}
]"#;

fn basic_director(url: String) -> DirectorConfig {
    DirectorConfig {
        url,
        user: Some("admin".to_string()),
        password: Some("admin".to_string()),
        ..DirectorConfig::default()
    }
}

async fn mount_info(server: &MockServer, info: Value) {
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(info))
        .mount(server)
        .await;
}

async fn read_users(path: &std::path::Path) -> Vec<String> {
    let contents = tokio::fs::read_to_string(path).await.unwrap();
    let document: Value = serde_json::from_str(&contents).unwrap();
    document["authorization"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["user"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_no_deployments_writes_fixed_users() {
    let server = MockServer::start().await;
    mount_info(&server, json!({ "user_authentication": { "type": "basic" } })).await;
    Mock::given(method("GET"))
        .and(path("/deployments"))
        .and(header("Authorization", "Basic YWRtaW46YWRtaW4="))
        .respond_with(ResponseTemplate::new(200).set_body_raw("[]", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("nats").join("auth.json");
    let agents = UsersSync::new(basic_director(server.uri()), &config_path)
        .execute_users_sync()
        .await
        .unwrap();

    assert!(agents.is_empty());
    assert_eq!(
        read_users(&config_path).await,
        vec![
            certificate_subject("default.director"),
            certificate_subject("default.hm"),
        ]
    );
}

#[tokio::test]
async fn test_writes_one_user_per_agent() {
    let server = MockServer::start().await;
    mount_info(&server, json!({ "user_authentication": { "type": "basic" } })).await;
    Mock::given(method("GET"))
        .and(path("/deployments"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "name": "deployment-1", "releases": [] }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/deployments/deployment-1/vms"))
        .and(header("Authorization", "Basic YWRtaW46YWRtaW4="))
        .respond_with(ResponseTemplate::new(200).set_body_raw(VMS, "application/json"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("auth.json");
    let agents = UsersSync::new(basic_director(server.uri()), &config_path)
        .execute_users_sync()
        .await
        .unwrap();

    assert_eq!(
        agents,
        vec![
            "fef068d8-bbdd-46ff-b4a5-bf0838f918d9",
            "c5e7c705-459e-41c0-b640-db32d8dc6e71",
        ]
    );
    let users = read_users(&config_path).await;
    assert_eq!(users.len(), 4);
    assert!(users.contains(&certificate_subject(
        "fef068d8-bbdd-46ff-b4a5-bf0838f918d9.agent"
    )));
    // Instance ids are not agent ids.
    assert!(!users.contains(&certificate_subject(
        "9cb7120d-d817-40f5-9410-d2b6f01ba746.agent"
    )));
}

#[tokio::test]
async fn test_uaa_token_is_used_as_header() {
    let server = MockServer::start().await;
    mount_info(
        &server,
        json!({
            "user_authentication": {
                "type": "uaa",
                "options": { "url": server.uri(), "urls": [server.uri()] }
            }
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "xyz",
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/deployments"))
        .and(header("Authorization", "bearer xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("[]", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let director = DirectorConfig {
        url: server.uri(),
        client_id: Some("client_id".to_string()),
        client_secret: Some("client_secret".to_string()),
        ..DirectorConfig::default()
    };
    let dir = tempfile::tempdir().unwrap();
    UsersSync::new(director, dir.path().join("auth.json"))
        .execute_users_sync()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_request_leaves_file_untouched() {
    let server = MockServer::start().await;
    mount_info(&server, json!({ "user_authentication": { "type": "basic" } })).await;
    Mock::given(method("GET"))
        .and(path("/deployments"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Not authorized"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("auth.json");
    tokio::fs::write(&config_path, "previous").await.unwrap();

    let err = UsersSync::new(basic_director(server.uri()), &config_path)
        .execute_users_sync()
        .await
        .unwrap_err();

    match err {
        SyncError::Status {
            endpoint,
            status,
            body,
        } => {
            assert_eq!(endpoint, "/deployments");
            assert_eq!(status, 401);
            assert_eq!(body, "Not authorized");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        tokio::fs::read_to_string(&config_path).await.unwrap(),
        "previous"
    );
}
