//! HTTP transport tests against a local mock server

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use deploy_api::CreateDeploymentBody;
use deployctl::app::options::{ApiOptions, ProcessOptions};
use deployctl::deploy::api::DeploymentApi;
use deployctl::deploy::{process_deployment, DeployContext, DeploymentOutcome, DeploymentRequest};
use deployctl::errors::ClientError;
use deployctl::files::content_hash;
use deployctl::status::SilentStatus;
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::mock_api::{deployment_json, happy_path, log_line, tree};

#[derive(Default)]
struct ServerState {
    creation: Vec<String>,
    bodies: Mutex<Vec<CreateDeploymentBody>>,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    authorization: Mutex<Vec<String>>,
    teams: Mutex<Vec<String>>,
    log_queries: Mutex<Vec<HashMap<String, String>>>,
}

impl ServerState {
    fn observe(&self, headers: &HeaderMap, query: &HashMap<String, String>) {
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.authorization.lock().unwrap().push(auth.to_string());
        }
        if let Some(team) = query.get("teamId") {
            self.teams.lock().unwrap().push(team.clone());
        }
    }
}

async fn create_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<CreateDeploymentBody>,
) -> String {
    state.observe(&headers, &query);
    state.bodies.lock().unwrap().push(body);
    state.creation.join("\n") + "\n"
}

async fn upload_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Json<Value> {
    state.observe(&headers, &query);
    let digest = headers
        .get("x-content-digest")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.uploads.lock().unwrap().push((digest, body.to_vec()));
    Json(json!({}))
}

async fn logs_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Vec<u8> {
    state.log_queries.lock().unwrap().push(query);
    let mut body = format!("{}\n", log_line("1", "Installing")).into_bytes();
    if id == "dpl_corrupt" {
        body.extend_from_slice(b"{\"id\":\"2\",\"type\":\"stdout\",\"created\":1,\"text\":\"ok\xff\"}\n");
    }
    body.extend_from_slice(format!("{}\n", log_line("3", "Done")).as_bytes());
    body
}

async fn deployment_handler(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if id == "dpl_1" {
        (StatusCode::OK, Json(deployment_json("READY")))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "code": "not_found", "message": "no such deployment" } })),
        )
    }
}

async fn serve(state: Arc<ServerState>) -> String {
    let app = Router::new()
        .route("/v13/deployments", post(create_handler))
        .route("/v13/deployments/{id}", get(deployment_handler))
        .route("/v2/files", post(upload_handler))
        .route("/v3/deployments/{id}/events", get(logs_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: String, team_id: Option<&str>) -> deployctl::http::HttpClient {
    let options = ApiOptions {
        base_url,
        team_id: team_id.map(str::to_string),
        ..Default::default()
    };
    deployctl::http::HttpClient::new(&options, SecretString::from("secret-token".to_string())).unwrap()
}

#[tokio::test]
async fn test_deployment_over_http() {
    let (_dir, content) = tree(&[("index.html", "<h1>hi</h1>"), ("copy.html", "<h1>hi</h1>")]);
    let hash = content_hash(b"<h1>hi</h1>");
    let state = Arc::new(ServerState {
        creation: happy_path(&[hash.as_str()], 1),
        ..Default::default()
    });
    let base_url = serve(state.clone()).await;

    let ctx = DeployContext::new(Arc::new(client(base_url, Some("team_1"))), Arc::new(SilentStatus));
    let outcome = process_deployment(
        &ctx,
        DeploymentRequest::new("site"),
        Arc::new(content),
        &ProcessOptions::default(),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, DeploymentOutcome::Ready { .. }));

    let uploads = state.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, hash);
    assert_eq!(uploads[0].1, b"<h1>hi</h1>".to_vec());

    let bodies = state.bodies.lock().unwrap();
    assert_eq!(bodies[0].files.len(), 1);
    assert_eq!(bodies[0].files[0].names, vec!["copy.html", "index.html"]);

    let authorization = state.authorization.lock().unwrap();
    assert!(authorization.iter().all(|a| a == "Bearer secret-token"));
    assert_eq!(authorization.len(), 2);
    assert_eq!(*state.teams.lock().unwrap(), vec!["team_1", "team_1"]);
}

#[tokio::test]
async fn test_log_query_parameters() {
    let state = Arc::new(ServerState::default());
    let api = client(serve(state.clone()).await, None);

    let subscriber = deployctl::build_logs::BuildLogSubscriber::new(Arc::new(api));
    let entries = subscriber
        .fetch("dpl_1", deployctl::deploy::api::LogDirection::Backward)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);

    let queries = state.log_queries.lock().unwrap();
    assert_eq!(queries[0].get("direction").map(String::as_str), Some("backward"));
    assert_eq!(queries[0].get("follow").map(String::as_str), Some("0"));
    assert_eq!(queries[0].get("format").map(String::as_str), Some("lines"));
}

#[tokio::test]
async fn test_invalid_utf8_log_line_ends_the_subscription() {
    let state = Arc::new(ServerState::default());
    let api = client(serve(state).await, None);

    let subscriber = deployctl::build_logs::BuildLogSubscriber::new(Arc::new(api));
    let mut subscription = subscriber
        .subscribe(
            "dpl_corrupt",
            deployctl::deploy::api::LogQuery::default(),
            tokio_util::sync::CancellationToken::new(),
        )
        .await
        .unwrap();

    let first = subscription.next().await.unwrap().unwrap();
    assert_eq!(first.text.as_deref(), Some("Installing"));
    assert!(matches!(subscription.next().await, Some(Err(ClientError::LogStream(_)))));
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn test_error_responses_map_to_api_errors() {
    let state = Arc::new(ServerState::default());
    let api = client(serve(state).await, None);

    let deployment = api.get_deployment("dpl_1").await.unwrap();
    assert_eq!(deployment.id, "dpl_1");

    match api.get_deployment("dpl_404").await {
        Err(ClientError::Api { status, code, .. }) => {
            assert_eq!(status, 404);
            assert_eq!(code, "not_found");
        }
        other => panic!("unexpected result {:?}", other.map(|d| d.id)),
    }
}
