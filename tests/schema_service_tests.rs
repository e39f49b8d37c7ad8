use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
};
use pgsteward::StewardError;
use pgsteward::auth::StaticToken;
use pgsteward::config::{EndpointsConfig, RetryConfig};
use pgsteward::migrate::{DataConnectClient, SchemaService, UpsertOutcome};
use pgsteward_schema::Schema;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::net::TcpListener;
use url::Url;

#[derive(Clone, Default)]
struct MockState {
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
    polls: Arc<AtomicUsize>,
}

async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{}", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

fn bad_request(details: Value) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": {
                "code": 400,
                "message": "schema rejected",
                "status": "FAILED_PRECONDITION",
                "details": details
            }
        })),
    )
}

async fn upsert_handler(
    State(state): State<MockState>,
    Path((_project, _location, service)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.queries.lock().unwrap().push(query);
    state.bodies.lock().unwrap().push(body);
    match service.as_str() {
        "svc-incompatible" => bad_request(json!([
            {
                "@type": "type.googleapis.com/google.firebase.dataconnect.v1.IncompatibleSqlSchemaError",
                "violationType": "INCOMPATIBLE_SCHEMA",
                "diffs": [
                    { "description": "create table t", "sql": "CREATE TABLE t (a int)" },
                    { "description": "drop column b", "destructive": true, "sql": "ALTER TABLE u DROP COLUMN b" }
                ]
            },
            {
                "@type": "type.googleapis.com/google.rpc.PreconditionFailure",
                "violations": [{
                    "type": "INCOMPATIBLE_CONNECTOR",
                    "subject": "projects/p/locations/l/services/svc-incompatible/connectors/c1"
                }]
            }
        ])),
        "svc-graphql" => bad_request(json!([{
            "@type": "type.googleapis.com/google.firebase.dataconnect.v1.GraphqlError",
            "message": "unknown type Foo",
            "path": ["schema.gql"]
        }])),
        "svc-opaque" => bad_request(json!([])),
        _ => (
            StatusCode::OK,
            Json(json!({ "name": "projects/p/locations/l/operations/op-1", "done": false })),
        ),
    }
}

async fn operation_handler(
    State(state): State<MockState>,
    Path((_project, _location, op)): Path<(String, String, String)>,
) -> (StatusCode, Json<Value>) {
    let polls = state.polls.fetch_add(1, Ordering::SeqCst);
    let name = format!("projects/p/locations/l/operations/{op}");
    if op == "op-broken" {
        return (
            StatusCode::OK,
            Json(json!({ "name": name, "done": true, "error": { "code": 9, "message": "connector in use" } })),
        );
    }
    (StatusCode::OK, Json(json!({ "name": name, "done": polls > 0 })))
}

async fn delete_handler(
    State(state): State<MockState>,
    Path((_project, _location, _service, connector)): Path<(String, String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.queries.lock().unwrap().push(query);
    let op = if connector == "broken" { "op-broken" } else { "op-2" };
    (
        StatusCode::OK,
        Json(json!({ "name": format!("projects/p/locations/l/operations/{op}"), "done": false })),
    )
}

async fn setup() -> (DataConnectClient, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route(
            "/dc/v1/projects/{project}/locations/{location}/services/{service}/schemas/main",
            patch(upsert_handler),
        )
        .route(
            "/dc/v1/projects/{project}/locations/{location}/operations/{op}",
            get(operation_handler),
        )
        .route(
            "/dc/v1/projects/{project}/locations/{location}/services/{service}/connectors/{connector}",
            delete(delete_handler),
        )
        .with_state(state.clone());
    let base = spawn_test_server(app).await;

    let endpoints = EndpointsConfig {
        dataconnect: base.join("/dc/v1/").unwrap(),
        ..Default::default()
    };
    let retry = RetryConfig {
        poll_interval_ms: 5,
        max_polls: 5,
        ..Default::default()
    };
    let client = DataConnectClient::new(
        reqwest::Client::new(),
        Arc::new(StaticToken::new("test-token")),
        &endpoints,
        &retry,
    );
    (client, state)
}

fn schema(service: &str) -> Schema {
    serde_json::from_value(json!({
        "name": format!("projects/p/locations/l/services/{service}/schemas/main"),
        "source": { "files": [{ "path": "schema.gql", "content": "type T @table { a: Int }" }] },
        "datasources": [{
            "postgresql": {
                "database": "orders",
                "schemaValidation": "STRICT",
                "cloudSql": { "instance": "projects/p/locations/l/instances/inst" }
            }
        }]
    }))
    .unwrap()
}

#[tokio::test]
async fn validate_only_upsert_is_accepted_without_polling() {
    let (client, state) = setup().await;

    let outcome = client.upsert_schema(&schema("svc-ok"), true).await.unwrap();

    assert!(matches!(outcome, UpsertOutcome::Accepted));
    assert_eq!(state.polls.load(Ordering::SeqCst), 0);
    let query = state.queries.lock().unwrap()[0].clone();
    assert_eq!(query.get("validate_only").map(String::as_str), Some("true"));
    assert_eq!(query.get("allow_missing").map(String::as_str), Some("true"));
    let body = state.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["datasources"][0]["postgresql"]["schemaValidation"], "STRICT");
}

#[tokio::test]
async fn deploy_upsert_waits_for_the_operation() {
    let (client, state) = setup().await;

    let outcome = client.upsert_schema(&schema("svc-ok"), false).await.unwrap();

    assert!(matches!(outcome, UpsertOutcome::Accepted));
    assert_eq!(state.polls.load(Ordering::SeqCst), 2);
    let query = state.queries.lock().unwrap()[0].clone();
    assert_eq!(query.get("validate_only").map(String::as_str), Some("false"));
}

#[tokio::test]
async fn started_upsert_does_not_poll() {
    let (client, state) = setup().await;
    let mut pending = schema("svc-ok");
    pending.set_validation(None);
    pending.set_migration(Some(pgsteward_schema::MIGRATE_COMPATIBLE));

    let outcome = client.start_schema_upsert(&pending, false).await.unwrap();

    assert!(matches!(outcome, UpsertOutcome::Accepted));
    assert_eq!(state.polls.load(Ordering::SeqCst), 0);
    let body = state.bodies.lock().unwrap()[0].clone();
    let pg = &body["datasources"][0]["postgresql"];
    assert_eq!(pg["schemaMigration"], "MIGRATE_COMPATIBLE");
    assert!(pg.get("schemaValidation").is_none());
}

#[tokio::test]
async fn incompatibility_is_returned_as_rejection() {
    let (client, _state) = setup().await;

    let outcome = client
        .upsert_schema(&schema("svc-incompatible"), true)
        .await
        .unwrap();

    let UpsertOutcome::Rejected(rejection) = outcome else {
        panic!("expected a rejection");
    };
    let incompatible = rejection.incompatible.expect("incompatibility detail");
    assert_eq!(incompatible.diffs.len(), 2);
    assert!(incompatible.is_destructive());
    assert_eq!(
        rejection.invalid_connectors,
        vec!["projects/p/locations/l/services/svc-incompatible/connectors/c1"]
    );
}

#[tokio::test]
async fn graphql_errors_become_invalid_schema() {
    let (client, _state) = setup().await;

    let err = client
        .upsert_schema(&schema("svc-graphql"), true)
        .await
        .err()
        .expect("graphql errors fail the upsert");

    match err {
        StewardError::InvalidSchema(message) => {
            assert!(message.contains("schema.gql: unknown type Foo"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn opaque_bad_request_is_an_upstream_error() {
    let (client, _state) = setup().await;

    let err = client
        .upsert_schema(&schema("svc-opaque"), true)
        .await
        .err()
        .expect("bad request fails the upsert");

    assert!(matches!(
        err,
        StewardError::Upstream { ref message, .. } if message == "schema rejected"
    ));
}

#[tokio::test]
async fn delete_connector_forces_and_waits() {
    let (client, state) = setup().await;

    client
        .delete_connector("projects/p/locations/l/services/svc/connectors/c1")
        .await
        .unwrap();

    let query = state.queries.lock().unwrap()[0].clone();
    assert_eq!(query.get("force").map(String::as_str), Some("true"));
    assert_eq!(state.polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_connector_deletion_reports_the_operation_error() {
    let (client, _state) = setup().await;

    let err = client
        .delete_connector("projects/p/locations/l/services/svc/connectors/broken")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StewardError::OperationFailed { ref message, .. } if message == "connector in use"
    ));
}
