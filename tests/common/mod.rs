use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use repertoire_core::{MemoryStore, StudyLibrary};
use repertoire_server::config::Config;
use repertoire_server::state::{AppState, Store};
use serde_json::Value;
use tower::ServiceExt;

/// Router over an in-memory library with no training delays.
pub fn app() -> Router {
    app_with(Config {
        auto_play_delay_ms: 0,
        next_line_delay_ms: 0,
        ..Config::default()
    })
}

pub fn app_with(config: Config) -> Router {
    let store: Store = Box::new(MemoryStore::new());
    let library = StudyLibrary::open(store).expect("Failed to open library");
    repertoire_server::app(AppState::new(config, library))
}

/// Send a request and return the status with the decoded JSON body.
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Let spawned continuation timers run.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
