//! Router tests for the HTTP service, driven in-process with `oneshot`.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{app, app_with, send, settle};
use repertoire_server::config::Config;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

async fn create_study(app: &axum::Router, name: &str) -> String {
    let (status, body) = send(app, "POST", "/api/studies", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

async fn import(app: &axum::Router, study_id: &str, pgn: &str, orientation: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        &format!("/api/studies/{study_id}/import"),
        Some(json!({ "pgn": pgn, "orientation": orientation })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["imports"][0].clone()
}

fn query_fen(fen: &str) -> String {
    fen.replace(' ', "%20")
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_study_crud() {
    let app = app();
    let id = create_study(&app, "Sicilian").await;

    let (status, body) = send(&app, "GET", "/api/studies", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Sicilian");
    assert_eq!(body[0]["chapter_count"], 0);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/studies/{id}"),
        Some(json!({ "name": "Najdorf" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Najdorf");

    let (status, body) = send(&app, "POST", "/api/studies", Some(json!({ "name": " " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("name"));

    let (status, _) = send(&app, "DELETE", &format!("/api/studies/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", &format!("/api/studies/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().starts_with("Study not found"));
}

#[tokio::test]
async fn test_chapter_editing() {
    let app = app();
    let study = create_study(&app, "Italian").await;

    let (status, chapter) = send(
        &app,
        "POST",
        &format!("/api/studies/{study}/chapters"),
        Some(json!({ "name": "Giuoco Piano" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chapter["orientation"], "white");
    let chapter = chapter["id"].as_str().unwrap().to_string();
    let moves = format!("/api/studies/{study}/chapters/{chapter}/moves");

    let (status, body) = send(&app, "POST", &moves, Some(json!({ "from": "e2", "to": "e4" }))).await;
    assert_eq!(status, StatusCode::OK);
    let e4 = body["result"].as_str().unwrap().to_string();
    assert_eq!(body["chapter"]["game"]["rootNodes"][0]["move"]["san"], "e4");

    let (_, body) = send(&app, "POST", &moves, Some(json!({ "parent_id": e4, "san": "e5" }))).await;
    let e5 = body["result"].as_str().unwrap().to_string();
    let (_, body) = send(&app, "POST", &moves, Some(json!({ "parent_id": e4, "san": "c5" }))).await;
    let c5 = body["result"].as_str().unwrap().to_string();
    send(&app, "POST", &moves, Some(json!({ "parent_id": e5, "san": "Nf3" }))).await;

    let (status, body) = send(&app, "POST", &moves, Some(json!({ "parent_id": e4, "san": "Ke2" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, _) = send(&app, "POST", &moves, Some(json!({ "parent_id": e4 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/studies/{study}/chapters/{chapter}/nodes/{c5}/promote"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let children = &body["chapter"]["game"]["rootNodes"][0]["children"];
    assert_eq!(children[1]["isMainLine"], true);
    assert_eq!(children[0]["isMainLine"], false);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/studies/{study}/chapters/{chapter}/nodes/{c5}/comment"),
        Some(json!({ "comment": "Sicilian" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["chapter"]["game"]["rootNodes"][0]["children"][1]["comment"],
        "Sicilian"
    );

    let (status, body) = send(&app, "GET", &format!("/api/studies/{study}/lines"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total"], 2);
    assert_eq!(body["lines"][0]["preview"], "1. e4 e5 2. Nf3");
    assert_eq!(body["lines"][1]["depth"], 2);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/studies/{study}/chapters/{chapter}/nodes/{e5}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], 2);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/studies/{study}/chapters/{chapter}/nodes/{e5}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/studies/{study}/chapters/{chapter}/clear-variations"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let root = &body["chapter"]["game"]["rootNodes"][0];
    assert!(root["children"][0].get("comment").is_none());
}

#[tokio::test]
async fn test_chapter_update_and_reorder() {
    let app = app();
    let study = create_study(&app, "Repertoire").await;
    let mut ids = Vec::new();
    for name in ["A", "B"] {
        let (_, body) = send(
            &app,
            "POST",
            &format!("/api/studies/{study}/chapters"),
            Some(json!({ "name": name, "orientation": "black" })),
        )
        .await;
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/studies/{study}/chapters/order"),
        Some(json!({ "chapter_ids": [ids[1], ids[0]] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chapter_ids"], json!([ids[1], ids[0]]));

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/studies/{study}/chapters/{}", ids[0]),
        Some(json!({ "name": "Renamed", "orientation": "white" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["orientation"], "white");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/studies/{study}/chapters"),
        Some(json!({ "name": "Bad", "initial_fen": "not a fen" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_import_reports_errors_and_warnings() {
    let app = app();
    let study = create_study(&app, "Imports").await;
    let summary = import(
        &app,
        &study,
        "[White \"Anderssen\"]\n[Black \"Kieseritzky\"]\n\n1. e4 (1. d4 d5) 1... e5 2. f4 $1 exf4 3. Ke3 1-0",
        "white",
    )
    .await;
    assert_eq!(summary["chapterName"], "Anderssen vs Kieseritzky");
    assert_eq!(summary["nodeCount"], 6);
    assert_eq!(summary["errors"].as_array().unwrap().len(), 1);
    assert!(!summary["warnings"].as_array().unwrap().is_empty());

    let chapter = summary["chapterId"].as_str().unwrap();
    let (_, body) = send(&app, "GET", &format!("/api/studies/{study}/chapters/{chapter}"), None).await;
    let roots = body["game"]["rootNodes"].as_array().unwrap();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0]["isMainLine"], true);
    assert_eq!(roots[1]["move"]["san"], "d4");
    assert_eq!(body["game"]["metadata"]["White"], "Anderssen");
}

#[tokio::test]
async fn test_annotations() {
    let app = app();
    let arrow = json!({ "fen": START_FEN, "from": "E2", "to": "e4", "color": "green" });

    let (status, body) = send(&app, "POST", "/api/annotations/arrows", Some(arrow.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["present"], true);
    assert_eq!(body["annotations"]["arrows"][0]["from"], "e2");

    let (_, body) = send(
        &app,
        "POST",
        "/api/annotations/highlights",
        Some(json!({ "fen": START_FEN, "square": "d4", "color": "red" })),
    )
    .await;
    assert_eq!(body["annotations"]["highlights"][0]["square"], "d4");

    // Same placement and side to move, different counters.
    let other = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 6 12";
    let (_, body) = send(&app, "GET", &format!("/api/annotations?fen={}", query_fen(other)), None).await;
    assert_eq!(body["annotations"]["arrows"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, "POST", "/api/annotations/arrows", Some(arrow)).await;
    assert_eq!(body["present"], false);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/annotations?fen={}", query_fen(START_FEN)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", &format!("/api/annotations?fen={}", query_fen(START_FEN)), None).await;
    assert_eq!(body["annotations"]["highlights"], json!([]));
}

#[tokio::test]
async fn test_training_session_flow() {
    let app = app();
    let study = create_study(&app, "Drill").await;
    import(&app, &study, "1. e4 e5 2. Nf3", "white").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/training/sessions",
        Some(json!({ "study_id": study, "seed": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["session_id"].as_str().unwrap().to_string();
    assert_eq!(body["session"]["state"]["name"], "awaitingUserMove");
    let session = format!("/api/training/sessions/{id}");

    let (_, body) = send(&app, "GET", &format!("{session}/hint"), None).await;
    assert_eq!(body["hint"]["san"], "e4");

    let (status, body) = send(
        &app,
        "POST",
        &format!("{session}/moves"),
        Some(json!({ "from": "e2", "to": "e4" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["verdict"], "correct");
    assert_eq!(body["session"]["state"]["name"], "evaluating");

    settle().await;
    let (_, body) = send(&app, "GET", &session, None).await;
    assert_eq!(body["state"]["name"], "awaitingUserMove");
    assert_eq!(body["movesPlayed"], json!(["e4", "e5"]));

    let (_, body) = send(
        &app,
        "POST",
        &format!("{session}/moves"),
        Some(json!({ "from": "g1", "to": "f3" })),
    )
    .await;
    assert_eq!(body["result"]["verdict"], "correct");

    settle().await;
    let (_, body) = send(&app, "GET", &session, None).await;
    assert_eq!(body["state"]["name"], "sessionComplete");
    assert_eq!(body["progress"]["completedLines"], 1);
    assert_eq!(body["progress"]["correctMoves"], 2);
    assert_eq!(body["accuracy"], 1.0);

    let (status, body) = send(&app, "DELETE", &session, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["completedLines"], 1);

    let (status, _) = send(&app, "GET", &session, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_training_incorrect_then_retry() {
    let app = app();
    let study = create_study(&app, "Drill").await;
    import(&app, &study, "1. e4 e5 2. Nf3", "white").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/training/sessions",
        Some(json!({ "study_id": study })),
    )
    .await;
    let session = format!("/api/training/sessions/{}", body["session_id"].as_str().unwrap());

    let (_, body) = send(
        &app,
        "POST",
        &format!("{session}/moves"),
        Some(json!({ "from": "d2", "to": "d4" })),
    )
    .await;
    assert_eq!(body["result"]["verdict"], "incorrect");
    assert_eq!(body["result"]["expected"]["san"], "e4");
    assert_eq!(body["session"]["state"]["incorrectShown"], true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{session}/moves"),
        Some(json!({ "from": "e2", "to": "e4" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["detail"].as_str().unwrap().contains("submit_move"));

    let (status, body) = send(&app, "POST", &format!("{session}/retry"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["fen"], START_FEN);
    assert_eq!(body["session"]["progress"]["incorrectMoves"], 1);
}

#[tokio::test]
async fn test_training_without_lines() {
    let app = app();
    let study = create_study(&app, "Empty").await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/training/sessions",
        Some(json!({ "study_id": study })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No lines selected for training");

    let (status, _) = send(
        &app,
        "POST",
        "/api/training/sessions",
        Some(json!({ "study_id": "missing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_idle_sessions_are_evicted() {
    let app = app_with(Config {
        auto_play_delay_ms: 0,
        next_line_delay_ms: 0,
        session_idle_ttl_secs: 0,
        ..Config::default()
    });
    let study = create_study(&app, "Idle").await;
    import(&app, &study, "1. e4 e5 2. Nf3", "white").await;

    let body = json!({ "study_id": study });
    let (_, first) = send(&app, "POST", "/api/training/sessions", Some(body.clone())).await;
    let first = first["session_id"].as_str().unwrap().to_string();
    let (status, second) = send(&app, "POST", "/api/training/sessions", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let second = second["session_id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "GET", &format!("/api/training/sessions/{first}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&app, "GET", &format!("/api/training/sessions/{second}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["name"], "awaitingUserMove");
}

#[tokio::test]
async fn test_active_sessions_survive_the_sweep() {
    let app = app();
    let study = create_study(&app, "Busy").await;
    import(&app, &study, "1. e4 e5 2. Nf3", "white").await;

    let body = json!({ "study_id": study });
    let (_, first) = send(&app, "POST", "/api/training/sessions", Some(body.clone())).await;
    let first = first["session_id"].as_str().unwrap().to_string();
    send(&app, "POST", "/api/training/sessions", Some(body)).await;

    let (status, _) = send(&app, "GET", &format!("/api/training/sessions/{first}"), None).await;
    assert_eq!(status, StatusCode::OK);
}
