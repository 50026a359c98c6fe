use axum::{extract::Query, Extension, Json};
use repertoire_core::annotations::{Arrow, Highlight, MarkColor, PositionAnnotations};
use repertoire_core::model::position_key;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FenQuery {
    pub fen: String,
}

/// GET /api/annotations?fen=...
/// Arrows and highlights of the position, shared by every transposition.
pub async fn get_annotations(
    Extension(state): Extension<AppState>,
    Query(q): Query<FenQuery>,
) -> Result<Json<JsonValue>, AppError> {
    let library = state.library.lock().await;
    let annotations = library
        .annotations_for(&q.fen)
        .cloned()
        .unwrap_or_default();
    Ok(Json(json!({
        "key": position_key(&q.fen),
        "annotations": annotations,
    })))
}

/// DELETE /api/annotations?fen=...
pub async fn clear_annotations(
    Extension(state): Extension<AppState>,
    Query(q): Query<FenQuery>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    library.clear_annotations(&q.fen)?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ArrowBody {
    pub fen: String,
    pub from: String,
    pub to: String,
    pub color: MarkColor,
}

/// POST /api/annotations/arrows
/// Toggle an arrow: adds it, or removes an identical one.
pub async fn toggle_arrow(
    Extension(state): Extension<AppState>,
    Json(body): Json<ArrowBody>,
) -> Result<Json<JsonValue>, AppError> {
    let arrow = Arrow {
        from: body.from.trim().to_ascii_lowercase(),
        to: body.to.trim().to_ascii_lowercase(),
        color: body.color,
    };
    let mut library = state.library.lock().await;
    let present = library.toggle_arrow(&body.fen, arrow)?;
    Ok(Json(json!({
        "present": present,
        "annotations": current(&library, &body.fen),
    })))
}

#[derive(Deserialize)]
pub struct HighlightBody {
    pub fen: String,
    pub square: String,
    pub color: MarkColor,
}

/// POST /api/annotations/highlights
pub async fn toggle_highlight(
    Extension(state): Extension<AppState>,
    Json(body): Json<HighlightBody>,
) -> Result<Json<JsonValue>, AppError> {
    let highlight = Highlight {
        square: body.square.trim().to_ascii_lowercase(),
        color: body.color,
    };
    let mut library = state.library.lock().await;
    let present = library.toggle_highlight(&body.fen, highlight)?;
    Ok(Json(json!({
        "present": present,
        "annotations": current(&library, &body.fen),
    })))
}

fn current(library: &crate::state::Library, fen: &str) -> PositionAnnotations {
    library.annotations_for(fen).cloned().unwrap_or_default()
}
