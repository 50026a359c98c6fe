use axum::{extract::Path, Extension, Json};
use repertoire_core::study::Game;
use repertoire_core::{
    Color, LibraryError, MoveAttempt, Promotion, RulesEngine, ShakmatyEngine,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::error::AppError;
use crate::state::{AppState, Library};

/// Open the chapter, apply an edit, save it, and return the edit's result
/// together with the updated chapter.
fn edit_chapter<T: serde::Serialize>(
    library: &mut Library,
    study_id: &str,
    chapter_id: &str,
    edit: impl FnOnce(&mut Library) -> Result<T, LibraryError>,
) -> Result<JsonValue, AppError> {
    library.open_chapter(study_id, chapter_id)?;
    let result = edit(library)?;
    library.save_open_chapter()?;
    Ok(json!({
        "result": result,
        "chapter": library.current_chapter()?,
    }))
}

fn default_orientation() -> Color {
    Color::White
}

#[derive(Deserialize)]
pub struct CreateChapterBody {
    pub name: String,
    #[serde(default = "default_orientation")]
    pub orientation: Color,
    pub initial_fen: Option<String>,
}

/// POST /api/studies/{study_id}/chapters
/// Empty chapter from the standard or a custom start position.
pub async fn create_chapter(
    Extension(state): Extension<AppState>,
    Path(study_id): Path<String>,
    Json(body): Json<CreateChapterBody>,
) -> Result<Json<JsonValue>, AppError> {
    let game = match body.initial_fen.as_deref().map(str::trim) {
        Some(fen) if !fen.is_empty() => {
            let engine = ShakmatyEngine::from_fen(fen).map_err(LibraryError::from)?;
            Game::new(&engine.fen())
        }
        _ => Game::default(),
    };

    let mut library = state.library.lock().await;
    let chapter_id = library.add_chapter(&study_id, &body.name, body.orientation, game)?;
    Ok(Json(json!(library.chapter(&study_id, &chapter_id)?)))
}

#[derive(Deserialize)]
pub struct ImportBody {
    pub pgn: String,
    pub name: Option<String>,
    #[serde(default = "default_orientation")]
    pub orientation: Color,
    /// Import every game of the PGN as its own chapter.
    #[serde(default)]
    pub multiple: bool,
}

/// POST /api/studies/{study_id}/import
/// Import PGN into new chapters. Import errors and warnings are reported,
/// not raised.
pub async fn import_pgn(
    Extension(state): Extension<AppState>,
    Path(study_id): Path<String>,
    Json(body): Json<ImportBody>,
) -> Result<Json<JsonValue>, AppError> {
    if body.pgn.trim().is_empty() {
        return Err(AppError::BadRequest("PGN text is required".to_string()));
    }

    let mut library = state.library.lock().await;
    let summaries = if body.multiple {
        library.import_chapters(&study_id, &body.pgn, body.orientation)?
    } else {
        vec![library.import_chapter(&study_id, &body.pgn, body.name.as_deref(), body.orientation)?]
    };
    Ok(Json(json!({ "imports": summaries })))
}

#[derive(Deserialize)]
pub struct ReorderBody {
    pub chapter_ids: Vec<String>,
}

/// PUT /api/studies/{study_id}/chapters/order
pub async fn reorder_chapters(
    Extension(state): Extension<AppState>,
    Path(study_id): Path<String>,
    Json(body): Json<ReorderBody>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    library.reorder_chapters(&study_id, &body.chapter_ids)?;
    let order: Vec<&str> = library
        .study(&study_id)?
        .chapters
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    Ok(Json(json!({ "chapter_ids": order })))
}

/// GET /api/studies/{study_id}/chapters/{chapter_id}
pub async fn get_chapter(
    Extension(state): Extension<AppState>,
    Path((study_id, chapter_id)): Path<(String, String)>,
) -> Result<Json<JsonValue>, AppError> {
    let library = state.library.lock().await;
    Ok(Json(json!(library.chapter(&study_id, &chapter_id)?)))
}

#[derive(Deserialize)]
pub struct UpdateChapterBody {
    pub name: Option<String>,
    pub orientation: Option<Color>,
}

/// PUT /api/studies/{study_id}/chapters/{chapter_id}
/// Rename and/or flip orientation.
pub async fn update_chapter(
    Extension(state): Extension<AppState>,
    Path((study_id, chapter_id)): Path<(String, String)>,
    Json(body): Json<UpdateChapterBody>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    if let Some(name) = &body.name {
        library.rename_chapter(&study_id, &chapter_id, name)?;
    }
    if let Some(orientation) = body.orientation {
        library.set_orientation(&study_id, &chapter_id, orientation)?;
    }
    Ok(Json(json!(library.chapter(&study_id, &chapter_id)?)))
}

/// DELETE /api/studies/{study_id}/chapters/{chapter_id}
pub async fn delete_chapter(
    Extension(state): Extension<AppState>,
    Path((study_id, chapter_id)): Path<(String, String)>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    let chapter = library.remove_chapter(&study_id, &chapter_id)?;
    Ok(Json(json!({ "deleted": chapter.id })))
}

#[derive(Deserialize)]
pub struct AddMoveBody {
    /// Node to play from; omitted for a first move.
    pub parent_id: Option<String>,
    pub san: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub promotion: Option<Promotion>,
}

/// POST /api/studies/{study_id}/chapters/{chapter_id}/moves
/// Add a move by SAN or by from/to squares. Replaying an existing move
/// returns the existing node.
pub async fn add_move(
    Extension(state): Extension<AppState>,
    Path((study_id, chapter_id)): Path<(String, String)>,
    Json(body): Json<AddMoveBody>,
) -> Result<Json<JsonValue>, AppError> {
    let parent = body.parent_id.as_deref();
    let mut library = state.library.lock().await;

    let value = match (&body.san, &body.from, &body.to) {
        (Some(san), _, _) => edit_chapter(&mut library, &study_id, &chapter_id, |lib| {
            lib.play_san(parent, san)
        })?,
        (None, Some(from), Some(to)) => {
            let mut attempt = MoveAttempt::new(from, to);
            attempt.promotion = body.promotion;
            edit_chapter(&mut library, &study_id, &chapter_id, |lib| {
                lib.play_move(parent, &attempt)
            })?
        }
        _ => {
            return Err(AppError::BadRequest(
                "Either san or from/to is required".to_string(),
            ))
        }
    };
    Ok(Json(value))
}

/// POST /api/studies/{study_id}/chapters/{chapter_id}/nodes/{node_id}/promote
pub async fn promote_node(
    Extension(state): Extension<AppState>,
    Path((study_id, chapter_id, node_id)): Path<(String, String, String)>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    let value = edit_chapter(&mut library, &study_id, &chapter_id, |lib| {
        lib.promote(&node_id)
    })?;
    Ok(Json(value))
}

/// DELETE /api/studies/{study_id}/chapters/{chapter_id}/nodes/{node_id}
/// Removes the node and everything after it.
pub async fn prune_node(
    Extension(state): Extension<AppState>,
    Path((study_id, chapter_id, node_id)): Path<(String, String, String)>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    let value = edit_chapter(&mut library, &study_id, &chapter_id, |lib| lib.prune(&node_id))?;
    Ok(Json(value))
}

#[derive(Deserialize)]
pub struct CommentBody {
    pub comment: Option<String>,
}

/// PUT /api/studies/{study_id}/chapters/{chapter_id}/nodes/{node_id}/comment
pub async fn set_comment(
    Extension(state): Extension<AppState>,
    Path((study_id, chapter_id, node_id)): Path<(String, String, String)>,
    Json(body): Json<CommentBody>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    let value = edit_chapter(&mut library, &study_id, &chapter_id, |lib| {
        lib.set_comment(&node_id, body.comment)
    })?;
    Ok(Json(value))
}

/// POST /api/studies/{study_id}/chapters/{chapter_id}/clear-variations
/// Keep only the main line and drop comments.
pub async fn clear_variations(
    Extension(state): Extension<AppState>,
    Path((study_id, chapter_id)): Path<(String, String)>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    let value = edit_chapter(&mut library, &study_id, &chapter_id, |lib| {
        lib.clear_variations()
    })?;
    Ok(Json(value))
}
