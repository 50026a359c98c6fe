use axum::{extract::Path, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/studies
/// Study summaries, without chapter trees.
pub async fn list_studies(
    Extension(state): Extension<AppState>,
) -> Result<Json<JsonValue>, AppError> {
    let library = state.library.lock().await;
    let studies: Vec<JsonValue> = library
        .studies()
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "chapter_count": s.chapters.len(),
                "created_at": s.created_at,
                "updated_at": s.updated_at,
            })
        })
        .collect();
    Ok(Json(json!(studies)))
}

#[derive(Deserialize)]
pub struct StudyBody {
    pub name: String,
}

/// POST /api/studies
pub async fn create_study(
    Extension(state): Extension<AppState>,
    Json(body): Json<StudyBody>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    let study = library.create_study(&body.name)?;
    Ok(Json(json!(study)))
}

/// GET /api/studies/{study_id}
pub async fn get_study(
    Extension(state): Extension<AppState>,
    Path(study_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let library = state.library.lock().await;
    Ok(Json(json!(library.study(&study_id)?)))
}

/// PUT /api/studies/{study_id}
pub async fn rename_study(
    Extension(state): Extension<AppState>,
    Path(study_id): Path<String>,
    Json(body): Json<StudyBody>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    library.rename_study(&study_id, &body.name)?;
    Ok(Json(json!(library.study(&study_id)?)))
}

/// DELETE /api/studies/{study_id}
/// Deletes the study with all of its chapters.
pub async fn delete_study(
    Extension(state): Extension<AppState>,
    Path(study_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let mut library = state.library.lock().await;
    let study = library.delete_study(&study_id)?;
    Ok(Json(json!({
        "deleted": study.id,
        "chapters_deleted": study.chapters.len(),
    })))
}
