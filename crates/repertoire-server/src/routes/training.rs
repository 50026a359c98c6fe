use axum::{extract::Path, Extension, Json};
use repertoire_core::training::Scheduled;
use repertoire_core::{MoveAttempt, Promotion, ShakmatyEngine, TrainingSession};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::error::AppError;
use crate::state::{AppState, Session, Sessions, TrainingSlot};

/// Run `scheduled` after its delay. A deleted session or a superseded ticket
/// turns the timer into a no-op.
fn spawn_continuation(sessions: Sessions, session_id: String, scheduled: Scheduled) {
    tokio::spawn(async move {
        tokio::time::sleep(scheduled.delay()).await;

        let mut map = sessions.lock().await;
        let Some(session) = map.get_mut(&session_id).map(|slot| &mut slot.session) else {
            return;
        };
        match session.resume(scheduled.ticket) {
            Ok(true) => {
                tracing::debug!(session = %session_id, action = ?scheduled.action, "Continuation ran");
                if let Some(next) = session.pending() {
                    drop(map);
                    spawn_continuation(sessions.clone(), session_id, next);
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(session = %session_id, "Continuation failed: {e}"),
        }
    });
}

fn not_found(session_id: &str) -> AppError {
    AppError::NotFound(format!("Training session not found: {session_id}"))
}

/// Apply a transition to a session, schedule whatever it left pending, and
/// return `{"result", "session"}`.
async fn transition<T: serde::Serialize>(
    state: &AppState,
    session_id: &str,
    action: impl FnOnce(&mut Session) -> Result<T, AppError>,
) -> Result<JsonValue, AppError> {
    let mut sessions = state.sessions.lock().await;
    let session = sessions
        .get_mut(session_id)
        .ok_or_else(|| not_found(session_id))?
        .touch();

    let before = session.pending();
    let result = action(session)?;
    let pending = session.pending();
    let snapshot = session.snapshot();
    drop(sessions);

    if let Some(scheduled) = pending.filter(|p| Some(*p) != before) {
        spawn_continuation(state.sessions.clone(), session_id.to_string(), scheduled);
    }
    Ok(json!({ "result": result, "session": snapshot }))
}

#[derive(Deserialize)]
pub struct CreateSessionBody {
    pub study_id: String,
    /// All chapters when empty.
    #[serde(default)]
    pub chapter_ids: Vec<String>,
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub disabled_line_ids: Vec<String>,
    /// Fixed shuffle seed for a reproducible line order.
    pub seed: Option<u64>,
}

/// POST /api/training/sessions
/// Build the line set from the study, start a session, and auto-play up to
/// the first user move.
pub async fn create_session(
    Extension(state): Extension<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<JsonValue>, AppError> {
    let mut configuration = {
        let library = state.library.lock().await;
        library.configuration(&body.study_id, &body.chapter_ids)?
    };
    configuration.max_depth = body.max_depth;
    configuration.tags = body.tags;
    for line_id in &body.disabled_line_ids {
        if !configuration.set_line_enabled(line_id, false) {
            tracing::debug!(line = %line_id, "Ignoring unknown line id");
        }
    }

    let options = state.config.training_options(body.seed);
    let mut session =
        TrainingSession::new(ShakmatyEngine::new(), configuration.training_lines(), options)?;
    session.start()?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let snapshot = session.snapshot();
    let pending = session.pending();
    tracing::info!(
        session = %session_id,
        study = %body.study_id,
        lines = session.progress().total_lines,
        "Training session created"
    );

    let evicted = state.prune_idle_sessions().await;
    if evicted > 0 {
        tracing::info!(evicted, "Evicted idle training sessions");
    }
    state
        .sessions
        .lock()
        .await
        .insert(session_id.clone(), TrainingSlot::new(session));
    if let Some(scheduled) = pending {
        spawn_continuation(state.sessions.clone(), session_id.clone(), scheduled);
    }

    Ok(Json(json!({
        "session_id": session_id,
        "session": snapshot,
    })))
}

/// GET /api/training/sessions/{session_id}
pub async fn get_session(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let mut sessions = state.sessions.lock().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or_else(|| not_found(&session_id))?
        .touch();
    Ok(Json(json!(session.snapshot())))
}

#[derive(Deserialize)]
pub struct MoveBody {
    pub from: String,
    pub to: String,
    pub promotion: Option<Promotion>,
}

/// POST /api/training/sessions/{session_id}/moves
pub async fn submit_move(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<MoveBody>,
) -> Result<Json<JsonValue>, AppError> {
    let mut attempt = MoveAttempt::new(&body.from, &body.to);
    attempt.promotion = body.promotion;
    let value = transition(&state, &session_id, |s| Ok(s.submit_move(&attempt)?)).await?;
    Ok(Json(value))
}

/// POST /api/training/sessions/{session_id}/retry
/// Take back an incorrect attempt.
pub async fn retry_move(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let value = transition(&state, &session_id, |s| Ok(s.retry_move()?)).await?;
    Ok(Json(value))
}

/// POST /api/training/sessions/{session_id}/restart
pub async fn restart_line(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let value = transition(&state, &session_id, |s| Ok(s.restart_line()?)).await?;
    Ok(Json(value))
}

/// POST /api/training/sessions/{session_id}/skip
pub async fn skip_line(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let value = transition(&state, &session_id, |s| Ok(s.skip_line()?)).await?;
    Ok(Json(value))
}

/// GET /api/training/sessions/{session_id}/hint
pub async fn get_hint(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let mut sessions = state.sessions.lock().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or_else(|| not_found(&session_id))?
        .touch();
    Ok(Json(json!({ "hint": session.hint() })))
}

/// DELETE /api/training/sessions/{session_id}
/// Exit and drop the session; pending timers find nothing to resume.
pub async fn exit_session(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let mut session = state
        .sessions
        .lock()
        .await
        .remove(&session_id)
        .ok_or_else(|| not_found(&session_id))?
        .session;
    session.exit();
    Ok(Json(json!({
        "session_id": session_id,
        "summary": session.progress(),
        "accuracy": session.progress().accuracy(),
    })))
}
