use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use repertoire_core::lines::{filter_lines, line_preview, line_stats, LineFilter, StudyLine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::error::AppError;
use crate::state::AppState;

/// Split a comma-separated query value, dropping blanks.
pub(crate) fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
pub struct LinesQuery {
    /// Comma-separated chapter ids; all chapters when absent.
    pub chapters: Option<String>,
    pub max_depth: Option<usize>,
    /// Comma-separated tags, any of which selects a line.
    pub tags: Option<String>,
    pub preview_moves: Option<usize>,
}

#[derive(Serialize)]
struct LineView<'a> {
    #[serde(flatten)]
    line: &'a StudyLine,
    preview: String,
}

/// GET /api/studies/{study_id}/lines?chapters=a,b&max_depth=12&tags=B90
pub async fn get_lines(
    Extension(state): Extension<AppState>,
    Path(study_id): Path<String>,
    Query(q): Query<LinesQuery>,
) -> Result<Json<JsonValue>, AppError> {
    let chapter_ids = split_csv(q.chapters.as_deref());
    let lines = {
        let library = state.library.lock().await;
        library.lines(&study_id, &chapter_ids)?
    };

    let filter = LineFilter {
        max_depth: q.max_depth,
        only_enabled: false,
        tags: split_csv(q.tags.as_deref()),
    };
    let lines = filter_lines(&lines, &filter);
    let preview_moves = q.preview_moves.unwrap_or(10);

    let views: Vec<LineView> = lines
        .iter()
        .map(|line| LineView {
            line,
            preview: line_preview(line, preview_moves),
        })
        .collect();

    Ok(Json(json!({
        "lines": views,
        "stats": line_stats(&lines),
    })))
}
