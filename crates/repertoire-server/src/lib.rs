pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};

use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Studies
        .route(
            "/api/studies",
            get(routes::studies::list_studies).post(routes::studies::create_study),
        )
        .route(
            "/api/studies/{study_id}",
            get(routes::studies::get_study)
                .put(routes::studies::rename_study)
                .delete(routes::studies::delete_study),
        )
        .route("/api/studies/{study_id}/lines", get(routes::lines::get_lines))
        .route("/api/studies/{study_id}/import", post(routes::chapters::import_pgn))
        // Chapters. The order route goes before the parameterized chapter routes
        .route("/api/studies/{study_id}/chapters", post(routes::chapters::create_chapter))
        .route(
            "/api/studies/{study_id}/chapters/order",
            put(routes::chapters::reorder_chapters),
        )
        .route(
            "/api/studies/{study_id}/chapters/{chapter_id}",
            get(routes::chapters::get_chapter)
                .put(routes::chapters::update_chapter)
                .delete(routes::chapters::delete_chapter),
        )
        .route(
            "/api/studies/{study_id}/chapters/{chapter_id}/moves",
            post(routes::chapters::add_move),
        )
        .route(
            "/api/studies/{study_id}/chapters/{chapter_id}/clear-variations",
            post(routes::chapters::clear_variations),
        )
        .route(
            "/api/studies/{study_id}/chapters/{chapter_id}/nodes/{node_id}",
            axum::routing::delete(routes::chapters::prune_node),
        )
        .route(
            "/api/studies/{study_id}/chapters/{chapter_id}/nodes/{node_id}/promote",
            post(routes::chapters::promote_node),
        )
        .route(
            "/api/studies/{study_id}/chapters/{chapter_id}/nodes/{node_id}/comment",
            put(routes::chapters::set_comment),
        )
        // Annotations
        .route(
            "/api/annotations",
            get(routes::annotations::get_annotations).delete(routes::annotations::clear_annotations),
        )
        .route("/api/annotations/arrows", post(routes::annotations::toggle_arrow))
        .route("/api/annotations/highlights", post(routes::annotations::toggle_highlight))
        // Training
        .route("/api/training/sessions", post(routes::training::create_session))
        .route(
            "/api/training/sessions/{session_id}",
            get(routes::training::get_session).delete(routes::training::exit_session),
        )
        .route(
            "/api/training/sessions/{session_id}/moves",
            post(routes::training::submit_move),
        )
        .route(
            "/api/training/sessions/{session_id}/retry",
            post(routes::training::retry_move),
        )
        .route(
            "/api/training/sessions/{session_id}/restart",
            post(routes::training::restart_line),
        )
        .route(
            "/api/training/sessions/{session_id}/skip",
            post(routes::training::skip_line),
        )
        .route(
            "/api/training/sessions/{session_id}/hint",
            get(routes::training::get_hint),
        )
        // Shared state
        .layer(Extension(state))
        .layer(cors)
}
