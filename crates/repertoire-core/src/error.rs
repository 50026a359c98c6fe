//! Error types for the repertoire core.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Node not found in tree: {0}")]
    UnknownNode(usize),

    #[error("Node id not found: {0}")]
    UnknownNodeId(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("Invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("Invalid square: {0}")]
    InvalidSquare(String),

    #[error("Invalid SAN '{0}'")]
    InvalidSan(String),

    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Unsupported move: {0}")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Study not found: {0}")]
    StudyNotFound(String),

    #[error("Chapter not found: {0}")]
    ChapterNotFound(String),

    #[error("No chapter is open")]
    NoOpenChapter,

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrainingError {
    #[error("No lines selected for training")]
    NoLines,

    #[error("Action '{action}' not allowed in state {state}")]
    InvalidState { action: &'static str, state: String },

    #[error("Line {line_id} cannot be replayed: {source}")]
    BrokenLine {
        line_id: String,
        #[source]
        source: RulesError,
    },
}
