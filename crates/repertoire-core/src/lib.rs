pub mod annotations;
pub mod codec;
pub mod error;
pub mod library;
pub mod lines;
pub mod model;
pub mod pgn;
pub mod rules;
pub mod storage;
pub mod study;
pub mod training;
pub mod tree;

pub use error::{LibraryError, RulesError, StorageError, TrainingError, TreeError};
pub use library::StudyLibrary;
pub use model::{Color, Move, MoveAttempt, Promotion};
pub use rules::{RulesEngine, ShakmatyEngine};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use training::{TrainingOptions, TrainingSession};
pub use tree::{MoveNode, MoveTree, NodeRef};
