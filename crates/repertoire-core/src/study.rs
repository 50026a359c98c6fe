//! Study content: a study is an ordered list of chapters, each chapter owns
//! one game tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{self, PlainNode};
use crate::error::LibraryError;
use crate::model::{Color, Metadata, STANDARD_START_FEN};
use crate::tree::MoveTree;

/// A game tree plus its starting position. Serializes through its plain,
/// parent-free form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "PlainGame", from = "PlainGame")]
pub struct Game {
    pub tree: MoveTree,
    pub initial_fen: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainGame {
    #[serde(default)]
    pub root_nodes: Vec<PlainNode>,
    #[serde(default = "default_initial_fen")]
    pub initial_fen: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

fn default_initial_fen() -> String {
    STANDARD_START_FEN.to_string()
}

impl Default for Game {
    fn default() -> Self {
        Self::new(STANDARD_START_FEN)
    }
}

impl Game {
    pub fn new(initial_fen: &str) -> Self {
        Self {
            tree: MoveTree::new(),
            initial_fen: initial_fen.to_string(),
            metadata: Metadata::new(),
        }
    }

    pub fn to_plain(&self) -> PlainGame {
        PlainGame {
            root_nodes: codec::serialize(&self.tree),
            initial_fen: self.initial_fen.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl From<Game> for PlainGame {
    fn from(game: Game) -> Self {
        game.to_plain()
    }
}

impl From<PlainGame> for Game {
    fn from(plain: PlainGame) -> Self {
        Self {
            tree: codec::deserialize(&plain.root_nodes),
            initial_fen: plain.initial_fen,
            metadata: plain.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub name: String,
    pub orientation: Color,
    pub game: Game,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    pub fn new(name: &str, orientation: Color, game: Game) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            orientation,
            game,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Study {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            chapters: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn chapter(&self, chapter_id: &str) -> Result<&Chapter, LibraryError> {
        self.chapters
            .iter()
            .find(|c| c.id == chapter_id)
            .ok_or_else(|| LibraryError::ChapterNotFound(chapter_id.to_string()))
    }

    pub fn chapter_mut(&mut self, chapter_id: &str) -> Result<&mut Chapter, LibraryError> {
        self.chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
            .ok_or_else(|| LibraryError::ChapterNotFound(chapter_id.to_string()))
    }

    pub fn add_chapter(&mut self, chapter: Chapter) -> &Chapter {
        self.chapters.push(chapter);
        self.touch();
        &self.chapters[self.chapters.len() - 1]
    }

    pub fn remove_chapter(&mut self, chapter_id: &str) -> Result<Chapter, LibraryError> {
        let index = self
            .chapters
            .iter()
            .position(|c| c.id == chapter_id)
            .ok_or_else(|| LibraryError::ChapterNotFound(chapter_id.to_string()))?;
        self.touch();
        Ok(self.chapters.remove(index))
    }

    /// Move the chapter at `from` to index `to` (drag-and-drop ordering).
    pub fn move_chapter(&mut self, from: usize, to: usize) -> Result<(), LibraryError> {
        let len = self.chapters.len();
        if from >= len || to >= len {
            return Err(LibraryError::InvalidInput(format!(
                "Chapter index out of range (len {len}): {from} -> {to}"
            )));
        }
        let chapter = self.chapters.remove(from);
        self.chapters.insert(to, chapter);
        self.touch();
        Ok(())
    }

    /// Reorder chapters to match `ids`, which must be a permutation of the
    /// current chapter ids.
    pub fn reorder_chapters(&mut self, ids: &[String]) -> Result<(), LibraryError> {
        if ids.len() != self.chapters.len() {
            return Err(LibraryError::InvalidInput(format!(
                "Expected {} chapter ids, got {}",
                self.chapters.len(),
                ids.len()
            )));
        }
        let mut order = Vec::with_capacity(ids.len());
        for id in ids {
            let index = self
                .chapters
                .iter()
                .position(|c| &c.id == id)
                .ok_or_else(|| LibraryError::ChapterNotFound(id.clone()))?;
            if order.contains(&index) {
                return Err(LibraryError::InvalidInput(format!("Duplicate chapter id: {id}")));
            }
            order.push(index);
        }

        let mut slots: Vec<Option<Chapter>> = std::mem::take(&mut self.chapters)
            .into_iter()
            .map(Some)
            .collect();
        self.chapters = order.into_iter().filter_map(|i| slots[i].take()).collect();
        self.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Move, STANDARD_START_FEN};

    fn chapter(name: &str) -> Chapter {
        Chapter::new(name, Color::White, Game::default())
    }

    #[test]
    fn test_game_serializes_plain_form() {
        let mut game = Game::default();
        let e4 = game
            .tree
            .insert_move(
                None,
                Move {
                    from: "e2".into(),
                    to: "e4".into(),
                    san: "e4".into(),
                    color: Color::White,
                    promotion: None,
                },
                "after-e4".into(),
            )
            .unwrap();
        game.metadata.insert("Event".into(), "Casual".into());

        let json = serde_json::to_value(&game).unwrap();
        assert_eq!(json["initialFen"], STANDARD_START_FEN);
        assert_eq!(json["rootNodes"][0]["fen"], "after-e4");
        assert_eq!(json["metadata"]["Event"], "Casual");

        let restored: Game = serde_json::from_value(json).unwrap();
        let root = restored.tree.roots()[0];
        assert_eq!(
            restored.tree.node(root).unwrap().id,
            game.tree.node(e4).unwrap().id
        );
    }

    #[test]
    fn test_plain_game_defaults() {
        let game: Game = serde_json::from_str("{}").unwrap();
        assert_eq!(game.initial_fen, STANDARD_START_FEN);
        assert!(game.tree.is_empty());
    }

    #[test]
    fn test_reorder_and_remove_chapters() {
        let mut study = Study::new("  Sicilian ");
        assert_eq!(study.name, "Sicilian");
        let a = study.add_chapter(chapter("A")).id.clone();
        let b = study.add_chapter(chapter("B")).id.clone();
        let c = study.add_chapter(chapter("C")).id.clone();

        study
            .reorder_chapters(&[c.clone(), a.clone(), b.clone()])
            .unwrap();
        let names: Vec<&str> = study.chapters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);

        study.move_chapter(0, 2).unwrap();
        assert_eq!(study.chapters[2].id, c);
        assert!(study.move_chapter(0, 3).is_err());

        assert!(study.reorder_chapters(&[a.clone()]).is_err());
        assert!(matches!(
            study.reorder_chapters(&[a.clone(), b.clone(), "missing".into()]),
            Err(LibraryError::ChapterNotFound(_))
        ));

        let removed = study.remove_chapter(&a).unwrap();
        assert_eq!(removed.name, "A");
        assert!(matches!(
            study.remove_chapter(&a),
            Err(LibraryError::ChapterNotFound(_))
        ));
    }
}
