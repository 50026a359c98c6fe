//! Studies and annotations backed by a [`KeyValueStore`].
//!
//! At most one chapter is open for editing at a time. Tree edits go to the
//! open chapter and mark it dirty; switching or closing the chapter saves it
//! first. Study-level changes and annotation toggles are saved immediately.

use serde::Serialize;

use crate::annotations::{AnnotationStore, Arrow, Highlight, PositionAnnotations};
use crate::error::{LibraryError, RulesError};
use crate::lines::{extract_study_lines, StudyLine};
use crate::model::{position_key, Color, MoveAttempt};
use crate::pgn::{self, ImportError, ImportResult, ImportWarning};
use crate::rules::{PlayedMove, RulesEngine, ShakmatyEngine};
use crate::storage::{load_typed, save_typed, KeyValueStore};
use crate::study::{Chapter, Game, Study};
use crate::training::StudyConfiguration;

pub const STUDIES_KEY: &str = "studies";
pub const ANNOTATIONS_KEY: &str = "annotations";

#[derive(Debug, Clone)]
struct OpenChapter {
    study_id: String,
    chapter_id: String,
    dirty: bool,
}

/// Outcome of importing one PGN game into a chapter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub chapter_id: Option<String>,
    pub chapter_name: String,
    pub node_count: usize,
    pub errors: Vec<ImportError>,
    pub warnings: Vec<ImportWarning>,
}

pub struct StudyLibrary<S: KeyValueStore> {
    store: S,
    studies: Vec<Study>,
    annotations: AnnotationStore,
    open: Option<OpenChapter>,
}

fn require_name(name: &str, what: &str) -> Result<String, LibraryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LibraryError::InvalidInput(format!("{what} name is required")));
    }
    Ok(name.to_string())
}

impl<S: KeyValueStore> StudyLibrary<S> {
    /// Load studies and annotations from `store`.
    pub fn open(store: S) -> Result<Self, LibraryError> {
        let studies: Vec<Study> = load_typed(&store, STUDIES_KEY)?.unwrap_or_default();
        let mut annotations = AnnotationStore::new();
        if let Some(snapshot) = load_typed(&store, ANNOTATIONS_KEY)? {
            annotations.load_all(snapshot);
        }
        tracing::info!(
            studies = studies.len(),
            annotated_positions = annotations.len(),
            "Study library loaded"
        );
        Ok(Self {
            store,
            studies,
            annotations,
            open: None,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Save the open chapter and hand back the store.
    pub fn into_store(mut self) -> Result<S, LibraryError> {
        self.save_open_chapter()?;
        Ok(self.store)
    }

    fn persist_studies(&mut self) -> Result<(), LibraryError> {
        save_typed(&mut self.store, STUDIES_KEY, &self.studies)?;
        Ok(())
    }

    fn persist_annotations(&mut self) -> Result<(), LibraryError> {
        save_typed(&mut self.store, ANNOTATIONS_KEY, &self.annotations.get_all())?;
        Ok(())
    }

    // ---- Studies ----

    pub fn studies(&self) -> &[Study] {
        &self.studies
    }

    pub fn study(&self, study_id: &str) -> Result<&Study, LibraryError> {
        self.studies
            .iter()
            .find(|s| s.id == study_id)
            .ok_or_else(|| LibraryError::StudyNotFound(study_id.to_string()))
    }

    fn study_mut(&mut self, study_id: &str) -> Result<&mut Study, LibraryError> {
        self.studies
            .iter_mut()
            .find(|s| s.id == study_id)
            .ok_or_else(|| LibraryError::StudyNotFound(study_id.to_string()))
    }

    pub fn create_study(&mut self, name: &str) -> Result<&Study, LibraryError> {
        let study = Study::new(&require_name(name, "Study")?);
        tracing::info!(study = %study.id, name = %study.name, "Study created");
        self.studies.push(study);
        self.persist_studies()?;
        Ok(&self.studies[self.studies.len() - 1])
    }

    pub fn rename_study(&mut self, study_id: &str, name: &str) -> Result<(), LibraryError> {
        let name = require_name(name, "Study")?;
        let study = self.study_mut(study_id)?;
        study.name = name;
        study.touch();
        self.persist_studies()
    }

    /// Delete a study and all of its chapters.
    pub fn delete_study(&mut self, study_id: &str) -> Result<Study, LibraryError> {
        let index = self
            .studies
            .iter()
            .position(|s| s.id == study_id)
            .ok_or_else(|| LibraryError::StudyNotFound(study_id.to_string()))?;
        if self.open.as_ref().is_some_and(|o| o.study_id == study_id) {
            self.open = None;
        }
        let study = self.studies.remove(index);
        self.persist_studies()?;
        tracing::info!(study = %study.id, chapters = study.chapters.len(), "Study deleted");
        Ok(study)
    }

    // ---- Chapters ----

    pub fn chapter(&self, study_id: &str, chapter_id: &str) -> Result<&Chapter, LibraryError> {
        self.study(study_id)?.chapter(chapter_id)
    }

    pub fn add_chapter(
        &mut self,
        study_id: &str,
        name: &str,
        orientation: Color,
        game: Game,
    ) -> Result<String, LibraryError> {
        let chapter = Chapter::new(&require_name(name, "Chapter")?, orientation, game);
        let id = self.study_mut(study_id)?.add_chapter(chapter).id.clone();
        self.persist_studies()?;
        Ok(id)
    }

    /// Import one PGN game as a new chapter. A partial tree is kept when the
    /// import aborts midway; nothing is created when no move was imported.
    pub fn import_chapter(
        &mut self,
        study_id: &str,
        pgn_text: &str,
        name: Option<&str>,
        orientation: Color,
    ) -> Result<ImportSummary, LibraryError> {
        self.study(study_id)?;
        let result = pgn::import_pgn(pgn_text);
        let summary = self.add_imported(study_id, result, name, orientation)?;
        self.persist_studies()?;
        Ok(summary)
    }

    /// Import every game of a multi-game PGN, one chapter each.
    pub fn import_chapters(
        &mut self,
        study_id: &str,
        pgn_text: &str,
        orientation: Color,
    ) -> Result<Vec<ImportSummary>, LibraryError> {
        self.study(study_id)?;
        let mut summaries = Vec::new();
        for result in pgn::import_pgn_games(pgn_text) {
            summaries.push(self.add_imported(study_id, result, None, orientation)?);
        }
        self.persist_studies()?;
        Ok(summaries)
    }

    fn add_imported(
        &mut self,
        study_id: &str,
        result: ImportResult,
        name: Option<&str>,
        orientation: Color,
    ) -> Result<ImportSummary, LibraryError> {
        let chapter_name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| pgn::chapter_name(&result.metadata));
        let node_count = result.tree.node_count();

        let chapter_id = if node_count > 0 {
            let game = Game {
                tree: result.tree,
                initial_fen: result.initial_fen,
                metadata: result.metadata,
            };
            let chapter = Chapter::new(&chapter_name, orientation, game);
            Some(self.study_mut(study_id)?.add_chapter(chapter).id.clone())
        } else {
            None
        };

        tracing::info!(
            study = %study_id,
            chapter = ?chapter_id,
            nodes = node_count,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "PGN imported"
        );
        Ok(ImportSummary {
            chapter_id,
            chapter_name,
            node_count,
            errors: result.errors,
            warnings: result.warnings,
        })
    }

    pub fn rename_chapter(
        &mut self,
        study_id: &str,
        chapter_id: &str,
        name: &str,
    ) -> Result<(), LibraryError> {
        let name = require_name(name, "Chapter")?;
        let chapter = self.study_mut(study_id)?.chapter_mut(chapter_id)?;
        chapter.name = name;
        chapter.touch();
        self.persist_studies()
    }

    pub fn set_orientation(
        &mut self,
        study_id: &str,
        chapter_id: &str,
        orientation: Color,
    ) -> Result<(), LibraryError> {
        let chapter = self.study_mut(study_id)?.chapter_mut(chapter_id)?;
        chapter.orientation = orientation;
        chapter.touch();
        self.persist_studies()
    }

    pub fn remove_chapter(&mut self, study_id: &str, chapter_id: &str) -> Result<Chapter, LibraryError> {
        let chapter = self.study_mut(study_id)?.remove_chapter(chapter_id)?;
        if self
            .open
            .as_ref()
            .is_some_and(|o| o.study_id == study_id && o.chapter_id == chapter_id)
        {
            self.open = None;
        }
        self.persist_studies()?;
        Ok(chapter)
    }

    pub fn reorder_chapters(&mut self, study_id: &str, ids: &[String]) -> Result<(), LibraryError> {
        self.study_mut(study_id)?.reorder_chapters(ids)?;
        self.persist_studies()
    }

    pub fn move_chapter(&mut self, study_id: &str, from: usize, to: usize) -> Result<(), LibraryError> {
        self.study_mut(study_id)?.move_chapter(from, to)?;
        self.persist_studies()
    }

    // ---- Open chapter ----

    /// Make `chapter_id` the chapter being edited, saving the previous one.
    pub fn open_chapter(&mut self, study_id: &str, chapter_id: &str) -> Result<&Chapter, LibraryError> {
        self.chapter(study_id, chapter_id)?;
        let same = self
            .open
            .as_ref()
            .is_some_and(|o| o.study_id == study_id && o.chapter_id == chapter_id);
        if !same {
            self.save_open_chapter()?;
            self.open = Some(OpenChapter {
                study_id: study_id.to_string(),
                chapter_id: chapter_id.to_string(),
                dirty: false,
            });
            tracing::debug!(study = %study_id, chapter = %chapter_id, "Chapter opened");
        }
        self.chapter(study_id, chapter_id)
    }

    /// `(study id, chapter id)` of the open chapter.
    pub fn open_chapter_ids(&self) -> Option<(&str, &str)> {
        self.open
            .as_ref()
            .map(|o| (o.study_id.as_str(), o.chapter_id.as_str()))
    }

    pub fn current_chapter(&self) -> Result<&Chapter, LibraryError> {
        let (study_id, chapter_id) = self.open_chapter_ids().ok_or(LibraryError::NoOpenChapter)?;
        self.chapter(study_id, chapter_id)
    }

    pub fn save_open_chapter(&mut self) -> Result<(), LibraryError> {
        if self.open.as_ref().is_some_and(|o| o.dirty) {
            self.persist_studies()?;
            if let Some(open) = self.open.as_mut() {
                open.dirty = false;
            }
        }
        Ok(())
    }

    pub fn close_chapter(&mut self) -> Result<(), LibraryError> {
        self.save_open_chapter()?;
        self.open = None;
        Ok(())
    }

    fn current_chapter_mut(&mut self) -> Result<&mut Chapter, LibraryError> {
        let open = self.open.as_mut().ok_or(LibraryError::NoOpenChapter)?;
        let study = self
            .studies
            .iter_mut()
            .find(|s| s.id == open.study_id)
            .ok_or_else(|| LibraryError::StudyNotFound(open.study_id.clone()))?;
        let chapter = study.chapter_mut(&open.chapter_id)?;
        open.dirty = true;
        chapter.touch();
        Ok(chapter)
    }

    fn add_move(
        &mut self,
        parent_id: Option<&str>,
        play: impl FnOnce(&mut ShakmatyEngine) -> Result<PlayedMove, RulesError>,
    ) -> Result<String, LibraryError> {
        let game = &mut self.current_chapter_mut()?.game;
        let parent = parent_id.map(|id| game.tree.resolve_id(id)).transpose()?;
        let fen = match parent {
            Some(p) => game.tree.node(p)?.fen.clone(),
            None => game.initial_fen.clone(),
        };
        let mut engine = ShakmatyEngine::from_fen(&fen)?;
        let played = play(&mut engine)?;
        let node = game.tree.insert_move(parent, played.mv, played.fen)?;
        Ok(game.tree.node(node)?.id.clone())
    }

    /// Play a from/to move after `parent_id` (or from the start position).
    /// Returns the id of the new or already existing node.
    pub fn play_move(
        &mut self,
        parent_id: Option<&str>,
        attempt: &MoveAttempt,
    ) -> Result<String, LibraryError> {
        self.add_move(parent_id, |engine| engine.play(attempt))
    }

    pub fn play_san(&mut self, parent_id: Option<&str>, san: &str) -> Result<String, LibraryError> {
        self.add_move(parent_id, |engine| engine.play_san(san))
    }

    /// Make the node the main line among its siblings; roots move to the
    /// front.
    pub fn promote(&mut self, node_id: &str) -> Result<(), LibraryError> {
        let tree = &mut self.current_chapter_mut()?.game.tree;
        let node = tree.resolve_id(node_id)?;
        tree.promote_root(node)?;
        Ok(())
    }

    pub fn prune(&mut self, node_id: &str) -> Result<usize, LibraryError> {
        let tree = &mut self.current_chapter_mut()?.game.tree;
        let node = tree.resolve_id(node_id)?;
        Ok(tree.prune_subtree(node)?)
    }

    pub fn set_comment(&mut self, node_id: &str, comment: Option<String>) -> Result<(), LibraryError> {
        let tree = &mut self.current_chapter_mut()?.game.tree;
        let node = tree.resolve_id(node_id)?;
        tree.set_comment(node, comment)?;
        Ok(())
    }

    /// Replace the open chapter's tree with its main line, without comments.
    pub fn clear_variations(&mut self) -> Result<(), LibraryError> {
        let game = &mut self.current_chapter_mut()?.game;
        game.tree = game.tree.clear_variations()?;
        Ok(())
    }

    // ---- Lines ----

    pub fn lines(&self, study_id: &str, chapter_ids: &[String]) -> Result<Vec<StudyLine>, LibraryError> {
        Ok(extract_study_lines(self.study(study_id)?, chapter_ids))
    }

    pub fn configuration(
        &self,
        study_id: &str,
        chapter_ids: &[String],
    ) -> Result<StudyConfiguration, LibraryError> {
        Ok(StudyConfiguration::new(self.study(study_id)?, chapter_ids))
    }

    // ---- Annotations ----

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn annotations_for(&self, fen: &str) -> Option<&PositionAnnotations> {
        self.annotations.get(&position_key(fen))
    }

    pub fn toggle_arrow(&mut self, fen: &str, arrow: Arrow) -> Result<bool, LibraryError> {
        let present = self.annotations.toggle_arrow(&position_key(fen), arrow);
        self.persist_annotations()?;
        Ok(present)
    }

    pub fn toggle_highlight(&mut self, fen: &str, highlight: Highlight) -> Result<bool, LibraryError> {
        let present = self.annotations.toggle_highlight(&position_key(fen), highlight);
        self.persist_annotations()?;
        Ok(present)
    }

    pub fn clear_annotations(&mut self, fen: &str) -> Result<(), LibraryError> {
        if self.annotations.clear(&position_key(fen)).is_some() {
            self.persist_annotations()?;
        }
        Ok(())
    }
}
