//! PGN import into a move tree, driven by a `pgn_reader::Visitor`.
//!
//! The top-level sequence becomes the main line, `( ... )` blocks become
//! variations at the point of divergence and `{ ... }` comments attach to
//! the preceding move. The first move that does not resolve against the
//! current position stops the import; everything built before it is kept.
//! A result marker in the top-level sequence ends the game.

use pgn_reader::{Nag, Outcome, RawComment, RawTag, Reader, SanPlus, Skip, Visitor};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::ControlFlow;

use crate::error::TreeError;
use crate::model::{Metadata, STANDARD_START_FEN};
use crate::rules::{PlayedMove, RulesEngine, ShakmatyEngine};
use crate::tree::{MoveTree, NodeRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Number of moves successfully imported before the failure.
    pub ply: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportWarning {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub tree: MoveTree,
    pub initial_fen: String,
    pub metadata: Metadata,
    pub errors: Vec<ImportError>,
    pub warnings: Vec<ImportWarning>,
}

impl ImportResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn failed(message: String) -> Self {
        Self {
            initial_fen: STANDARD_START_FEN.to_string(),
            errors: vec![ImportError {
                message,
                token: None,
                ply: 0,
            }],
            ..Self::default()
        }
    }
}

/// Import a single game using the shakmaty rules engine.
pub fn import_pgn(text: &str) -> ImportResult {
    import_pgn_with(&mut ShakmatyEngine::new(), text)
}

/// Import the first game of `text`. Any further games are reported as a
/// warning and left alone.
pub fn import_pgn_with<E: RulesEngine>(engine: &mut E, text: &str) -> ImportResult {
    let mut importer = Importer { engine };
    let mut reader = Reader::new(text.as_bytes());

    let mut result = match reader.read_game(&mut importer) {
        Ok(Some(result)) => result,
        Ok(None) => return ImportResult::failed("No moves found in PGN".into()),
        Err(e) => return ImportResult::failed(format!("Could not read PGN: {e}")),
    };
    if let Ok(Some(_)) = reader.read_game(&mut importer) {
        result.warnings.push(ImportWarning {
            message: "Only the first game was imported".into(),
            token: None,
        });
    }
    result
}

/// Import every game of a multi-game PGN. Games are separated by a blank
/// line or a new tag section.
pub fn import_pgn_games(text: &str) -> Vec<ImportResult> {
    let mut engine = ShakmatyEngine::new();
    let mut importer = Importer {
        engine: &mut engine,
    };
    let mut reader = Reader::new(text.as_bytes());

    let mut games = Vec::new();
    loop {
        match reader.read_game(&mut importer) {
            Ok(Some(result)) => games.push(result),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(games = games.len(), "PGN reading stopped: {e}");
                games.push(ImportResult::failed(format!("Could not read PGN: {e}")));
                break;
            }
        }
    }
    games
}

/// Where the importer currently stands inside one (sub)sequence.
#[derive(Debug, Clone, Default)]
struct Cursor {
    /// Node whose position we are at; `None` is the initial position.
    at: Option<NodeRef>,
    fen: String,
    /// Position before the last move, where a following variation starts.
    before_last: Option<(Option<NodeRef>, String)>,
}

/// Movetext state of the game being imported.
#[derive(Debug, Default)]
struct GameImport {
    result: ImportResult,
    cursor: Cursor,
    stack: Vec<Cursor>,
    /// Shallowest variation depth each node was reached from.
    depth: HashMap<NodeRef, usize>,
    ply: usize,
    finished: bool,
    trailing_reported: bool,
}

impl GameImport {
    fn new(result: ImportResult) -> Self {
        let cursor = Cursor {
            at: None,
            fen: result.initial_fen.clone(),
            before_last: None,
        };
        Self {
            result,
            cursor,
            ..Self::default()
        }
    }

    fn warn(&mut self, message: &str, token: Option<String>) {
        self.result.warnings.push(ImportWarning {
            message: message.to_string(),
            token,
        });
    }

    fn fail(&mut self, message: String, token: String) -> ControlFlow<ImportResult> {
        tracing::debug!(token = %token, ply = self.ply, "PGN import stopped: {message}");
        self.result.errors.push(ImportError {
            message,
            token: Some(token),
            ply: self.ply,
        });
        ControlFlow::Break(std::mem::take(self).finish())
    }

    /// Add the move below the cursor. A move of an enclosing sequence takes
    /// the main-line flag from a sibling first created inside a variation.
    fn play(&mut self, played: PlayedMove) -> Result<(), TreeError> {
        let level = self.stack.len();
        let tree = &mut self.result.tree;
        let node = tree.insert_move(self.cursor.at, played.mv, played.fen.clone())?;

        let reached = self.depth.entry(node).or_insert(level);
        *reached = (*reached).min(level);

        let siblings = match tree.node(node)?.parent() {
            Some(parent) => tree.node(parent)?.children().to_vec(),
            None => tree.roots().to_vec(),
        };
        let flagged = siblings
            .into_iter()
            .find(|&s| tree.node(s).is_ok_and(|n| n.is_main_line));
        if let Some(flagged) = flagged.filter(|&f| f != node) {
            if self.depth.get(&flagged).is_some_and(|&d| d > level) {
                tree.promote_root(node)?;
            }
        }

        let before = std::mem::replace(&mut self.cursor.fen, played.fen);
        self.cursor.before_last = Some((self.cursor.at, before));
        self.cursor.at = Some(node);
        self.ply += 1;
        Ok(())
    }

    fn comment(&mut self, text: String) {
        match self.cursor.at {
            Some(node) => {
                if let Err(e) = self.result.tree.append_comment(node, &text) {
                    tracing::warn!(node = node.index(), "Dropping PGN comment: {e}");
                }
            }
            None if self.stack.is_empty() && self.result.tree.is_empty() => {
                if !text.is_empty() {
                    self.result.metadata.insert("Comment".into(), text);
                }
            }
            None => self.warn(
                "Comment before the first move of a variation ignored",
                Some(text),
            ),
        }
    }

    fn begin_variation(&mut self) {
        let start = match self.cursor.before_last.clone() {
            Some((at, fen)) => Cursor {
                at,
                fen,
                before_last: None,
            },
            None => {
                self.warn(
                    "Variation without a preceding move starts at the current position",
                    Some("(".into()),
                );
                Cursor {
                    at: self.cursor.at,
                    fen: self.cursor.fen.clone(),
                    before_last: None,
                }
            }
        };
        self.stack.push(std::mem::replace(&mut self.cursor, start));
    }

    fn end_variation(&mut self) {
        match self.stack.pop() {
            Some(outer) => self.cursor = outer,
            None => self.warn("Unbalanced ')' ignored", Some(")".into())),
        }
    }

    fn after_result(&mut self, token: String) {
        if !self.trailing_reported {
            self.trailing_reported = true;
            self.warn("Moves after the game result ignored", Some(token));
        }
    }

    fn finish(mut self) -> ImportResult {
        if self.result.errors.is_empty() && !self.stack.is_empty() {
            let message = format!("{} unclosed variation(s)", self.stack.len());
            self.warn(&message, None);
        }
        if self.result.errors.is_empty() && self.result.tree.is_empty() {
            self.result.errors.push(ImportError {
                message: "No moves found in PGN".into(),
                token: None,
                ply: 0,
            });
        }

        tracing::debug!(
            nodes = self.result.tree.node_count(),
            errors = self.result.errors.len(),
            warnings = self.result.warnings.len(),
            "PGN import finished"
        );
        self.result
    }
}

/// Visitor that resolves each SAN through a [`RulesEngine`].
struct Importer<'a, E> {
    engine: &'a mut E,
}

impl<E: RulesEngine> Visitor for Importer<'_, E> {
    type Tags = Metadata;
    type Movetext = GameImport;
    type Output = ImportResult;

    fn begin_tags(&mut self) -> ControlFlow<ImportResult, Metadata> {
        ControlFlow::Continue(Metadata::new())
    }

    fn tag(&mut self, tags: &mut Metadata, name: &[u8], value: RawTag<'_>) -> ControlFlow<ImportResult> {
        tags.insert(
            String::from_utf8_lossy(name).into_owned(),
            value.decode_utf8_lossy().into_owned(),
        );
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Metadata) -> ControlFlow<ImportResult, GameImport> {
        let mut result = ImportResult {
            initial_fen: STANDARD_START_FEN.to_string(),
            metadata: tags,
            ..ImportResult::default()
        };

        if let Some(fen) = result.metadata.get("FEN").cloned() {
            if let Err(e) = self.engine.load(&fen) {
                result.errors.push(ImportError {
                    message: format!("Invalid starting position: {e}"),
                    token: Some(fen),
                    ply: 0,
                });
                return ControlFlow::Break(result);
            }
            result.initial_fen = self.engine.fen();
        }
        ControlFlow::Continue(GameImport::new(result))
    }

    fn san(&mut self, game: &mut GameImport, san_plus: SanPlus) -> ControlFlow<ImportResult> {
        let san = san_plus.san.to_string();
        if game.finished {
            game.after_result(san);
            return ControlFlow::Continue(());
        }

        let played = self
            .engine
            .load(&game.cursor.fen)
            .and_then(|_| self.engine.play_san(&san));
        match played {
            Ok(played) => match game.play(played) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => game.fail(e.to_string(), san),
            },
            Err(e) => game.fail(format!("Could not play '{san}': {e}"), san),
        }
    }

    fn nag(&mut self, game: &mut GameImport, nag: Nag) -> ControlFlow<ImportResult> {
        if !game.finished {
            game.warn("NAG ignored", Some(nag.to_string()));
        }
        ControlFlow::Continue(())
    }

    fn comment(&mut self, game: &mut GameImport, comment: RawComment<'_>) -> ControlFlow<ImportResult> {
        if !game.finished {
            let text = String::from_utf8_lossy(comment.as_bytes());
            game.comment(text.split_whitespace().collect::<Vec<_>>().join(" "));
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, game: &mut GameImport) -> ControlFlow<ImportResult, Skip> {
        if game.finished {
            return ControlFlow::Continue(Skip(true));
        }
        game.begin_variation();
        ControlFlow::Continue(Skip(false))
    }

    fn end_variation(&mut self, game: &mut GameImport) -> ControlFlow<ImportResult> {
        if !game.finished {
            game.end_variation();
        }
        ControlFlow::Continue(())
    }

    fn outcome(&mut self, game: &mut GameImport, outcome: Outcome) -> ControlFlow<ImportResult> {
        if game.finished {
            return ControlFlow::Continue(());
        }
        let marker = outcome.to_string();
        if game.stack.is_empty() {
            game.finished = true;
            game.warn("Result marker ends the game", Some(marker));
        } else {
            game.warn("Result marker inside a variation ignored", Some(marker));
        }
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, game: GameImport) -> ImportResult {
        game.finish()
    }
}

fn known(metadata: &Metadata, key: &str) -> Option<String> {
    metadata
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && *v != "?" && *v != "-")
        .map(str::to_string)
}

/// Human label for an imported chapter.
pub fn chapter_name(metadata: &Metadata) -> String {
    if let (Some(white), Some(black)) = (known(metadata, "White"), known(metadata, "Black")) {
        return format!("{white} vs {black}");
    }
    if let Some(opening) = known(metadata, "Opening") {
        return match known(metadata, "Variation") {
            Some(variation) => format!("{opening}: {variation}"),
            None => opening,
        };
    }
    known(metadata, "Event").unwrap_or_else(|| "Imported Chapter".to_string())
}
