//! Training session engine.
//!
//! A session drills a shuffled queue of lines. Plies of the side the user is
//! not playing are auto-played; user plies are judged by exact from/to/
//! promotion equality with the tree. After a scored move the session hands
//! out a [`Scheduled`] continuation instead of running it: the caller waits
//! for the pacing delay (or not, in tests) and calls [`TrainingSession::resume`]
//! with the ticket. Tickets from cancelled continuations are ignored.
//!
//! ```text
//! Idle -> LineSetup -> AutoPlaying -> AwaitingUserMove -> Evaluating -> AutoPlaying ...
//!                                          ^   | incorrect (retry / restart)
//!                                          +---+
//! ... -> LineComplete -> LineSetup (next line) | SessionComplete
//! ```

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::TrainingError;
use crate::lines::{extract_study_lines, filter_lines, line_preview, LineFilter, StudyLine};
use crate::model::{Color, Move, MoveAttempt};
use crate::rules::RulesEngine;
use crate::study::Study;

pub const DEFAULT_AUTO_PLAY_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_NEXT_LINE_DELAY: Duration = Duration::from_millis(1200);

/// Which chapters and lines a training run uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyConfiguration {
    pub selected_chapter_ids: Vec<String>,
    pub lines: Vec<StudyLine>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StudyConfiguration {
    pub fn new(study: &Study, chapter_ids: &[String]) -> Self {
        Self {
            selected_chapter_ids: chapter_ids.to_vec(),
            lines: extract_study_lines(study, chapter_ids),
            max_depth: None,
            tags: Vec::new(),
        }
    }

    /// Returns false when no line has this id.
    pub fn set_line_enabled(&mut self, line_id: &str, enabled: bool) -> bool {
        match self.lines.iter_mut().find(|l| l.id == line_id) {
            Some(line) => {
                line.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn set_all_enabled(&mut self, enabled: bool) {
        for line in &mut self.lines {
            line.enabled = enabled;
        }
    }

    pub fn filter(&self) -> LineFilter {
        LineFilter {
            max_depth: self.max_depth,
            only_enabled: true,
            tags: self.tags.clone(),
        }
    }

    /// Enabled lines passing the depth and tag filters.
    pub fn training_lines(&self) -> Vec<StudyLine> {
        filter_lines(&self.lines, &self.filter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    LineSetup,
    AutoPlaying,
    #[serde(rename_all = "camelCase")]
    AwaitingUserMove {
        incorrect_shown: bool,
    },
    /// A correct move was scored; the auto-play continuation is pending.
    Evaluating,
    LineComplete,
    SessionComplete,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Continuation {
    /// Play the opponent's replies after a correct move.
    AutoPlay,
    /// Leave a completed line for the next one in the queue.
    NextLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduled {
    pub ticket: u64,
    pub action: Continuation,
    pub delay_ms: u64,
}

impl Scheduled {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub correct_moves: u32,
    pub incorrect_moves: u32,
    pub completed_lines: u32,
    pub total_lines: u32,
}

impl Progress {
    /// correct / (correct + incorrect), 0 when nothing was attempted.
    pub fn accuracy(&self) -> f64 {
        let attempts = self.correct_moves + self.incorrect_moves;
        if attempts == 0 {
            0.0
        } else {
            self.correct_moves as f64 / attempts as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "camelCase")]
pub enum AttemptOutcome {
    Correct {
        played: Move,
    },
    /// `played` is `None` when the attempt was illegal and the board did not
    /// change.
    Incorrect {
        expected: Move,
        played: Option<Move>,
    },
}

impl AttemptOutcome {
    pub fn is_correct(&self) -> bool {
        matches!(self, AttemptOutcome::Correct { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub auto_play_delay: Duration,
    pub next_line_delay: Duration,
    /// Fixed shuffle seed; random when `None`.
    pub seed: Option<u64>,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            auto_play_delay: DEFAULT_AUTO_PLAY_DELAY,
            next_line_delay: DEFAULT_NEXT_LINE_DELAY,
            seed: None,
        }
    }
}

/// Serializable view of a session for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub progress: Progress,
    pub accuracy: f64,
    pub line_number: usize,
    pub line_id: Option<String>,
    pub chapter_name: Option<String>,
    pub preview: Option<String>,
    pub orientation: Option<Color>,
    pub move_index: usize,
    pub moves_played: Vec<String>,
    pub fen: String,
    pub pending: Option<Scheduled>,
}

pub struct TrainingSession<E: RulesEngine> {
    engine: E,
    queue: Vec<StudyLine>,
    line_index: usize,
    move_index: usize,
    moves_played: Vec<Move>,
    state: SessionState,
    progress: Progress,
    fen_before_attempt: Option<String>,
    pending: Option<Scheduled>,
    next_ticket: u64,
    started: bool,
    options: TrainingOptions,
}

impl<E: RulesEngine> TrainingSession<E> {
    /// Takes ownership of the engine for the session's lifetime. Disabled
    /// and empty lines are dropped, the rest shuffled once.
    pub fn new(
        engine: E,
        lines: Vec<StudyLine>,
        options: TrainingOptions,
    ) -> Result<Self, TrainingError> {
        let mut queue: Vec<StudyLine> = lines
            .into_iter()
            .filter(|l| l.enabled && !l.path.is_empty())
            .collect();
        if queue.is_empty() {
            return Err(TrainingError::NoLines);
        }

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        queue.shuffle(&mut rng);

        let progress = Progress {
            total_lines: queue.len() as u32,
            ..Progress::default()
        };

        Ok(Self {
            engine,
            queue,
            line_index: 0,
            move_index: 0,
            moves_played: Vec::new(),
            state: SessionState::Idle,
            progress,
            fen_before_attempt: None,
            pending: None,
            next_ticket: 0,
            started: false,
            options,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn queue(&self) -> &[StudyLine] {
        &self.queue
    }

    pub fn current_line(&self) -> Option<&StudyLine> {
        match self.state {
            SessionState::Idle | SessionState::SessionComplete => None,
            _ => self.queue.get(self.line_index),
        }
    }

    pub fn move_index(&self) -> usize {
        self.move_index
    }

    pub fn moves_played(&self) -> &[Move] {
        &self.moves_played
    }

    pub fn pending(&self) -> Option<Scheduled> {
        self.pending
    }

    pub fn fen(&self) -> String {
        self.engine.fen()
    }

    /// The move the user is expected to play next.
    pub fn hint(&self) -> Option<&Move> {
        match self.state {
            SessionState::AwaitingUserMove { .. } => self
                .queue
                .get(self.line_index)
                .and_then(|l| l.path.get(self.move_index))
                .map(|s| &s.mv),
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> TrainingError {
        TrainingError::InvalidState {
            action,
            state: self.state.to_string(),
        }
    }

    pub fn start(&mut self) -> Result<SessionState, TrainingError> {
        if self.started || self.state != SessionState::Idle {
            return Err(self.invalid("start"));
        }
        self.started = true;
        tracing::info!(lines = self.queue.len(), "Training session started");
        self.setup_line()?;
        Ok(self.state)
    }

    fn schedule(&mut self, action: Continuation) -> Scheduled {
        self.next_ticket += 1;
        let delay = match action {
            Continuation::AutoPlay => self.options.auto_play_delay,
            Continuation::NextLine => self.options.next_line_delay,
        };
        let scheduled = Scheduled {
            ticket: self.next_ticket,
            action,
            delay_ms: delay.as_millis() as u64,
        };
        self.pending = Some(scheduled);
        scheduled
    }

    fn setup_line(&mut self) -> Result<(), TrainingError> {
        self.state = SessionState::LineSetup;
        self.pending = None;
        self.fen_before_attempt = None;
        self.move_index = 0;
        self.moves_played.clear();

        let line = &self.queue[self.line_index];
        self.engine
            .load(&line.start_fen)
            .map_err(|source| TrainingError::BrokenLine {
                line_id: line.id.clone(),
                source,
            })?;
        tracing::debug!(line = %line.id, depth = line.depth, "Line setup");
        self.auto_play()
    }

    fn auto_play(&mut self) -> Result<(), TrainingError> {
        self.state = SessionState::AutoPlaying;
        let line = &self.queue[self.line_index];

        while let Some(step) = line.path.get(self.move_index) {
            if step.mv.color == line.orientation {
                break;
            }
            let played = self
                .engine
                .play(&step.mv.attempt())
                .map_err(|source| TrainingError::BrokenLine {
                    line_id: line.id.clone(),
                    source,
                })?;
            self.moves_played.push(played.mv);
            self.move_index += 1;
        }

        if self.move_index >= line.path.len() {
            self.complete_line();
        } else {
            self.state = SessionState::AwaitingUserMove {
                incorrect_shown: false,
            };
        }
        Ok(())
    }

    fn complete_line(&mut self) {
        self.state = SessionState::LineComplete;
        self.progress.completed_lines += 1;
        tracing::debug!(
            completed = self.progress.completed_lines,
            total = self.progress.total_lines,
            "Line complete"
        );
        self.schedule(Continuation::NextLine);
    }

    fn advance(&mut self) -> Result<(), TrainingError> {
        self.pending = None;
        self.line_index += 1;
        if self.line_index >= self.queue.len() {
            self.state = SessionState::SessionComplete;
            tracing::info!(
                correct = self.progress.correct_moves,
                incorrect = self.progress.incorrect_moves,
                "Training session complete"
            );
            return Ok(());
        }
        self.setup_line()
    }

    /// Judge a user move against the line.
    pub fn submit_move(&mut self, attempt: &MoveAttempt) -> Result<AttemptOutcome, TrainingError> {
        if self.state != (SessionState::AwaitingUserMove { incorrect_shown: false }) {
            return Err(self.invalid("submit_move"));
        }
        let line = &self.queue[self.line_index];
        let Some(step) = line.path.get(self.move_index) else {
            return Err(self.invalid("submit_move"));
        };
        let expected = step.mv.clone();
        let fen_before = self.engine.fen();

        if expected.matches(attempt) {
            let played = self
                .engine
                .play(attempt)
                .map_err(|source| TrainingError::BrokenLine {
                    line_id: line.id.clone(),
                    source,
                })?;
            self.moves_played.push(played.mv.clone());
            self.move_index += 1;
            self.progress.correct_moves += 1;
            self.state = SessionState::Evaluating;
            self.schedule(Continuation::AutoPlay);
            return Ok(AttemptOutcome::Correct { played: played.mv });
        }

        self.progress.incorrect_moves += 1;
        let played = match self.engine.play(attempt) {
            Ok(p) => Some(p.mv),
            Err(e) => {
                tracing::debug!(attempt = %attempt, "Incorrect attempt was illegal: {e}");
                None
            }
        };
        self.fen_before_attempt = Some(fen_before);
        self.state = SessionState::AwaitingUserMove {
            incorrect_shown: true,
        };
        Ok(AttemptOutcome::Incorrect { expected, played })
    }

    /// Undo an incorrect attempt and try the same move again.
    pub fn retry_move(&mut self) -> Result<(), TrainingError> {
        if self.state != (SessionState::AwaitingUserMove { incorrect_shown: true }) {
            return Err(self.invalid("retry_move"));
        }
        if let Some(fen) = self.fen_before_attempt.take() {
            let line_id = self.queue[self.line_index].id.clone();
            self.engine
                .load(&fen)
                .map_err(|source| TrainingError::BrokenLine { line_id, source })?;
        }
        self.state = SessionState::AwaitingUserMove {
            incorrect_shown: false,
        };
        Ok(())
    }

    /// Replay the current line from its first move. Counters are kept.
    pub fn restart_line(&mut self) -> Result<(), TrainingError> {
        match self.state {
            SessionState::AwaitingUserMove { .. } | SessionState::Evaluating => self.setup_line(),
            _ => Err(self.invalid("restart_line")),
        }
    }

    /// Abandon the current line without crediting it.
    pub fn skip_line(&mut self) -> Result<(), TrainingError> {
        match self.state {
            SessionState::AwaitingUserMove { .. }
            | SessionState::Evaluating
            | SessionState::LineComplete => self.advance(),
            _ => Err(self.invalid("skip_line")),
        }
    }

    /// Run the continuation identified by `ticket`. Returns false when the
    /// ticket is stale (cancelled, already run, or the session was exited).
    pub fn resume(&mut self, ticket: u64) -> Result<bool, TrainingError> {
        let Some(scheduled) = self.pending.filter(|p| p.ticket == ticket) else {
            return Ok(false);
        };
        self.pending = None;
        match scheduled.action {
            Continuation::AutoPlay => self.auto_play()?,
            Continuation::NextLine => self.advance()?,
        }
        Ok(true)
    }

    /// Run whatever is pending right away.
    pub fn resume_pending(&mut self) -> Result<bool, TrainingError> {
        match self.pending {
            Some(p) => self.resume(p.ticket),
            None => Ok(false),
        }
    }

    /// Tear the session down; pending continuations become no-ops.
    pub fn exit(&mut self) {
        self.pending = None;
        self.fen_before_attempt = None;
        self.state = SessionState::Idle;
        tracing::info!(
            completed = self.progress.completed_lines,
            total = self.progress.total_lines,
            "Training session exited"
        );
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let line = self.current_line();
        SessionSnapshot {
            state: self.state,
            progress: self.progress,
            accuracy: self.progress.accuracy(),
            line_number: (self.line_index + 1).min(self.queue.len()),
            line_id: line.map(|l| l.id.clone()),
            chapter_name: line.map(|l| l.chapter_name.clone()),
            preview: line.map(|l| line_preview(l, 8)),
            orientation: line.map(|l| l.orientation),
            move_index: self.move_index,
            moves_played: self.moves_played.iter().map(|m| m.san.clone()).collect(),
            fen: self.engine.fen(),
            pending: self.pending,
        }
    }
}
