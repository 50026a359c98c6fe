//! Rules-engine seam. Everything above this module only needs to load a
//! position, try a move and read back SAN/FEN; the default implementation
//! is backed by shakmaty.

use shakmaty::{
    fen::Fen, san::SanPlus, uci::UciMove, CastlingMode, Chess, EnPassantMode, Position, Square,
};

use crate::error::RulesError;
use crate::model::{Color, Move, MoveAttempt, Promotion};

/// A move accepted by the engine together with the position it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub mv: Move,
    pub fen: String,
}

pub trait RulesEngine {
    /// Replace the current position.
    fn load(&mut self, fen: &str) -> Result<(), RulesError>;

    /// FEN of the current position.
    fn fen(&self) -> String;

    fn turn(&self) -> Color;

    /// Play a from/to(/promotion) move. The position is unchanged on error.
    fn play(&mut self, attempt: &MoveAttempt) -> Result<PlayedMove, RulesError>;

    /// Play a move written in SAN. The position is unchanged on error.
    fn play_san(&mut self, san: &str) -> Result<PlayedMove, RulesError>;
}

#[derive(Debug, Clone, Default)]
pub struct ShakmatyEngine {
    pos: Chess,
}

impl ShakmatyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let mut engine = Self::new();
        engine.load(fen)?;
        Ok(engine)
    }

    fn apply(&mut self, mv: shakmaty::Move) -> Result<PlayedMove, RulesError> {
        let color = Color::from(self.pos.turn());

        // Standard castling mode reports castles as king from/to (e1g1).
        let (from, to, promotion) = match mv.to_uci(CastlingMode::Standard) {
            UciMove::Normal {
                from,
                to,
                promotion,
            } => (from, to, promotion.and_then(Promotion::from_role)),
            other => return Err(RulesError::Unsupported(other.to_string())),
        };

        let san = SanPlus::from_move_and_play_unchecked(&mut self.pos, mv);

        Ok(PlayedMove {
            mv: Move {
                from: from.to_string(),
                to: to.to_string(),
                san: san.to_string(),
                color,
                promotion,
            },
            fen: self.fen(),
        })
    }
}

fn parse_square(s: &str) -> Result<Square, RulesError> {
    s.parse::<Square>()
        .map_err(|_| RulesError::InvalidSquare(s.to_string()))
}

impl RulesEngine for ShakmatyEngine {
    fn load(&mut self, fen: &str) -> Result<(), RulesError> {
        let invalid = |reason: String| RulesError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };
        let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
        self.pos = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))?;
        Ok(())
    }

    fn fen(&self) -> String {
        Fen::from_position(&self.pos, EnPassantMode::Legal).to_string()
    }

    fn turn(&self) -> Color {
        self.pos.turn().into()
    }

    fn play(&mut self, attempt: &MoveAttempt) -> Result<PlayedMove, RulesError> {
        let uci = UciMove::Normal {
            from: parse_square(&attempt.from)?,
            to: parse_square(&attempt.to)?,
            promotion: attempt.promotion.map(Promotion::role),
        };
        let mv = uci
            .to_move(&self.pos)
            .map_err(|_| RulesError::IllegalMove(attempt.to_string()))?;
        self.apply(mv)
    }

    fn play_san(&mut self, san: &str) -> Result<PlayedMove, RulesError> {
        let parsed: SanPlus = san
            .parse()
            .map_err(|_| RulesError::InvalidSan(san.to_string()))?;
        let mv = parsed
            .san
            .to_move(&self.pos)
            .map_err(|_| RulesError::IllegalMove(san.to_string()))?;
        self.apply(mv)
    }
}
