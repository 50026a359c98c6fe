//! Plain chess records shared by every module: colors, moves and move attempts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Header tags collected from a PGN import (`[Key "Value"]`).
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn other(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }

    /// Side to move from the second field of a FEN ("w" / "b").
    pub fn from_fen_turn(field: &str) -> Option<Self> {
        match field {
            "w" => Some(Color::White),
            "b" => Some(Color::Black),
            _ => None,
        }
    }
}

impl From<shakmaty::Color> for Color {
    fn from(c: shakmaty::Color) -> Self {
        match c {
            shakmaty::Color::White => Color::White,
            shakmaty::Color::Black => Color::Black,
        }
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Color::White),
            "black" | "b" => Ok(Color::Black),
            other => Err(format!("Color must be 'white' or 'black', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Promotion {
    #[serde(rename = "q")]
    Queen,
    #[serde(rename = "r")]
    Rook,
    #[serde(rename = "b")]
    Bishop,
    #[serde(rename = "n")]
    Knight,
}

impl Promotion {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'q' => Some(Promotion::Queen),
            'r' => Some(Promotion::Rook),
            'b' => Some(Promotion::Bishop),
            'n' => Some(Promotion::Knight),
            _ => None,
        }
    }

    pub fn char(self) -> char {
        match self {
            Promotion::Queen => 'q',
            Promotion::Rook => 'r',
            Promotion::Bishop => 'b',
            Promotion::Knight => 'n',
        }
    }

    pub fn role(self) -> shakmaty::Role {
        match self {
            Promotion::Queen => shakmaty::Role::Queen,
            Promotion::Rook => shakmaty::Role::Rook,
            Promotion::Bishop => shakmaty::Role::Bishop,
            Promotion::Knight => shakmaty::Role::Knight,
        }
    }

    pub fn from_role(role: shakmaty::Role) -> Option<Self> {
        match role {
            shakmaty::Role::Queen => Some(Promotion::Queen),
            shakmaty::Role::Rook => Some(Promotion::Rook),
            shakmaty::Role::Bishop => Some(Promotion::Bishop),
            shakmaty::Role::Knight => Some(Promotion::Knight),
            _ => None,
        }
    }
}

/// One ply: squares in algebraic notation (castling is king from/to),
/// SAN with check suffix, and the side that played it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub from: String,
    pub to: String,
    pub san: String,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<Promotion>,
}

impl Move {
    /// Exact (from, to, promotion) equality. An absent promotion only equals
    /// an absent promotion.
    pub fn matches(&self, attempt: &MoveAttempt) -> bool {
        self.from == attempt.from && self.to == attempt.to && self.promotion == attempt.promotion
    }

    pub fn attempt(&self) -> MoveAttempt {
        MoveAttempt {
            from: self.from.clone(),
            to: self.to.clone(),
            promotion: self.promotion,
        }
    }
}

/// A candidate move as submitted by a user or an editing surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAttempt {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<Promotion>,
}

impl MoveAttempt {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.trim().to_ascii_lowercase(),
            to: to.trim().to_ascii_lowercase(),
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, promotion: Promotion) -> Self {
        self.promotion = Some(promotion);
        self
    }

    /// Parse coordinate notation such as `e2e4` or `e7e8q`.
    pub fn from_uci(uci: &str) -> Option<Self> {
        let uci = uci.trim();
        if !(4..=5).contains(&uci.len()) || !uci.is_ascii() {
            return None;
        }
        let mut attempt = Self::new(&uci[0..2], &uci[2..4]);
        if let Some(c) = uci[4..].chars().next() {
            attempt.promotion = Some(Promotion::from_char(c)?);
        }
        Some(attempt)
    }
}

impl fmt::Display for MoveAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{}", p.char())?;
        }
        Ok(())
    }
}

/// Piece placement + side to move. Castling rights, en passant and move
/// counters are dropped so transpositions share a key.
pub fn position_key(fen: &str) -> String {
    fen.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_key_ignores_castling_and_counters() {
        let a = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        let b = "r3k2r/8/8/8/8/8/8/R3K2R w - - 12 40";
        assert_eq!(position_key(a), position_key(b));
        assert_eq!(position_key(a), "r3k2r/8/8/8/8/8/8/R3K2R w");
    }

    #[test]
    fn test_position_key_keeps_side_to_move() {
        let white = "8/8/8/8/8/8/8/K6k w - - 0 1";
        let black = "8/8/8/8/8/8/8/K6k b - - 0 1";
        assert_ne!(position_key(white), position_key(black));
    }

    #[test]
    fn test_move_matches_promotion_strictly() {
        let mv = Move {
            from: "e7".into(),
            to: "e8".into(),
            san: "e8=Q".into(),
            color: Color::White,
            promotion: Some(Promotion::Queen),
        };
        assert!(mv.matches(&MoveAttempt::new("e7", "e8").with_promotion(Promotion::Queen)));
        assert!(!mv.matches(&MoveAttempt::new("e7", "e8")));
        assert!(!mv.matches(&MoveAttempt::new("e7", "e8").with_promotion(Promotion::Knight)));
    }

    #[test]
    fn test_from_uci() {
        let a = MoveAttempt::from_uci("e7e8q").unwrap();
        assert_eq!(a.promotion, Some(Promotion::Queen));
        assert_eq!(a.to_string(), "e7e8q");
        assert!(MoveAttempt::from_uci("e7e8x").is_none());
        assert!(MoveAttempt::from_uci("e7").is_none());
    }
}
