//! Core types for the rematch chess server.
//!
//! This module defines the fundamental enums shared across the server
//! (sides, game modes, session status, game outcomes) together with the
//! JSON request/response types of the REST API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use utoipa::{IntoParams, ToSchema};

// ---------------------------------------------------------------------------
// Side & mode
// ---------------------------------------------------------------------------

/// The color (side) of a chess player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Returns the opposite side.
    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

impl From<cozy_chess::Color> for Side {
    fn from(c: cozy_chess::Color) -> Self {
        match c {
            cozy_chess::Color::White => Side::White,
            cozy_chess::Color::Black => Side::Black,
        }
    }
}

impl From<Side> for cozy_chess::Color {
    fn from(s: Side) -> Self {
        match s {
            Side::White => cozy_chess::Color::White,
            Side::Black => cozy_chess::Color::Black,
        }
    }
}

/// How a game is played: two humans, human vs engine, or engine vs engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Two human players.
    Pvp,
    /// Human plays White, an engine plays Black.
    Pvai,
    /// Engines on both sides; the game runs itself.
    Aivai,
}

impl GameMode {
    /// Parses the wire form ("pvp", "pvai", "aivai").
    pub fn parse(s: &str) -> Option<GameMode> {
        match s {
            "pvp" => Some(GameMode::Pvp),
            "pvai" => Some(GameMode::Pvai),
            "aivai" => Some(GameMode::Aivai),
            _ => None,
        }
    }

    /// Returns `true` if the given side is engine-controlled in this mode.
    pub fn ai_plays(self, side: Side) -> bool {
        match self {
            GameMode::Pvp => false,
            GameMode::Pvai => side == Side::Black,
            GameMode::Aivai => true,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Pvp => write!(f, "pvp"),
            GameMode::Pvai => write!(f, "pvai"),
            GameMode::Aivai => write!(f, "aivai"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session status & outcome
// ---------------------------------------------------------------------------

/// Lifecycle state of a game session.
///
/// A session starts `Waiting` (or `InProgress` for AI-vs-AI, which plays
/// itself from creation), becomes `InProgress` on the first applied move,
/// and reaches `Finished` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    InProgress,
    Finished,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Waiting => write!(f, "waiting"),
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Finished => write!(f, "finished"),
        }
    }
}

/// How a finished game ended.
///
/// `AiError` is a distinguished sentinel for engine failures; it is not a
/// chess result and settles no score tallies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The named participant won.
    Winner(String),
    /// Drawn game.
    Draw,
    /// An engine failed to produce a usable move.
    AiError,
}

/// The winner string reported for engine failures.
pub const AI_ERROR_OUTCOME: &str = "AI error";

impl Outcome {
    /// The winner label shown to clients ("Draw", "AI error", or a name).
    pub fn label(&self) -> String {
        match self {
            Outcome::Winner(name) => name.clone(),
            Outcome::Draw => "Draw".to_string(),
            Outcome::AiError => AI_ERROR_OUTCOME.to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Score tallies
// ---------------------------------------------------------------------------

/// Win/loss/draw counters for one participant. Monotonically non-decreasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerScore {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for starting a new game.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StartGameRequest {
    /// Game mode: "pvp", "pvai" or "aivai".
    pub mode: String,
    /// Name of player 1 (White). Defaults to "Player1".
    pub player1: Option<String>,
    /// Name of player 2 (Black). Defaults to "Player2" for pvp, "AI" otherwise.
    pub player2: Option<String>,
    /// Engine identifier for White (aivai only).
    pub ai_white: Option<String>,
    /// Engine identifier for Black (pvai and aivai).
    pub ai_black: Option<String>,
}

/// Request body for submitting a move.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MoveRequest {
    /// The game to move in.
    pub game_id: String,
    /// Starting square of the piece (e.g. "e2").
    pub from_square: String,
    /// Target square of the piece (e.g. "e4").
    pub to_square: String,
    /// Promotion piece for pawns reaching the last rank: "q", "r", "b" or "n".
    pub promotion: Option<String>,
}

/// Request body for surrendering a game.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SurrenderRequest {
    /// The game to surrender.
    pub game_id: String,
    /// Which participant surrenders: 1 (player1) or 2 (player2).
    pub player: u8,
}

/// Request body for stopping an AI-vs-AI game.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StopRequest {
    /// The game to stop and remove.
    pub game_id: String,
}

/// Query parameters for state and score lookups.
#[derive(Debug, Deserialize, IntoParams)]
pub struct GameQuery {
    /// Unique game identifier (UUID), or a raw session key for score lookups.
    pub game_id: String,
}

/// Query parameters for selecting a square.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SelectQuery {
    /// Unique game identifier (UUID).
    pub game_id: String,
    /// The square whose legal moves are requested (e.g. "e2").
    pub square: String,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Response returned when a new game is created.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartGameResponse {
    /// The unique identifier for the newly created game.
    pub game_id: String,
    /// The resolved name of player 2 (defaulted for AI opponents).
    pub player2: String,
}

/// The full observable state of a game session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GameStateResponse {
    /// The game's unique identifier.
    pub game_id: String,
    /// Name of player 1 (White).
    pub player1: String,
    /// Name of player 2 (Black).
    pub player2: String,
    /// Game mode.
    pub mode: GameMode,
    /// Current position in FEN notation.
    pub board: String,
    /// Side to move.
    pub turn: Side,
    /// All applied moves in square-pair notation (e.g. "e2e4", "e7e8q").
    pub moves: Vec<String>,
    /// Lifecycle state of the session.
    pub status: SessionStatus,
    /// Whether the game has finished.
    pub game_over: bool,
    /// Winner name, "Draw", or "AI error"; null while the game runs.
    pub winner: Option<String>,
    /// True while an engine is computing its move for this game.
    pub ai_thinking: bool,
    /// Piece symbols captured by player 1, in capture order.
    pub captured_by_player1: Vec<String>,
    /// Piece symbols captured by player 2, in capture order.
    pub captured_by_player2: Vec<String>,
}

/// Legal moves available from a selected square.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectResponse {
    /// Moves in square-pair notation whose origin is the selected square.
    pub possible_moves: Vec<String>,
}

/// Running score for one matchup.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScoreResponse {
    /// The ledger key identifying this matchup.
    pub session_key: String,
    /// Name of player 1.
    pub player1: String,
    /// Name of player 2.
    pub player2: String,
    /// Headline score, "<player1 wins> - <player2 wins>".
    pub score: String,
    /// Per-participant tallies, keyed by name.
    pub scores: HashMap<String, PlayerScore>,
}

/// Global win/loss/draw totals across all matchups, keyed by player name.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlayerTotalsResponse {
    pub players: HashMap<String, PlayerScore>,
}

/// Summary information about a single game.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GameSummary {
    /// The game's unique identifier.
    pub game_id: String,
    /// Game mode.
    pub mode: GameMode,
    /// Name of player 1.
    pub player1: String,
    /// Name of player 2.
    pub player2: String,
    /// Lifecycle state of the session.
    pub status: SessionStatus,
    /// Winner label, if the game has finished.
    pub winner: Option<String>,
    /// Number of applied moves.
    pub move_count: usize,
}

/// A list of all games currently held by the server.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GameListResponse {
    pub games: Vec<GameSummary>,
    pub total: usize,
}

/// The engine identifiers accepted in start requests.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// Error response for the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!(GameMode::parse("pvp"), Some(GameMode::Pvp));
        assert_eq!(GameMode::parse("pvai"), Some(GameMode::Pvai));
        assert_eq!(GameMode::parse("aivai"), Some(GameMode::Aivai));
        assert_eq!(GameMode::parse("PVP"), None);
        assert_eq!(GameMode::parse("chess"), None);
    }

    #[test]
    fn test_ai_plays() {
        assert!(!GameMode::Pvp.ai_plays(Side::White));
        assert!(!GameMode::Pvp.ai_plays(Side::Black));
        assert!(!GameMode::Pvai.ai_plays(Side::White));
        assert!(GameMode::Pvai.ai_plays(Side::Black));
        assert!(GameMode::Aivai.ai_plays(Side::White));
        assert!(GameMode::Aivai.ai_plays(Side::Black));
    }

    #[test]
    fn test_outcome_label() {
        assert_eq!(Outcome::Winner("Alice".into()).label(), "Alice");
        assert_eq!(Outcome::Draw.label(), "Draw");
        assert_eq!(Outcome::AiError.label(), "AI error");
    }
}
