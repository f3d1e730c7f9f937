//! Move oracle: the seam between game sessions and AI engines.
//!
//! A [`MoveOracle`] is anything that, given a position and an engine
//! identifier, asynchronously produces a move (or fails). The scheduler
//! never trusts an oracle: returned moves are re-validated against the
//! legal-move set before they touch a game.
//!
//! The built-in oracle ships three deliberately simple engines. Anything
//! stronger (a UCI subprocess, a model server) plugs in behind the same
//! trait.

use async_trait::async_trait;
use cozy_chess::{Move, Piece};
use rand::Rng;
use std::time::Duration;

use crate::rules::{GameResult, Position};

/// Engine identifiers accepted in start requests.
pub const BUILTIN_ENGINES: &[&str] = &["random", "greedy", "minimax"];

/// Engine used when a mode requires an AI and the request names none.
pub const DEFAULT_ENGINE: &str = "greedy";

/// Returns `true` if `name` is a known engine identifier.
pub fn is_known_engine(name: &str) -> bool {
    BUILTIN_ENGINES.contains(&name)
}

/// An engine failure. The scheduler turns this into the "AI error" game
/// outcome; it never reaches an HTTP caller directly.
#[derive(Debug, thiserror::Error)]
#[error("engine '{engine}' failed: {reason}")]
pub struct OracleError {
    pub engine: String,
    pub reason: String,
}

/// Asynchronous source of AI moves.
///
/// `best_move` may take arbitrary wall-clock time; callers bound it with a
/// timeout. `Ok(None)` means the engine found no move, which callers treat
/// the same as an error.
#[async_trait]
pub trait MoveOracle: Send + Sync {
    async fn best_move(
        &self,
        position: Position,
        engine: &str,
    ) -> Result<Option<Move>, OracleError>;
}

// ---------------------------------------------------------------------------
// Built-in engines
// ---------------------------------------------------------------------------

/// The oracle backing the built-in engine identifiers.
///
/// `think_time` adds artificial latency per request so clients can observe
/// the thinking state; set it to zero in tests.
pub struct BuiltinOracle {
    think_time: Duration,
}

impl BuiltinOracle {
    pub fn new(think_time: Duration) -> Self {
        Self { think_time }
    }
}

#[async_trait]
impl MoveOracle for BuiltinOracle {
    async fn best_move(
        &self,
        position: Position,
        engine: &str,
    ) -> Result<Option<Move>, OracleError> {
        if !self.think_time.is_zero() {
            tokio::time::sleep(self.think_time).await;
        }

        let picked = match engine {
            "random" => pick_random(&position.legal_moves()),
            "greedy" => pick_greedy(&position),
            "minimax" => pick_minimax(&position),
            other => {
                return Err(OracleError {
                    engine: other.to_string(),
                    reason: "not a built-in engine".to_string(),
                });
            }
        };

        Ok(picked)
    }
}

fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 100,
        Piece::Knight => 320,
        Piece::Bishop => 330,
        Piece::Rook => 500,
        Piece::Queen => 900,
        Piece::King => 0,
    }
}

/// Immediate material swing of a move: captured value plus promotion gain.
fn move_gain(position: &Position, mv: Move) -> i32 {
    let mut gain = position.captured_by(mv).map(piece_value).unwrap_or(0);
    if let Some(piece) = mv.promotion {
        gain += piece_value(piece) - piece_value(Piece::Pawn);
    }
    gain
}

fn pick_random(moves: &[Move]) -> Option<Move> {
    if moves.is_empty() {
        return None;
    }
    let mut rng = rand::rng();
    Some(moves[rng.random_range(0..moves.len())])
}

/// Takes the biggest immediate material gain; random among equals.
fn pick_greedy(position: &Position) -> Option<Move> {
    let moves = position.legal_moves();
    let best = moves.iter().map(|&mv| move_gain(position, mv)).max()?;
    let top: Vec<Move> = moves
        .into_iter()
        .filter(|&mv| move_gain(position, mv) == best)
        .collect();
    pick_random(&top)
}

/// Two-ply material search: own gain minus the opponent's best reply gain,
/// with mate scored above everything.
fn pick_minimax(position: &Position) -> Option<Move> {
    const MATE: i32 = 100_000;

    let moves = position.legal_moves();
    if moves.is_empty() {
        return None;
    }

    let mut scored = Vec::with_capacity(moves.len());
    for &mv in &moves {
        let gain = move_gain(position, mv);
        let mut after = position.clone();
        after.apply(mv);
        let score = match after.result() {
            Some(GameResult::Draw) => 0,
            Some(_) => MATE,
            None => {
                let reply = after
                    .legal_moves()
                    .into_iter()
                    .map(|r| move_gain(&after, r))
                    .max()
                    .unwrap_or(0);
                gain - reply
            }
        };
        scored.push((score, mv));
    }

    let best = scored.iter().map(|(score, _)| *score).max()?;
    let top: Vec<Move> = scored
        .into_iter()
        .filter(|(score, _)| *score == best)
        .map(|(_, mv)| mv)
        .collect();
    pick_random(&top)
}

// ---------------------------------------------------------------------------
// Test oracles
// ---------------------------------------------------------------------------

/// Plays a fixed move script, then reports no move. Illegal scripted moves
/// also come back as no move, exercising the AI-failure path.
#[cfg(test)]
pub struct ScriptedOracle {
    moves: std::sync::Mutex<std::collections::VecDeque<String>>,
}

#[cfg(test)]
impl ScriptedOracle {
    pub fn new(moves: &[&str]) -> Self {
        Self {
            moves: std::sync::Mutex::new(moves.iter().map(|m| m.to_string()).collect()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl MoveOracle for ScriptedOracle {
    async fn best_move(
        &self,
        position: Position,
        _engine: &str,
    ) -> Result<Option<Move>, OracleError> {
        let next = self.moves.lock().unwrap().pop_front();
        let Some(text) = next else {
            return Ok(None);
        };
        let from = crate::rules::parse_square(&text[0..2]).expect("scripted from square");
        let to = crate::rules::parse_square(&text[2..4]).expect("scripted to square");
        let promotion = text.chars().nth(4).and_then(crate::rules::parse_piece);
        Ok(position.resolve(from, to, promotion).ok())
    }
}

/// Never answers. Used to test cancellation of in-flight oracle calls.
#[cfg(test)]
pub struct StalledOracle;

#[cfg(test)]
#[async_trait]
impl MoveOracle for StalledOracle {
    async fn best_move(
        &self,
        _position: Position,
        _engine: &str,
    ) -> Result<Option<Move>, OracleError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}
