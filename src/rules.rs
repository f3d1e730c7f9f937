//! Rules-engine boundary for the rematch chess server.
//!
//! Chess legality lives entirely in the `cozy-chess` crate; this module
//! wraps it in the small surface the rest of the server consumes: an owned
//! `Position` handle with legal-move queries, move resolution from square
//! pairs, application with captured-piece reporting, and game-over
//! detection. Nothing outside this module touches `cozy_chess::Board`.
//!
//! Moves cross this boundary in square-pair notation ("e2e4", "e7e8q").
//! Castling is accepted and reported in the standard king-two-squares form
//! (e1g1), translated to and from cozy-chess's king-takes-rook encoding.

use cozy_chess::{Board, Color, File, GameStatus, Move, Piece, Rank, Square};
use std::fmt;

use crate::types::Side;

// ---------------------------------------------------------------------------
// Square & piece notation
// ---------------------------------------------------------------------------

const FILES: [File; 8] = [
    File::A,
    File::B,
    File::C,
    File::D,
    File::E,
    File::F,
    File::G,
    File::H,
];

const RANKS: [Rank; 8] = [
    Rank::First,
    Rank::Second,
    Rank::Third,
    Rank::Fourth,
    Rank::Fifth,
    Rank::Sixth,
    Rank::Seventh,
    Rank::Eighth,
];

/// Parses an algebraic square name (e.g. "e4"). Returns `None` for invalid input.
pub fn parse_square(s: &str) -> Option<Square> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
    let rank = bytes[1].wrapping_sub(b'1');
    if file < 8 && rank < 8 {
        Some(Square::new(FILES[file as usize], RANKS[rank as usize]))
    } else {
        None
    }
}

/// Formats a square as its algebraic name (e.g. "e4").
pub fn format_square(sq: Square) -> String {
    format!(
        "{}{}",
        (b'a' + sq.file() as u8) as char,
        sq.rank() as u8 + 1
    )
}

/// Parses a piece letter ("q", "R", ...). Returns `None` for invalid input.
pub fn parse_piece(c: char) -> Option<Piece> {
    match c.to_ascii_lowercase() {
        'p' => Some(Piece::Pawn),
        'n' => Some(Piece::Knight),
        'b' => Some(Piece::Bishop),
        'r' => Some(Piece::Rook),
        'q' => Some(Piece::Queen),
        'k' => Some(Piece::King),
        _ => None,
    }
}

/// Formats a piece as its lowercase letter.
pub fn format_piece(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}

/// Formats a piece owned by the given side: uppercase for White, lowercase
/// for Black (FEN convention).
pub fn piece_symbol(piece: Piece, side: Side) -> String {
    let c = format_piece(piece);
    match side {
        Side::White => c.to_ascii_uppercase().to_string(),
        Side::Black => c.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Results & errors
// ---------------------------------------------------------------------------

/// The result of a finished game, from the board's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::WhiteWins => write!(f, "1-0"),
            GameResult::BlackWins => write!(f, "0-1"),
            GameResult::Draw => write!(f, "1/2-1/2"),
        }
    }
}

/// Why a submitted square pair could not be resolved to a legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// The square pair is a pawn push to the last rank and no promotion
    /// piece was named. Deliberately not defaulted to a queen.
    #[error("a promotion piece is required")]
    PromotionRequired,
    /// No legal move matches the square pair (and promotion piece, if any).
    #[error("not a legal move")]
    Illegal,
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// An owned chess position with enough history for repetition detection.
///
/// Game-over detection combines cozy-chess's own status (checkmate,
/// stalemate, 50-move rule) with fivefold-repetition and 150-half-move
/// automatic draws tracked here.
#[derive(Debug, Clone)]
pub struct Position {
    board: Board,
    /// Position keys (FEN minus the move counters) of every position reached.
    history: Vec<String>,
}

impl Position {
    /// Creates the standard starting position.
    pub fn new() -> Self {
        let board = Board::default();
        let key = Self::position_key(&board);
        Self {
            board,
            history: vec![key],
        }
    }

    /// Creates a position from a FEN string. Returns `None` for invalid FEN.
    pub fn from_fen(fen: &str) -> Option<Self> {
        let board: Board = fen.parse().ok()?;
        let key = Self::position_key(&board);
        Some(Self {
            board,
            history: vec![key],
        })
    }

    /// FEN with the move counters stripped, used for repetition counting.
    fn position_key(board: &Board) -> String {
        board
            .to_string()
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The current position in FEN notation.
    pub fn fen(&self) -> String {
        self.board.to_string()
    }

    /// The side to move.
    pub fn turn(&self) -> Side {
        self.board.side_to_move().into()
    }

    /// All legal moves in the current position.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.board.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    /// Legal moves whose origin is `from`, in square-pair notation.
    pub fn moves_from(&self, from: Square) -> Vec<String> {
        self.legal_moves()
            .into_iter()
            .filter(|mv| mv.from == from)
            .map(|mv| self.uci(mv))
            .collect()
    }

    /// Resolves a submitted square pair (plus optional promotion piece)
    /// to a concrete legal move.
    pub fn resolve(
        &self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Result<Move, MoveError> {
        let candidates: Vec<Move> = self
            .legal_moves()
            .into_iter()
            .filter(|mv| mv.from == from && (mv.to == to || self.castle_alias(*mv) == Some(to)))
            .collect();

        if candidates.is_empty() {
            return Err(MoveError::Illegal);
        }

        match promotion {
            Some(piece) => candidates
                .into_iter()
                .find(|mv| mv.promotion == Some(piece))
                .ok_or(MoveError::Illegal),
            None => candidates
                .into_iter()
                .find(|mv| mv.promotion.is_none())
                .ok_or(MoveError::PromotionRequired),
        }
    }

    /// The piece `mv` would capture, including en passant victims.
    /// Castling (encoded by cozy-chess as king-takes-rook) captures nothing.
    pub fn captured_by(&self, mv: Move) -> Option<Piece> {
        let mover = self.board.side_to_move();
        match self.board.color_on(mv.to) {
            Some(color) if color != mover => self.board.piece_on(mv.to),
            Some(_) => None,
            None => {
                // A pawn leaving its file onto an empty square is en passant.
                if self.board.piece_on(mv.from) == Some(Piece::Pawn)
                    && mv.from.file() != mv.to.file()
                {
                    Some(Piece::Pawn)
                } else {
                    None
                }
            }
        }
    }

    /// Applies a legal move, returning the captured piece if any.
    ///
    /// The move must come from `legal_moves` / `resolve`.
    pub fn apply(&mut self, mv: Move) -> Option<Piece> {
        let captured = self.captured_by(mv);
        self.board.play_unchecked(mv);
        self.history.push(Self::position_key(&self.board));
        captured
    }

    /// Square-pair notation for a legal move, with castling reported in
    /// the standard king-two-squares form.
    pub fn uci(&self, mv: Move) -> String {
        let (to, promotion) = match self.castle_alias(mv) {
            Some(alias) => (alias, None),
            None => (mv.to, mv.promotion),
        };
        let mut s = format!("{}{}", format_square(mv.from), format_square(to));
        if let Some(piece) = promotion {
            s.push(format_piece(piece));
        }
        s
    }

    /// If `mv` is cozy-chess's king-takes-rook castling encoding, returns
    /// the standard destination square of the king (g- or c-file).
    fn castle_alias(&self, mv: Move) -> Option<Square> {
        if self.board.piece_on(mv.from) != Some(Piece::King) {
            return None;
        }
        if self.board.color_on(mv.to) != self.board.color_on(mv.from) {
            return None;
        }
        let file = match mv.to.file() {
            File::H => File::G,
            File::A => File::C,
            _ => return None,
        };
        Some(Square::new(file, mv.from.rank()))
    }

    /// Half-moves since the last pawn move or capture.
    fn halfmove_clock(&self) -> u32 {
        self.fen()
            .split_whitespace()
            .nth(4)
            .and_then(|t| t.parse().ok())
            .unwrap_or(0)
    }

    /// How many times the current position has occurred.
    fn repetitions(&self) -> usize {
        match self.history.last() {
            Some(current) => self.history.iter().filter(|p| *p == current).count(),
            None => 0,
        }
    }

    /// The game result, or `None` while the game is still running.
    pub fn result(&self) -> Option<GameResult> {
        match self.board.status() {
            GameStatus::Won => Some(match self.board.side_to_move() {
                Color::White => GameResult::BlackWins,
                Color::Black => GameResult::WhiteWins,
            }),
            GameStatus::Drawn => Some(GameResult::Draw),
            GameStatus::Ongoing => {
                if self.repetitions() >= 5 || self.halfmove_clock() >= 150 {
                    Some(GameResult::Draw)
                } else {
                    None
                }
            }
        }
    }

    /// Returns `true` once the game has ended.
    pub fn is_over(&self) -> bool {
        self.result().is_some()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_uci(position: &mut Position, moves: &[&str]) {
        for m in moves {
            let from = parse_square(&m[0..2]).unwrap();
            let to = parse_square(&m[2..4]).unwrap();
            let promotion = m.chars().nth(4).and_then(parse_piece);
            let mv = position.resolve(from, to, promotion).unwrap();
            position.apply(mv);
        }
    }

    #[test]
    fn test_starting_position_has_20_moves() {
        let position = Position::new();
        assert_eq!(position.legal_moves().len(), 20);
        assert_eq!(position.turn(), Side::White);
        assert!(!position.is_over());
    }

    #[test]
    fn test_apply_move_updates_position() {
        let mut position = Position::new();
        let from = parse_square("e2").unwrap();
        let to = parse_square("e4").unwrap();

        assert!(position.moves_from(from).contains(&"e2e4".to_string()));

        let mv = position.resolve(from, to, None).unwrap();
        assert_eq!(position.uci(mv), "e2e4");
        assert_eq!(position.apply(mv), None);
        assert_eq!(position.turn(), Side::Black);
        assert!(position.fen().contains(" b "));
    }

    #[test]
    fn test_capture_reports_victim() {
        let mut position = Position::new();
        apply_uci(&mut position, &["e2e4", "d7d5"]);

        let from = parse_square("e4").unwrap();
        let to = parse_square("d5").unwrap();
        let mv = position.resolve(from, to, None).unwrap();
        assert_eq!(position.captured_by(mv), Some(Piece::Pawn));
        assert_eq!(position.apply(mv), Some(Piece::Pawn));
    }

    #[test]
    fn test_en_passant_capture_reports_pawn() {
        let mut position = Position::new();
        apply_uci(&mut position, &["e2e4", "a7a6", "e4e5", "f7f5"]);

        let from = parse_square("e5").unwrap();
        let to = parse_square("f6").unwrap();
        let mv = position.resolve(from, to, None).unwrap();
        assert_eq!(position.captured_by(mv), Some(Piece::Pawn));
    }

    #[test]
    fn test_promotion_requires_explicit_piece() {
        let position = Position::from_fen("8/P7/8/8/8/8/k6K w - - 0 1").unwrap();
        let from = parse_square("a7").unwrap();
        let to = parse_square("a8").unwrap();

        assert_eq!(
            position.resolve(from, to, None),
            Err(MoveError::PromotionRequired)
        );

        let mv = position.resolve(from, to, Some(Piece::Knight)).unwrap();
        assert_eq!(mv.promotion, Some(Piece::Knight));
        assert_eq!(position.uci(mv), "a7a8n");

        let mut position = position;
        position.apply(mv);
        assert!(position.fen().starts_with("N7/"));
    }

    #[test]
    fn test_castling_accepts_standard_notation() {
        let position = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let from = parse_square("e1").unwrap();
        let to = parse_square("g1").unwrap();

        let mv = position.resolve(from, to, None).unwrap();
        assert_eq!(position.uci(mv), "e1g1");
        assert_eq!(position.captured_by(mv), None);

        let mut position = position;
        position.apply(mv);
        assert!(position.fen().contains("R4RK1"));
    }

    #[test]
    fn test_fools_mate_ends_the_game() {
        let mut position = Position::new();
        apply_uci(&mut position, &["f2f3", "e7e5", "g2g4", "d8h4"]);

        assert!(position.is_over());
        assert_eq!(position.result(), Some(GameResult::BlackWins));
        assert_eq!(position.result().unwrap().to_string(), "0-1");
    }

    #[test]
    fn test_fivefold_repetition_is_a_draw() {
        let mut position = Position::new();
        for _ in 0..4 {
            apply_uci(&mut position, &["g1f3", "g8f6", "f3g1", "f6g8"]);
        }
        assert!(position.is_over());
        assert_eq!(position.result(), Some(GameResult::Draw));
    }

    #[test]
    fn test_square_roundtrip() {
        for name in ["a1", "e4", "h8"] {
            let sq = parse_square(name).unwrap();
            assert_eq!(format_square(sq), name);
        }
        assert_eq!(parse_square("i9"), None);
        assert_eq!(parse_square("e"), None);
        assert_eq!(parse_square("e44"), None);
    }

    #[test]
    fn test_piece_symbols() {
        assert_eq!(piece_symbol(Piece::Queen, Side::White), "Q");
        assert_eq!(piece_symbol(Piece::Knight, Side::Black), "n");
        assert_eq!(parse_piece('Q'), Some(Piece::Queen));
        assert_eq!(parse_piece('x'), None);
    }
}
