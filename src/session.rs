//! Game session: one chess game's state machine and its concurrency unit.
//!
//! All mutable game state lives behind a single `tokio::sync::Mutex`, so a
//! human move request and an engine task can never interleave inside a
//! transition. Every terminal transition funnels through `finish`, which
//! settles the score ledger exactly once per session.
//!
//! The session also owns the pieces the AI scheduler needs: the
//! single-engine-task reservation flag, the thinking indicator polled by
//! clients, the cancellation token, and the engine task handle.

use cozy_chess::{Move, Piece, Square};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::GameError;
use crate::ledger::{self, ScoreLedger, SettledOutcome};
use crate::rules::{self, GameResult, MoveError, Position};
use crate::types::{GameMode, GameStateResponse, Outcome, SessionStatus, Side};

/// Everything needed to create a session. Validation happens upstream.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: GameMode,
    pub player1: String,
    pub player2: String,
    /// Engine identifier for White, if White is engine-controlled.
    pub ai_white: Option<String>,
    /// Engine identifier for Black, if Black is engine-controlled.
    pub ai_black: Option<String>,
}

/// The state guarded by the session lock.
struct SessionState {
    position: Position,
    status: SessionStatus,
    outcome: Option<Outcome>,
    move_log: Vec<String>,
    captured_by_player1: Vec<String>,
    captured_by_player2: Vec<String>,
    scores_settled: bool,
}

/// A single chess game and its bookkeeping.
pub struct GameSession {
    pub id: Uuid,
    pub mode: GameMode,
    pub player1: String,
    pub player2: String,
    pub session_key: String,
    ai_white: Option<String>,
    ai_black: Option<String>,
    state: Mutex<SessionState>,
    /// True only while an engine task is awaiting the oracle.
    ai_thinking: AtomicBool,
    /// Reservation flag: at most one engine task per session. Flipped only
    /// while the state lock is held.
    ai_active: AtomicBool,
    ai_task: StdMutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl GameSession {
    pub fn new(config: SessionConfig) -> Self {
        // AI-vs-AI games run themselves, so they are never "waiting".
        let status = match config.mode {
            GameMode::Aivai => SessionStatus::InProgress,
            _ => SessionStatus::Waiting,
        };
        let session_key = ledger::session_key(&config.player1, &config.player2, config.mode);

        Self {
            id: Uuid::new_v4(),
            mode: config.mode,
            player1: config.player1,
            player2: config.player2,
            session_key,
            ai_white: config.ai_white,
            ai_black: config.ai_black,
            state: Mutex::new(SessionState {
                position: Position::new(),
                status,
                outcome: None,
                move_log: Vec::new(),
                captured_by_player1: Vec::new(),
                captured_by_player2: Vec::new(),
                scores_settled: false,
            }),
            ai_thinking: AtomicBool::new(false),
            ai_active: AtomicBool::new(false),
            ai_task: StdMutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// The engine playing `side`, if that side is engine-controlled.
    pub fn engine_for(&self, side: Side) -> Option<&str> {
        if !self.mode.ai_plays(side) {
            return None;
        }
        match side {
            Side::White => self.ai_white.as_deref(),
            Side::Black => self.ai_black.as_deref(),
        }
    }

    /// The participant name playing `side`.
    fn name_of(&self, side: Side) -> &str {
        match side {
            Side::White => &self.player1,
            Side::Black => &self.player2,
        }
    }

    // -----------------------------------------------------------------------
    // Player-facing operations
    // -----------------------------------------------------------------------

    /// Validates and applies a move submitted for the side to move.
    pub async fn apply_move(
        &self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
        ledger: &ScoreLedger,
    ) -> Result<SessionSnapshot, GameError> {
        let mut st = self.state.lock().await;
        if st.status == SessionStatus::Finished {
            return Err(GameError::GameOver);
        }

        let mv = st.position.resolve(from, to, promotion).map_err(|e| match e {
            MoveError::PromotionRequired => GameError::PromotionRequired,
            MoveError::Illegal => GameError::IllegalMove(format!(
                "{}{} is not legal here",
                rules::format_square(from),
                rules::format_square(to)
            )),
        })?;

        self.apply_resolved(&mut st, mv, ledger);
        Ok(self.snapshot_locked(&st))
    }

    /// Ends the game in favor of the non-surrendering participant.
    /// `player` is role-indexed: 1 surrenders player1, 2 surrenders player2.
    pub async fn surrender(
        &self,
        player: u8,
        ledger: &ScoreLedger,
    ) -> Result<SessionSnapshot, GameError> {
        let mut st = self.state.lock().await;
        if st.status == SessionStatus::Finished {
            return Err(GameError::GameOver);
        }

        let settled = match player {
            1 => SettledOutcome::Player2Wins,
            2 => SettledOutcome::Player1Wins,
            n => return Err(GameError::InvalidPlayer(n)),
        };

        log::info!("Game {}: player {} surrendered", self.id, player);
        self.finish(&mut st, settled, ledger);
        Ok(self.snapshot_locked(&st))
    }

    /// Legal moves from a square. Rejected once the game has finished.
    pub async fn select_moves(&self, square: Square) -> Result<Vec<String>, GameError> {
        let st = self.state.lock().await;
        if st.status == SessionStatus::Finished {
            return Err(GameError::GameOver);
        }
        Ok(st.position.moves_from(square))
    }

    /// The session's current observable state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let st = self.state.lock().await;
        self.snapshot_locked(&st)
    }

    // -----------------------------------------------------------------------
    // Transition internals
    // -----------------------------------------------------------------------

    /// Applies an already-resolved legal move and runs the game-over check.
    fn apply_resolved(&self, st: &mut SessionState, mv: Move, ledger: &ScoreLedger) {
        let mover = st.position.turn();
        let notation = st.position.uci(mv);

        if let Some(piece) = st.position.apply(mv) {
            let symbol = rules::piece_symbol(piece, mover.opponent());
            match mover {
                Side::White => st.captured_by_player1.push(symbol),
                Side::Black => st.captured_by_player2.push(symbol),
            }
        }
        st.move_log.push(notation);

        if st.status == SessionStatus::Waiting {
            st.status = SessionStatus::InProgress;
        }

        if let Some(result) = st.position.result() {
            let settled = match result {
                GameResult::WhiteWins => SettledOutcome::Player1Wins,
                GameResult::BlackWins => SettledOutcome::Player2Wins,
                GameResult::Draw => SettledOutcome::Draw,
            };
            log::info!("Game {}: over, {}", self.id, result);
            self.finish(st, settled, ledger);
        }
    }

    /// The single terminal transition. Settles the ledger at most once,
    /// however the game ended. The role-resolved outcome drives both the
    /// displayed winner and the settlement.
    fn finish(&self, st: &mut SessionState, settled: SettledOutcome, ledger: &ScoreLedger) {
        if st.status == SessionStatus::Finished {
            return;
        }
        st.status = SessionStatus::Finished;
        st.outcome = Some(match settled {
            SettledOutcome::Player1Wins => Outcome::Winner(self.player1.clone()),
            SettledOutcome::Player2Wins => Outcome::Winner(self.player2.clone()),
            SettledOutcome::Draw => Outcome::Draw,
            SettledOutcome::AiError => Outcome::AiError,
        });

        if !st.scores_settled {
            st.scores_settled = true;
            ledger.record_outcome(&self.session_key, &self.player1, &self.player2, settled);
        }
    }

    fn snapshot_locked(&self, st: &SessionState) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            mode: self.mode,
            player1: self.player1.clone(),
            player2: self.player2.clone(),
            fen: st.position.fen(),
            turn: st.position.turn(),
            status: st.status,
            outcome: st.outcome.clone(),
            move_log: st.move_log.clone(),
            captured_by_player1: st.captured_by_player1.clone(),
            captured_by_player2: st.captured_by_player2.clone(),
            ai_thinking: self.ai_thinking.load(Ordering::Relaxed),
            scores_settled: st.scores_settled,
        }
    }

    // -----------------------------------------------------------------------
    // Engine-task support (used by the AI scheduler)
    // -----------------------------------------------------------------------

    /// Claims the engine-task slot if an engine ply is due and nobody holds
    /// it. The flag and the turn check share the state lock, so a human
    /// move handing off to the engine can neither double-schedule nor lose
    /// the wakeup.
    pub async fn reserve_ai_turn(&self) -> bool {
        let st = self.state.lock().await;
        self.engine_due_locked(&st) && !self.ai_active.swap(true, Ordering::AcqRel)
    }

    /// The engine task's loop checkpoint: either the context for the next
    /// engine ply, or `None` after releasing the slot.
    pub async fn next_ai_ply(&self) -> Option<(Position, String)> {
        let st = self.state.lock().await;
        if self.engine_due_locked(&st) {
            let side = st.position.turn();
            let engine = self.engine_for(side)?.to_string();
            Some((st.position.clone(), engine))
        } else {
            self.ai_active.store(false, Ordering::Release);
            None
        }
    }

    fn engine_due_locked(&self, st: &SessionState) -> bool {
        st.status != SessionStatus::Finished && self.engine_for(st.position.turn()).is_some()
    }

    /// Applies a move produced by the oracle, after re-validating it
    /// against the current legal-move set. `None`, an illegal move, or an
    /// oracle failure all end the game with the "AI error" outcome.
    ///
    /// Returns `true` if the game continues.
    pub async fn apply_engine_move(&self, mv: Option<Move>, ledger: &ScoreLedger) -> bool {
        let mut st = self.state.lock().await;
        if st.status == SessionStatus::Finished {
            return false;
        }

        match mv.filter(|m| st.position.legal_moves().contains(m)) {
            Some(m) => {
                self.apply_resolved(&mut st, m, ledger);
                st.status != SessionStatus::Finished
            }
            None => {
                log::error!(
                    "Game {}: engine for {} produced no usable move",
                    self.id,
                    self.name_of(st.position.turn())
                );
                self.finish(&mut st, SettledOutcome::AiError, ledger);
                false
            }
        }
    }

    pub fn set_ai_thinking(&self, thinking: bool) {
        self.ai_thinking.store(thinking, Ordering::Relaxed);
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Remembers the engine task driving this session so `shutdown` can
    /// find it.
    pub fn attach_ai_task(&self, handle: JoinHandle<()>) {
        *self.ai_task.lock().unwrap() = Some(handle);
    }

    /// Cancels and detaches any engine task. Called before the session is
    /// removed; a cancelled task performs no further mutation.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.ai_task.lock().unwrap().take() {
            handle.abort();
        }
        self.ai_thinking.store(false, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A consistent copy of a session's observable state, taken under the
/// session lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub mode: GameMode,
    pub player1: String,
    pub player2: String,
    pub fen: String,
    pub turn: Side,
    pub status: SessionStatus,
    pub outcome: Option<Outcome>,
    pub move_log: Vec<String>,
    pub captured_by_player1: Vec<String>,
    pub captured_by_player2: Vec<String>,
    pub ai_thinking: bool,
    pub scores_settled: bool,
}

impl From<SessionSnapshot> for GameStateResponse {
    fn from(s: SessionSnapshot) -> Self {
        GameStateResponse {
            game_id: s.id.to_string(),
            player1: s.player1,
            player2: s.player2,
            mode: s.mode,
            board: s.fen,
            turn: s.turn,
            moves: s.move_log,
            status: s.status,
            game_over: s.status == SessionStatus::Finished,
            winner: s.outcome.map(|o| o.label()),
            ai_thinking: s.ai_thinking,
            captured_by_player1: s.captured_by_player1,
            captured_by_player2: s.captured_by_player2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_square;
    use std::sync::Arc;

    fn pvp_session() -> GameSession {
        GameSession::new(SessionConfig {
            mode: GameMode::Pvp,
            player1: "Alice".into(),
            player2: "Bob".into(),
            ai_white: None,
            ai_black: None,
        })
    }

    async fn play(session: &GameSession, ledger: &ScoreLedger, moves: &[&str]) {
        for m in moves {
            let from = parse_square(&m[0..2]).unwrap();
            let to = parse_square(&m[2..4]).unwrap();
            let promotion = m.chars().nth(4).and_then(rules::parse_piece);
            session
                .apply_move(from, to, promotion, ledger)
                .await
                .unwrap_or_else(|e| panic!("move {} rejected: {}", m, e));
        }
    }

    #[tokio::test]
    async fn test_first_move_starts_the_game() {
        let session = pvp_session();
        let ledger = ScoreLedger::new();

        assert_eq!(session.snapshot().await.status, SessionStatus::Waiting);

        let snapshot = session
            .apply_move(
                parse_square("e2").unwrap(),
                parse_square("e4").unwrap(),
                None,
                &ledger,
            )
            .await
            .unwrap();

        assert_eq!(snapshot.status, SessionStatus::InProgress);
        assert_eq!(snapshot.turn, Side::Black);
        assert_eq!(snapshot.move_log, vec!["e2e4"]);
    }

    #[tokio::test]
    async fn test_aivai_starts_in_progress() {
        let session = GameSession::new(SessionConfig {
            mode: GameMode::Aivai,
            player1: "AI".into(),
            player2: "AI".into(),
            ai_white: Some("random".into()),
            ai_black: Some("random".into()),
        });
        assert_eq!(session.snapshot().await.status, SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn test_illegal_move_mutates_nothing() {
        let session = pvp_session();
        let ledger = ScoreLedger::new();

        let err = session
            .apply_move(
                parse_square("e2").unwrap(),
                parse_square("e5").unwrap(),
                None,
                &ledger,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::IllegalMove(_)));

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.status, SessionStatus::Waiting);
        assert!(snapshot.move_log.is_empty());
    }

    #[tokio::test]
    async fn test_promotion_requires_piece_and_credits_capture() {
        let session = pvp_session();
        let ledger = ScoreLedger::new();
        play(
            &session,
            &ledger,
            &[
                "a2a4", "b7b5", "a4b5", "a7a6", "b5a6", "c8b7", "a6b7", "d7d6",
            ],
        )
        .await;

        let from = parse_square("b7").unwrap();
        let to = parse_square("a8").unwrap();

        let err = session.apply_move(from, to, None, &ledger).await.unwrap_err();
        assert_eq!(err, GameError::PromotionRequired);

        let snapshot = session
            .apply_move(from, to, Some(cozy_chess::Piece::Queen), &ledger)
            .await
            .unwrap();
        assert_eq!(snapshot.move_log.last().unwrap(), "b7a8q");
        // The promoted pawn took the a8 rook; earlier trades captured more.
        assert!(snapshot.captured_by_player1.contains(&"r".to_string()));
    }

    #[tokio::test]
    async fn test_surrender_finishes_and_settles_once() {
        let session = pvp_session();
        let ledger = ScoreLedger::new();
        play(&session, &ledger, &["e2e4"]).await;

        let snapshot = session.surrender(1, &ledger).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Finished);
        assert_eq!(snapshot.outcome, Some(Outcome::Winner("Bob".into())));
        assert!(snapshot.scores_settled);

        let scores = ledger.get(&session.session_key).unwrap();
        assert_eq!(scores.player2_score.wins, 1);
        assert_eq!(scores.player1_score.losses, 1);

        // Finished games reject every mutation and settle nothing further.
        assert_eq!(
            session.surrender(2, &ledger).await.unwrap_err(),
            GameError::GameOver
        );
        assert_eq!(
            session
                .apply_move(
                    parse_square("e7").unwrap(),
                    parse_square("e5").unwrap(),
                    None,
                    &ledger
                )
                .await
                .unwrap_err(),
            GameError::GameOver
        );
        assert_eq!(
            session
                .select_moves(parse_square("e7").unwrap())
                .await
                .unwrap_err(),
            GameError::GameOver
        );

        let scores = ledger.get(&session.session_key).unwrap();
        assert_eq!(scores.player2_score.wins, 1);
        assert_eq!(scores.player1_score.wins, 0);
        assert_eq!(session.snapshot().await.move_log.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_player_number() {
        let session = pvp_session();
        let ledger = ScoreLedger::new();
        assert_eq!(
            session.surrender(3, &ledger).await.unwrap_err(),
            GameError::InvalidPlayer(3)
        );
        assert_eq!(session.snapshot().await.status, SessionStatus::Waiting);
    }

    #[tokio::test]
    async fn test_checkmate_settles_for_the_winner() {
        let session = pvp_session();
        let ledger = ScoreLedger::new();
        play(&session, &ledger, &["f2f3", "e7e5", "g2g4", "d8h4"]).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.status, SessionStatus::Finished);
        assert_eq!(snapshot.outcome, Some(Outcome::Winner("Bob".into())));

        let scores = ledger.get(&session.session_key).unwrap();
        assert_eq!(scores.player2_score.wins, 1);
    }

    #[tokio::test]
    async fn test_engine_failure_finishes_without_settling() {
        let session = GameSession::new(SessionConfig {
            mode: GameMode::Aivai,
            player1: "AI".into(),
            player2: "AI".into(),
            ai_white: Some("random".into()),
            ai_black: Some("random".into()),
        });
        let ledger = ScoreLedger::new();

        assert!(!session.apply_engine_move(None, &ledger).await);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.status, SessionStatus::Finished);
        assert_eq!(snapshot.outcome, Some(Outcome::AiError));
        assert!(snapshot.scores_settled);
        assert!(ledger.get(&session.session_key).is_none());
    }

    #[tokio::test]
    async fn test_engine_move_revalidated_against_legal_set() {
        let session = GameSession::new(SessionConfig {
            mode: GameMode::Pvai,
            player1: "Alice".into(),
            player2: "AI".into(),
            ai_white: None,
            ai_black: Some("random".into()),
        });
        let ledger = ScoreLedger::new();

        // A move that was legal in some other position but not here.
        let stale = Move {
            from: parse_square("e7").unwrap(),
            to: parse_square("e5").unwrap(),
            promotion: None,
        };
        assert!(!session.apply_engine_move(Some(stale), &ledger).await);
        assert_eq!(session.snapshot().await.outcome, Some(Outcome::AiError));
    }

    #[tokio::test]
    async fn test_reservation_is_single_holder() {
        let session = Arc::new(GameSession::new(SessionConfig {
            mode: GameMode::Aivai,
            player1: "AI".into(),
            player2: "AI".into(),
            ai_white: Some("random".into()),
            ai_black: Some("random".into()),
        }));

        assert!(session.reserve_ai_turn().await);
        assert!(!session.reserve_ai_turn().await);

        // The holder's checkpoint hands out the ply context while due...
        let (position, engine) = session.next_ai_ply().await.unwrap();
        assert_eq!(position.turn(), Side::White);
        assert_eq!(engine, "random");

        // ...and releases the slot once the game is finished.
        let ledger = ScoreLedger::new();
        session.apply_engine_move(None, &ledger).await;
        assert!(session.next_ai_ply().await.is_none());
        assert!(!session.reserve_ai_turn().await); // finished: nothing due
    }

    #[tokio::test]
    async fn test_pvp_never_reserves() {
        let session = pvp_session();
        assert!(!session.reserve_ai_turn().await);
        assert!(session.next_ai_ply().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_simultaneous_submissions_serialize() {
        let session = Arc::new(pvp_session());
        let ledger = Arc::new(ScoreLedger::new());

        let mut handles = Vec::new();
        for _ in 0..2 {
            let session = Arc::clone(&session);
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                session
                    .apply_move(
                        parse_square("e2").unwrap(),
                        parse_square("e4").unwrap(),
                        None,
                        &ledger,
                    )
                    .await
            }));
        }

        let mut ok = 0;
        let mut illegal = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(GameError::IllegalMove(_)) => illegal += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        // Exactly one submission wins the race; the other sees the
        // post-move position where e2e4 is no longer available.
        assert_eq!(ok, 1);
        assert_eq!(illegal, 1);
        assert_eq!(session.snapshot().await.move_log, vec!["e2e4"]);
    }
}
