//! AI turn scheduler: drives engine moves for sessions with AI sides.
//!
//! Each session gets at most one long-lived engine task, spawned the first
//! time an engine ply comes due and looping until no further engine ply is
//! pending. The oracle call runs outside the session lock, raced against
//! the session's cancellation token and bounded by a timeout; the move is
//! then applied back under the lock, where a concurrent surrender or stop
//! is seen before anything mutates.

use std::sync::Arc;
use std::time::Duration;

use crate::ledger::ScoreLedger;
use crate::oracle::MoveOracle;
use crate::session::GameSession;
use crate::types::GameMode;

/// Schedules and runs engine tasks. One instance serves all sessions.
pub struct AiScheduler {
    oracle: Arc<dyn MoveOracle>,
    ledger: Arc<ScoreLedger>,
    /// Pause between engine moves in AI-vs-AI games.
    move_delay: Duration,
    /// Upper bound on a single oracle call.
    oracle_timeout: Duration,
}

impl AiScheduler {
    pub fn new(
        oracle: Arc<dyn MoveOracle>,
        ledger: Arc<ScoreLedger>,
        move_delay: Duration,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            ledger,
            move_delay,
            oracle_timeout,
        }
    }

    /// Ensures an engine task is driving this session if an engine ply is
    /// due. No-op for human turns, finished games, and sessions whose task
    /// is already running.
    pub async fn ensure_turn(self: &Arc<Self>, session: &Arc<GameSession>) {
        if !session.reserve_ai_turn().await {
            return;
        }

        let scheduler = Arc::clone(self);
        let task_session = Arc::clone(session);
        let handle = tokio::spawn(async move {
            scheduler.run_engine_task(task_session).await;
        });
        session.attach_ai_task(handle);
    }

    /// The per-session engine loop. Owns the session's reservation slot
    /// until `next_ai_ply` releases it.
    async fn run_engine_task(&self, session: Arc<GameSession>) {
        loop {
            let Some((position, engine)) = session.next_ai_ply().await else {
                return;
            };

            session.set_ai_thinking(true);
            let answer = tokio::select! {
                _ = session.cancel_token().cancelled() => {
                    session.set_ai_thinking(false);
                    log::debug!("Game {}: engine task cancelled", session.id);
                    return;
                }
                answer = tokio::time::timeout(
                    self.oracle_timeout,
                    self.oracle.best_move(position, &engine),
                ) => answer,
            };
            session.set_ai_thinking(false);

            let mv = match answer {
                Ok(Ok(mv)) => mv,
                Ok(Err(e)) => {
                    log::error!("Game {}: {}", session.id, e);
                    None
                }
                Err(_) => {
                    log::error!(
                        "Game {}: engine '{}' timed out after {:?}",
                        session.id,
                        engine,
                        self.oracle_timeout
                    );
                    None
                }
            };

            let continues = session.apply_engine_move(mv, &self.ledger).await;

            // Pace AI-vs-AI games so spectators can follow along.
            if continues && session.mode == GameMode::Aivai && !self.move_delay.is_zero() {
                tokio::select! {
                    _ = session.cancel_token().cancelled() => return,
                    _ = tokio::time::sleep(self.move_delay) => {}
                }
            }
        }
    }
}
