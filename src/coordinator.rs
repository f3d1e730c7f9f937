//! Session coordinator: the server-facing composition of registry,
//! sessions, scheduler and ledger.
//!
//! Every API operation lands here. The coordinator validates requests,
//! resolves game ids to sessions, and hands engine turns to the scheduler
//! after state-changing operations. It knows nothing about HTTP; the
//! handlers in `api` are a thin layer over it.

use cozy_chess::Piece;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{GameError, MAX_PLAYER_NAME_LEN};
use crate::ledger::ScoreLedger;
use crate::oracle::{self, MoveOracle};
use crate::registry::GameRegistry;
use crate::rules;
use crate::scheduler::AiScheduler;
use crate::session::{GameSession, SessionConfig};
use crate::types::{
    GameListResponse, GameMode, GameStateResponse, GameSummary, ModelsResponse,
    MoveRequest, PlayerTotalsResponse, ScoreResponse, SelectResponse, SessionStatus,
    StartGameRequest, StartGameResponse, SurrenderRequest,
};

/// Tunables for the coordinator's scheduler.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Pause between engine moves in AI-vs-AI games.
    pub move_delay: Duration,
    /// Upper bound on a single oracle call.
    pub oracle_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            move_delay: Duration::from_secs(1),
            oracle_timeout: Duration::from_secs(10),
        }
    }
}

/// The server core. One instance per process, shared by all requests.
pub struct Coordinator {
    registry: GameRegistry,
    ledger: Arc<ScoreLedger>,
    scheduler: Arc<AiScheduler>,
}

impl Coordinator {
    pub fn new(oracle: Arc<dyn MoveOracle>, config: CoordinatorConfig) -> Self {
        let ledger = Arc::new(ScoreLedger::new());
        let scheduler = Arc::new(AiScheduler::new(
            oracle,
            Arc::clone(&ledger),
            config.move_delay,
            config.oracle_timeout,
        ));
        Self {
            registry: GameRegistry::new(),
            ledger,
            scheduler,
        }
    }

    fn lookup(&self, game_id: &str) -> Result<Arc<GameSession>, GameError> {
        let id = Uuid::parse_str(game_id)
            .map_err(|_| GameError::GameNotFound(game_id.to_string()))?;
        self.registry
            .get(&id)
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Creates a new game session. AI-vs-AI games start playing at once.
    pub async fn start_game(&self, req: StartGameRequest) -> Result<StartGameResponse, GameError> {
        let mode =
            GameMode::parse(&req.mode).ok_or_else(|| GameError::InvalidMode(req.mode.clone()))?;

        for name in [&req.player1, &req.player2].into_iter().flatten() {
            if name.chars().count() > MAX_PLAYER_NAME_LEN {
                return Err(GameError::PlayerNameTooLong(name.clone()));
            }
        }
        for engine in [&req.ai_white, &req.ai_black].into_iter().flatten() {
            if !oracle::is_known_engine(engine) {
                return Err(GameError::InvalidAiName(engine.clone()));
            }
        }

        let player1 = req.player1.unwrap_or_else(|| "Player1".to_string());
        let player2 = match mode {
            GameMode::Pvp => req.player2.unwrap_or_else(|| "Player2".to_string()),
            _ => req.player2.unwrap_or_else(|| "AI".to_string()),
        };
        let (ai_white, ai_black) = match mode {
            GameMode::Pvp => (None, None),
            GameMode::Pvai => (
                None,
                Some(req.ai_black.unwrap_or_else(|| oracle::DEFAULT_ENGINE.to_string())),
            ),
            GameMode::Aivai => (
                Some(req.ai_white.unwrap_or_else(|| oracle::DEFAULT_ENGINE.to_string())),
                Some(req.ai_black.unwrap_or_else(|| oracle::DEFAULT_ENGINE.to_string())),
            ),
        };

        let session = Arc::new(GameSession::new(SessionConfig {
            mode,
            player1: player1.clone(),
            player2: player2.clone(),
            ai_white,
            ai_black,
        }));
        self.registry.insert(Arc::clone(&session));

        log::info!(
            "Started {} game {}: {} vs {}",
            mode,
            session.id,
            player1,
            player2
        );

        if mode == GameMode::Aivai {
            self.scheduler.ensure_turn(&session).await;
        }

        Ok(StartGameResponse {
            game_id: session.id.to_string(),
            player2,
        })
    }

    /// The full observable state of a game.
    pub async fn get_state(&self, game_id: &str) -> Result<GameStateResponse, GameError> {
        let session = self.lookup(game_id)?;
        Ok(session.snapshot().await.into())
    }

    /// Legal moves from a square of a running game.
    pub async fn select_square(
        &self,
        game_id: &str,
        square: &str,
    ) -> Result<SelectResponse, GameError> {
        let session = self.lookup(game_id)?;
        let sq = rules::parse_square(square)
            .ok_or_else(|| GameError::InvalidSquare(square.to_string()))?;
        let possible_moves = session.select_moves(sq).await?;
        Ok(SelectResponse { possible_moves })
    }

    /// Applies a human move, then hands the turn to the engine if one
    /// plays the side to move.
    pub async fn make_move(&self, req: MoveRequest) -> Result<GameStateResponse, GameError> {
        let session = self.lookup(&req.game_id)?;
        let from = rules::parse_square(&req.from_square)
            .ok_or_else(|| GameError::InvalidSquare(req.from_square.clone()))?;
        let to = rules::parse_square(&req.to_square)
            .ok_or_else(|| GameError::InvalidSquare(req.to_square.clone()))?;
        let promotion = match req.promotion.as_deref() {
            Some(p) => Some(parse_promotion(p)?),
            None => None,
        };

        let snapshot = session.apply_move(from, to, promotion, &self.ledger).await?;
        log::info!(
            "Game {}: {} played {}",
            session.id,
            snapshot.turn.opponent(),
            snapshot.move_log.last().map(String::as_str).unwrap_or("?")
        );

        if snapshot.status != SessionStatus::Finished {
            self.scheduler.ensure_turn(&session).await;
        }
        Ok(snapshot.into())
    }

    /// Surrenders on behalf of a participant (role-indexed 1 or 2).
    pub async fn surrender(&self, req: SurrenderRequest) -> Result<GameStateResponse, GameError> {
        let session = self.lookup(&req.game_id)?;
        let snapshot = session.surrender(req.player, &self.ledger).await?;
        Ok(snapshot.into())
    }

    /// Cancels an AI-vs-AI game's engine task and removes the session.
    pub async fn stop_ai_vs_ai(&self, game_id: &str) -> Result<(), GameError> {
        let session = self.lookup(game_id)?;
        if session.mode != GameMode::Aivai {
            return Err(GameError::NotAiVsAi(game_id.to_string()));
        }

        session.shutdown();
        self.registry.remove(&session.id);
        log::info!("Stopped and removed AI vs AI game {}", session.id);
        Ok(())
    }

    /// Running scores for a matchup, addressed by game id or raw session key.
    pub async fn get_score(&self, key_or_id: &str) -> Result<ScoreResponse, GameError> {
        let key = match Uuid::parse_str(key_or_id) {
            Ok(id) => self
                .registry
                .get(&id)
                .ok_or_else(|| GameError::GameNotFound(key_or_id.to_string()))?
                .session_key
                .clone(),
            Err(_) => key_or_id.to_string(),
        };

        let scores = self
            .ledger
            .get(&key)
            .ok_or_else(|| GameError::ScoreNotFound(key.clone()))?;

        Ok(ScoreResponse {
            session_key: key,
            player1: scores.player1.clone(),
            player2: scores.player2.clone(),
            score: scores.summary(),
            scores: scores.by_name(),
        })
    }

    /// Summaries of all games currently held by the server.
    pub async fn list_games(&self) -> GameListResponse {
        let mut games = Vec::new();
        for session in self.registry.list() {
            let s = session.snapshot().await;
            games.push(GameSummary {
                game_id: s.id.to_string(),
                mode: s.mode,
                player1: s.player1,
                player2: s.player2,
                status: s.status,
                winner: s.outcome.map(|o| o.label()),
                move_count: s.move_log.len(),
            });
        }
        let total = games.len();
        GameListResponse { games, total }
    }

    /// Global per-player tallies across all matchups.
    pub fn player_totals(&self) -> PlayerTotalsResponse {
        PlayerTotalsResponse {
            players: self.ledger.player_totals(),
        }
    }

    /// The engine identifiers accepted in start requests.
    pub fn engine_models(&self) -> ModelsResponse {
        ModelsResponse {
            models: oracle::BUILTIN_ENGINES.iter().map(|m| m.to_string()).collect(),
        }
    }
}

fn parse_promotion(s: &str) -> Result<Piece, GameError> {
    let piece = match s.chars().collect::<Vec<_>>().as_slice() {
        [c] => rules::parse_piece(*c),
        _ => None,
    };
    match piece {
        Some(Piece::King) | Some(Piece::Pawn) | None => {
            Err(GameError::InvalidPromotion(s.to_string()))
        }
        Some(piece) => Ok(piece),
    }
}
