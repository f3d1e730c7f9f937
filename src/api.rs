//! REST API for the rematch chess server.
//!
//! Thin actix-web handlers over the [`Coordinator`]: every endpoint
//! extracts its input, delegates, and serializes the result. Errors
//! propagate with `?` and render as `{ "error": "..." }` through
//! `GameError`'s `ResponseError` impl.
//!
//! The API is documented with OpenAPI/Swagger via `utoipa`;
//! Swagger UI is served at `/swagger-ui/`.

use actix_web::{HttpResponse, web};
use utoipa::OpenApi;

use crate::coordinator::Coordinator;
use crate::error::GameError;
use crate::types::*;

// ---------------------------------------------------------------------------
// OpenAPI definition
// ---------------------------------------------------------------------------

/// OpenAPI documentation for the rematch chess API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rematch — Chess Game Server",
        version = "0.1.0",
        description = "A chess game server running concurrent PvP, PvAI and AI-vs-AI \
            matches. Scores accumulate across rematches between the same two \
            participants. Clients poll game state; AI-vs-AI games play themselves.",
        license(name = "MIT")
    ),
    paths(
        start_game,
        get_state,
        select_square,
        make_move,
        surrender,
        stop_game,
        get_score,
        list_games,
        player_totals,
        ai_models,
    ),
    components(schemas(
        StartGameRequest,
        StartGameResponse,
        GameStateResponse,
        SelectResponse,
        MoveRequest,
        SurrenderRequest,
        StopRequest,
        ScoreResponse,
        PlayerScore,
        PlayerTotalsResponse,
        GameListResponse,
        GameSummary,
        ModelsResponse,
        ErrorResponse,
        GameMode,
        Side,
        SessionStatus,
    )),
    tags(
        (name = "games", description = "Game lifecycle: start, state, stop"),
        (name = "moves", description = "Move submission and legal-move queries"),
        (name = "scores", description = "Running scores across rematches"),
        (name = "ai", description = "Available AI engines"),
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Start a new game.
///
/// Modes: `pvp` (two humans), `pvai` (human White vs engine Black),
/// `aivai` (engines on both sides; the game starts playing immediately).
/// Player names default to "Player1"/"Player2", or "AI" for engine sides.
#[utoipa::path(
    post,
    path = "/api/game/start",
    tag = "games",
    request_body = StartGameRequest,
    responses(
        (status = 200, description = "Game created", body = StartGameResponse),
        (status = 400, description = "Invalid mode, engine or player name", body = ErrorResponse),
    )
)]
pub async fn start_game(
    body: web::Json<StartGameRequest>,
    coordinator: web::Data<Coordinator>,
) -> Result<HttpResponse, GameError> {
    let response = coordinator.start_game(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Get the full state of a game.
///
/// This is the polling endpoint: it reports the position (FEN), side to
/// move, move log, captured pieces, whether an engine is thinking, and the
/// winner once the game has finished.
#[utoipa::path(
    get,
    path = "/api/game/state",
    tag = "games",
    params(GameQuery),
    responses(
        (status = 200, description = "Game state", body = GameStateResponse),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn get_state(
    query: web::Query<GameQuery>,
    coordinator: web::Data<Coordinator>,
) -> Result<HttpResponse, GameError> {
    let response = coordinator.get_state(&query.game_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// List the legal moves from a square.
///
/// Rejected once the game has finished.
#[utoipa::path(
    get,
    path = "/api/game/select",
    tag = "moves",
    params(SelectQuery),
    responses(
        (status = 200, description = "Legal moves from the square", body = SelectResponse),
        (status = 400, description = "Invalid square or finished game", body = ErrorResponse),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn select_square(
    query: web::Query<SelectQuery>,
    coordinator: web::Data<Coordinator>,
) -> Result<HttpResponse, GameError> {
    let response = coordinator
        .select_square(&query.game_id, &query.square)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Submit a move for the side to move.
///
/// A pawn push to the last rank must name its promotion piece; the server
/// never silently promotes to a queen. If the move hands the turn to an
/// engine-controlled side, the engine's reply is computed in the
/// background and becomes visible through the state endpoint.
#[utoipa::path(
    post,
    path = "/api/game/move",
    tag = "moves",
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Move applied; new state", body = GameStateResponse),
        (status = 400, description = "Illegal move, missing promotion, or finished game", body = ErrorResponse),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn make_move(
    body: web::Json<MoveRequest>,
    coordinator: web::Data<Coordinator>,
) -> Result<HttpResponse, GameError> {
    let response = coordinator.make_move(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Surrender a game.
///
/// `player` is 1 or 2; the other participant wins and the matchup score
/// is settled immediately.
#[utoipa::path(
    post,
    path = "/api/game/surrender",
    tag = "games",
    request_body = SurrenderRequest,
    responses(
        (status = 200, description = "Game over; final state", body = GameStateResponse),
        (status = 400, description = "Invalid player number or finished game", body = ErrorResponse),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn surrender(
    body: web::Json<SurrenderRequest>,
    coordinator: web::Data<Coordinator>,
) -> Result<HttpResponse, GameError> {
    let response = coordinator.surrender(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Stop an AI-vs-AI game.
///
/// Cancels the engine task and removes the session. Only AI-vs-AI games
/// can be stopped; other games end by surrender or on the board.
#[utoipa::path(
    post,
    path = "/api/game/stop",
    tag = "games",
    request_body = StopRequest,
    responses(
        (status = 200, description = "Game stopped and removed"),
        (status = 400, description = "Not an AI vs AI game", body = ErrorResponse),
        (status = 404, description = "Game not found", body = ErrorResponse),
    )
)]
pub async fn stop_game(
    body: web::Json<StopRequest>,
    coordinator: web::Data<Coordinator>,
) -> Result<HttpResponse, GameError> {
    let game_id = body.into_inner().game_id;
    coordinator.stop_ai_vs_ai(&game_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "stopped": game_id })))
}

/// Get the running score of a matchup.
///
/// Addressed by a game id or by a raw session key; scores accumulate
/// across rematches between the same two participants in the same mode.
#[utoipa::path(
    get,
    path = "/api/game/score",
    tag = "scores",
    params(GameQuery),
    responses(
        (status = 200, description = "Matchup score", body = ScoreResponse),
        (status = 404, description = "Unknown game or matchup", body = ErrorResponse),
    )
)]
pub async fn get_score(
    query: web::Query<GameQuery>,
    coordinator: web::Data<Coordinator>,
) -> Result<HttpResponse, GameError> {
    let response = coordinator.get_score(&query.game_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// List all games currently held by the server.
#[utoipa::path(
    get,
    path = "/api/games",
    tag = "games",
    responses(
        (status = 200, description = "Game summaries", body = GameListResponse),
    )
)]
pub async fn list_games(coordinator: web::Data<Coordinator>) -> HttpResponse {
    HttpResponse::Ok().json(coordinator.list_games().await)
}

/// Global per-player tallies across all matchups.
#[utoipa::path(
    get,
    path = "/api/scores/players",
    tag = "scores",
    responses(
        (status = 200, description = "Per-player totals", body = PlayerTotalsResponse),
    )
)]
pub async fn player_totals(coordinator: web::Data<Coordinator>) -> HttpResponse {
    HttpResponse::Ok().json(coordinator.player_totals())
}

/// List the AI engines accepted in start requests.
#[utoipa::path(
    get,
    path = "/api/ai/models",
    tag = "ai",
    responses(
        (status = 200, description = "Engine identifiers", body = ModelsResponse),
    )
)]
pub async fn ai_models(coordinator: web::Data<Coordinator>) -> HttpResponse {
    HttpResponse::Ok().json(coordinator.engine_models())
}

/// Configures all API routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/game/start", web::post().to(start_game))
            .route("/game/state", web::get().to(get_state))
            .route("/game/select", web::get().to(select_square))
            .route("/game/move", web::post().to(make_move))
            .route("/game/surrender", web::post().to(surrender))
            .route("/game/stop", web::post().to(stop_game))
            .route("/game/score", web::get().to(get_score))
            .route("/games", web::get().to(list_games))
            .route("/scores/players", web::get().to(player_totals))
            .route("/ai/models", web::get().to(ai_models)),
    );
}
