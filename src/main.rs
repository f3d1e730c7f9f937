//! # rematch — Chess Game Server
//!
//! rematch is a chess game server that runs many games at once: two
//! humans, a human against an engine, or two engines playing each other
//! while clients watch. Scores accumulate across rematches between the
//! same two participants, so a long evening of games keeps one running
//! tally.
//!
//! ## Features
//!
//! - **Three game modes**: `pvp`, `pvai` (engine plays Black) and
//!   `aivai` (engines on both sides; the game plays itself).
//! - **Concurrent sessions**: every game is its own unit of concurrency;
//!   human moves and engine moves for the same game are serialized,
//!   different games run fully in parallel.
//! - **Background AI turns**: engine moves are computed off the request
//!   path, with cancellation and timeouts; AI-vs-AI games can be stopped
//!   mid-think.
//! - **Running scores**: a process-wide ledger keyed by matchup, settled
//!   exactly once per finished game, plus global per-player totals.
//! - **Swagger/OpenAPI documentation** at `/swagger-ui/`.
//!
//! ## Usage
//!
//! ```bash
//! # Start the API server (default: http://0.0.0.0:8000)
//! rematch serve
//!
//! # Faster AI-vs-AI games on a custom port
//! rematch serve --port 3000 --ai-delay-ms 200
//!
//! # List the built-in engines
//! rematch engines
//! ```
//!
//! ## API Endpoints
//!
//! | Method | Path                   | Description                       |
//! |--------|------------------------|-----------------------------------|
//! | POST   | `/api/game/start`      | Start a new game                  |
//! | GET    | `/api/game/state`      | Poll a game's state               |
//! | GET    | `/api/game/select`     | Legal moves from a square         |
//! | POST   | `/api/game/move`       | Submit a move                     |
//! | POST   | `/api/game/surrender`  | Surrender a game                  |
//! | POST   | `/api/game/stop`       | Stop an AI-vs-AI game             |
//! | GET    | `/api/game/score`      | Running score of a matchup        |
//! | GET    | `/api/games`           | List all games                    |
//! | GET    | `/api/scores/players`  | Global per-player totals          |
//! | GET    | `/api/ai/models`       | Available engines                 |
//! | GET    | `/swagger-ui/`         | Swagger UI documentation          |

pub mod api;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod oracle;
pub mod registry;
pub mod rules;
pub mod scheduler;
pub mod session;
pub mod types;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::ApiDoc;
use crate::coordinator::{Coordinator, CoordinatorConfig};
use crate::oracle::BuiltinOracle;

/// rematch — a chess game server with AI opponents and running scores.
#[derive(Parser, Debug)]
#[command(name = "rematch")]
#[command(about = "Chess game server — PvP, PvAI and AI-vs-AI with running scores")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the REST API server with Swagger UI.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value_t = 8000)]
        port: u16,

        /// Host address to bind to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Pause between engine moves in AI-vs-AI games, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        ai_delay_ms: u64,

        /// Upper bound on a single engine think, in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        engine_timeout_ms: u64,

        /// Artificial think time of the built-in engines, in milliseconds.
        #[arg(long, default_value_t = 100)]
        think_ms: u64,
    },

    /// List the built-in AI engines.
    Engines,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            ai_delay_ms,
            engine_timeout_ms,
            think_ms,
        } => {
            let config = CoordinatorConfig {
                move_delay: Duration::from_millis(ai_delay_ms),
                oracle_timeout: Duration::from_millis(engine_timeout_ms),
            };
            let oracle = Arc::new(BuiltinOracle::new(Duration::from_millis(think_ms)));
            run_server(&host, port, oracle, config).await
        }
        Commands::Engines => {
            for engine in oracle::BUILTIN_ENGINES {
                println!("{}", engine);
            }
            Ok(())
        }
    }
}

/// Starts the HTTP server with all API routes and Swagger UI.
async fn run_server(
    host: &str,
    port: u16,
    oracle: Arc<BuiltinOracle>,
    config: CoordinatorConfig,
) -> std::io::Result<()> {
    let openapi = ApiDoc::openapi();

    let coordinator = web::Data::new(Coordinator::new(oracle, config));

    log::info!("Starting rematch server on {}:{}", host, port);
    log::info!("API base URL: http://{}:{}/api", host, port);
    log::info!("Swagger UI available at http://{}:{}/swagger-ui/", host, port);

    HttpServer::new(move || {
        // CORS open for browser clients during development
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(coordinator.clone())
            .configure(api::configure_routes)
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()))
    })
    .bind((host, port))?
    .run()
    .await
}
