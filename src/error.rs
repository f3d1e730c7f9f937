//! Error taxonomy for the rematch chess server.
//!
//! Every operation on the server surfaces one of these errors. The enum
//! implements `actix_web::ResponseError` so handlers can propagate errors
//! with `?` and clients always receive the same `{ "error": "..." }` body.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::types::ErrorResponse;

/// Maximum accepted length of a player name.
pub const MAX_PLAYER_NAME_LEN: usize = 20;

/// Everything that can go wrong with a game request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("game not found: {0}")]
    GameNotFound(String),

    #[error("no scores recorded for {0}")]
    ScoreNotFound(String),

    #[error("invalid mode '{0}' (expected pvp, pvai or aivai)")]
    InvalidMode(String),

    #[error("unknown AI engine: {0}")]
    InvalidAiName(String),

    #[error("player name '{0}' is too long (max 20 characters)")]
    PlayerNameTooLong(String),

    #[error("invalid square: {0}")]
    InvalidSquare(String),

    #[error("invalid promotion piece: {0}")]
    InvalidPromotion(String),

    #[error("invalid player number: {0}")]
    InvalidPlayer(u8),

    #[error("game is already over")]
    GameOver,

    #[error("a promotion piece is required for this move")]
    PromotionRequired,

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("game {0} is not an AI vs AI game")]
    NotAiVsAi(String),
}

impl ResponseError for GameError {
    fn status_code(&self) -> StatusCode {
        match self {
            GameError::GameNotFound(_) | GameError::ScoreNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GameError::GameNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GameError::ScoreNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(GameError::GameOver.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GameError::PromotionRequired.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_messages_name_the_culprit() {
        assert!(
            GameError::InvalidMode("3d-chess".into())
                .to_string()
                .contains("3d-chess")
        );
        assert!(
            GameError::IllegalMove("e2e5 is not legal here".into())
                .to_string()
                .contains("e2e5")
        );
    }
}
