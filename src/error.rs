use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Caller-facing failure taxonomy for the booking core. Storage and token
/// errors are collapsed to 500s at the boundary; everything else maps to a
/// specific status code.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Slot not found")]
    SlotNotFound,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Slot is already booked")]
    AlreadyBooked,

    #[error("Slot is not booked")]
    NotBooked,

    #[error("Not authorized to cancel this booking")]
    NotOwner,

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password error: {0}")]
    Password(#[from] bcrypt::BcryptError),
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BookingError::SlotNotFound | BookingError::BookingNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            BookingError::AlreadyBooked => (StatusCode::CONFLICT, self.to_string()),
            BookingError::NotBooked => (StatusCode::BAD_REQUEST, self.to_string()),
            BookingError::NotOwner => (StatusCode::FORBIDDEN, self.to_string()),
            BookingError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            BookingError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            BookingError::Storage(e) => {
                tracing::error!("storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            BookingError::Token(e) => {
                tracing::error!("token error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            BookingError::Password(e) => {
                tracing::error!("password hashing error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}
