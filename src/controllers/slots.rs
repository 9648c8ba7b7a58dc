use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::BookingError;
use crate::middleware::AuthUser;
use crate::models::SlotFilter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_slots))
        .route("/{id}", get(get_slot))
        .route("/book/{id}", post(book_slot))
        .route("/cancel/{id}", delete(cancel_booking))
        .route("/user/my-bookings", get(my_bookings))
}

#[derive(Debug, Deserialize)]
struct SlotsQuery {
    date: Option<String>,
    #[serde(rename = "courtName")]
    court_name: Option<String>,
    available: Option<bool>,
}

// GET /api/slots
async fn list_slots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SlotsQuery>,
) -> Result<impl IntoResponse, BookingError> {
    let filter = SlotFilter {
        date: params.date,
        court_name: params.court_name,
        available_only: params.available.unwrap_or(false),
    };

    let slots = state.registry.list_slots(&filter).await?;

    Ok(Json(json!({
        "success": true,
        "count": slots.len(),
        "data": slots,
    })))
}

// GET /api/slots/{id}
async fn get_slot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    let slot = state
        .registry
        .get_slot_view(id)
        .await?
        .ok_or(BookingError::SlotNotFound)?;

    Ok(Json(json!({
        "success": true,
        "data": slot,
    })))
}

// POST /api/slots/book/{id}
async fn book_slot(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    let outcome = state.reservations.reserve(id, user.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Slot booked successfully",
        "data": outcome.slot,
        "booking": outcome.booking,
    })))
}

// DELETE /api/slots/cancel/{id}
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    let slot = state.reservations.cancel(id, user.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking cancelled successfully",
        "data": slot,
    })))
}

// GET /api/slots/user/my-bookings
async fn my_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, BookingError> {
    let bookings = state
        .ledger
        .list_active_bookings_for_user(user.user_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": bookings.len(),
        "data": bookings,
    })))
}
