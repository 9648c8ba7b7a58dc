use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::booking::STATUS_ACTIVE;
use crate::models::{Booking, BookingSnapshot, BookingView, Slot};

/// Append-style reservation history. Records are never deleted; cancellation
/// only flips status and stamps cancelled_at.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn create_active_booking(
        &self,
        snapshot: &BookingSnapshot,
        user: Uuid,
    ) -> Result<Booking, BookingError>;

    /// The active record owned by `user` for `slot_id`, if one exists. Used
    /// during cancellation to locate what to cancel.
    async fn find_active_booking_for_slot(
        &self,
        slot_id: Uuid,
        user: Uuid,
    ) -> Result<Option<Booking>, BookingError>;

    /// Fails with `BookingNotFound` when the record is absent or already
    /// cancelled, so a cancellation is never double-counted.
    async fn cancel_booking(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), BookingError>;

    /// Active bookings owned by `user`, ordered by date then time slot, each
    /// merged with its slot's current state for display.
    async fn list_active_bookings_for_user(
        &self,
        user: Uuid,
    ) -> Result<Vec<BookingView>, BookingError>;
}

pub struct PgBookingLedger {
    pool: PgPool,
}

impl PgBookingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str =
    "id, slot_id, user_id, court_name, date, time_slot, price, status, booked_at, cancelled_at";

#[derive(sqlx::FromRow)]
struct BookingWithSlotRow {
    id: Uuid,
    slot_id: Uuid,
    user_id: Uuid,
    court_name: String,
    date: String,
    time_slot: String,
    price: f64,
    status: String,
    booked_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    slot_court_name: Option<String>,
    slot_date: Option<String>,
    slot_time_slot: Option<String>,
    slot_price: Option<f64>,
    slot_is_booked: Option<bool>,
    slot_booked_by: Option<Uuid>,
    slot_booked_at: Option<DateTime<Utc>>,
}

impl BookingWithSlotRow {
    fn into_view(self) -> BookingView {
        let slot = match (
            self.slot_court_name,
            self.slot_date,
            self.slot_time_slot,
            self.slot_price,
            self.slot_is_booked,
        ) {
            (Some(court_name), Some(date), Some(time_slot), Some(price), Some(is_booked)) => {
                Some(Slot {
                    id: self.slot_id,
                    court_name,
                    date,
                    time_slot,
                    price,
                    is_booked,
                    booked_by: self.slot_booked_by,
                    booked_at: self.slot_booked_at,
                })
            }
            _ => None,
        };
        BookingView {
            booking: Booking {
                id: self.id,
                slot_id: self.slot_id,
                user_id: self.user_id,
                court_name: self.court_name,
                date: self.date,
                time_slot: self.time_slot,
                price: self.price,
                status: self.status,
                booked_at: self.booked_at,
                cancelled_at: self.cancelled_at,
            },
            slot,
        }
    }
}

#[async_trait]
impl BookingLedger for PgBookingLedger {
    async fn create_active_booking(
        &self,
        snapshot: &BookingSnapshot,
        user: Uuid,
    ) -> Result<Booking, BookingError> {
        let q = format!(
            "INSERT INTO bookings (slot_id, user_id, court_name, date, time_slot, price, status) \
             VALUES ($1, $2, $3, $4, $5, $6, '{STATUS_ACTIVE}') \
             RETURNING {BOOKING_COLUMNS}"
        );
        let booking = sqlx::query_as::<_, Booking>(&q)
            .bind(snapshot.slot_id)
            .bind(user)
            .bind(&snapshot.court_name)
            .bind(&snapshot.date)
            .bind(&snapshot.time_slot)
            .bind(snapshot.price)
            .fetch_one(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn find_active_booking_for_slot(
        &self,
        slot_id: Uuid,
        user: Uuid,
    ) -> Result<Option<Booking>, BookingError> {
        let q = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE slot_id = $1 AND user_id = $2 AND status = '{STATUS_ACTIVE}'"
        );
        let booking = sqlx::query_as::<_, Booking>(&q)
            .bind(slot_id)
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn cancel_booking(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), BookingError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'cancelled', cancelled_at = $2 \
             WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BookingError::BookingNotFound);
        }
        Ok(())
    }

    async fn list_active_bookings_for_user(
        &self,
        user: Uuid,
    ) -> Result<Vec<BookingView>, BookingError> {
        let q = format!(
            "SELECT b.id, b.slot_id, b.user_id, b.court_name, b.date, b.time_slot, b.price, \
             b.status, b.booked_at, b.cancelled_at, \
             s.court_name AS slot_court_name, s.date AS slot_date, \
             s.time_slot AS slot_time_slot, s.price AS slot_price, \
             s.is_booked AS slot_is_booked, s.booked_by AS slot_booked_by, \
             s.booked_at AS slot_booked_at \
             FROM bookings b LEFT JOIN slots s ON s.id = b.slot_id \
             WHERE b.user_id = $1 AND b.status = '{STATUS_ACTIVE}' \
             ORDER BY b.date, b.time_slot"
        );
        let rows = sqlx::query_as::<_, BookingWithSlotRow>(&q)
            .bind(user)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(BookingWithSlotRow::into_view).collect())
    }
}
