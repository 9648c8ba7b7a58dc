use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::slot::Slot;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_CANCELLED: &str = "cancelled";

/// One reservation event. The court/date/time/price fields are a snapshot
/// taken at booking time and never change afterwards, even if the slot's
/// own price is edited later.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub user_id: Uuid,
    pub court_name: String,
    pub date: String,
    pub time_slot: String,
    pub price: f64,
    pub status: String,
    pub booked_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

/// Snapshot of a slot's bookable fields, captured by the coordinator at
/// reserve time before any mutation happens.
#[derive(Debug, Clone)]
pub struct BookingSnapshot {
    pub slot_id: Uuid,
    pub court_name: String,
    pub date: String,
    pub time_slot: String,
    pub price: f64,
}

impl BookingSnapshot {
    pub fn of(slot: &Slot) -> Self {
        BookingSnapshot {
            slot_id: slot.id,
            court_name: slot.court_name.clone(),
            date: slot.date.clone(),
            time_slot: slot.time_slot.clone(),
            price: slot.price,
        }
    }
}

/// Booking merged with its slot's current state, for the my-bookings list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub slot: Option<Slot>,
}
