use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::user::UserSummary;

/// A bookable (court, date, time) unit. The triple is unique; occupancy
/// fields are mutated only by the reservation coordinator.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: Uuid,
    pub court_name: String,
    /// "YYYY-MM-DD"
    pub date: String,
    /// "HH:MM - HH:MM"
    pub time_slot: String,
    pub price: f64,
    pub is_booked: bool,
    pub booked_by: Option<Uuid>,
    pub booked_at: Option<DateTime<Utc>>,
}

/// Slot with its occupant resolved to a user summary, for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub id: Uuid,
    pub court_name: String,
    pub date: String,
    pub time_slot: String,
    pub price: f64,
    pub is_booked: bool,
    pub booked_by: Option<UserSummary>,
    pub booked_at: Option<DateTime<Utc>>,
}

impl SlotView {
    pub fn from_slot(slot: Slot, occupant: Option<UserSummary>) -> Self {
        SlotView {
            id: slot.id,
            court_name: slot.court_name,
            date: slot.date,
            time_slot: slot.time_slot,
            price: slot.price,
            is_booked: slot.is_booked,
            booked_by: occupant,
            booked_at: slot.booked_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SlotFilter {
    pub date: Option<String>,
    pub court_name: Option<String>,
    pub available_only: bool,
}
