use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{Slot, SlotFilter, SlotView, UserSummary};

/// Catalog of bookable slots and their occupancy state. Occupancy is only
/// ever mutated through `mark_occupied`/`mark_free`, and `mark_occupied` is
/// the storage-level arbiter for racing reserves.
#[async_trait]
pub trait SlotRegistry: Send + Sync {
    /// Slots matching the filter, ordered by date then time slot, with the
    /// occupant (if any) resolved to a user summary.
    async fn list_slots(&self, filter: &SlotFilter) -> Result<Vec<SlotView>, BookingError>;

    async fn get_slot(&self, id: Uuid) -> Result<Option<Slot>, BookingError>;

    async fn get_slot_view(&self, id: Uuid) -> Result<Option<SlotView>, BookingError>;

    /// Atomic conditional transition free -> occupied. Fails with
    /// `AlreadyBooked` when the slot is occupied at write time; callers have
    /// already established that the slot exists.
    async fn mark_occupied(
        &self,
        id: Uuid,
        user: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), BookingError>;

    /// Clears occupancy unconditionally; the coordinator has already
    /// verified the caller is the occupant.
    async fn mark_free(&self, id: Uuid) -> Result<(), BookingError>;
}

pub struct PgSlotRegistry {
    pool: PgPool,
}

impl PgSlotRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SlotOccupantRow {
    id: Uuid,
    court_name: String,
    date: String,
    time_slot: String,
    price: f64,
    is_booked: bool,
    booked_by: Option<Uuid>,
    booked_at: Option<DateTime<Utc>>,
    occupant_name: Option<String>,
    occupant_email: Option<String>,
}

impl SlotOccupantRow {
    fn into_view(self) -> SlotView {
        let occupant = match (self.booked_by, self.occupant_name, self.occupant_email) {
            (Some(id), Some(name), Some(email)) => Some(UserSummary { id, name, email }),
            _ => None,
        };
        SlotView {
            id: self.id,
            court_name: self.court_name,
            date: self.date,
            time_slot: self.time_slot,
            price: self.price,
            is_booked: self.is_booked,
            booked_by: occupant,
            booked_at: self.booked_at,
        }
    }
}

const SLOT_VIEW_SELECT: &str = "SELECT s.id, s.court_name, s.date, s.time_slot, s.price, \
     s.is_booked, s.booked_by, s.booked_at, \
     u.name AS occupant_name, u.email AS occupant_email \
     FROM slots s LEFT JOIN users u ON u.id = s.booked_by";

#[async_trait]
impl SlotRegistry for PgSlotRegistry {
    async fn list_slots(&self, filter: &SlotFilter) -> Result<Vec<SlotView>, BookingError> {
        let mut q = String::from(SLOT_VIEW_SELECT);
        let mut clauses: Vec<String> = Vec::new();
        let mut bind_idx = 1;

        if filter.date.is_some() {
            clauses.push(format!("s.date = ${}", bind_idx));
            bind_idx += 1;
        }
        if filter.court_name.is_some() {
            clauses.push(format!("s.court_name = ${}", bind_idx));
        }
        if filter.available_only {
            clauses.push("s.is_booked = FALSE".to_string());
        }

        if !clauses.is_empty() {
            q.push_str(" WHERE ");
            q.push_str(&clauses.join(" AND "));
        }
        q.push_str(" ORDER BY s.date, s.time_slot");

        let mut dbq = sqlx::query_as::<_, SlotOccupantRow>(&q);
        if let Some(ref date) = filter.date {
            dbq = dbq.bind(date);
        }
        if let Some(ref court) = filter.court_name {
            dbq = dbq.bind(court);
        }

        let rows = dbq.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(SlotOccupantRow::into_view).collect())
    }

    async fn get_slot(&self, id: Uuid) -> Result<Option<Slot>, BookingError> {
        let slot = sqlx::query_as::<_, Slot>(
            "SELECT id, court_name, date, time_slot, price, is_booked, booked_by, booked_at \
             FROM slots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(slot)
    }

    async fn get_slot_view(&self, id: Uuid) -> Result<Option<SlotView>, BookingError> {
        let q = format!("{} WHERE s.id = $1", SLOT_VIEW_SELECT);
        let row = sqlx::query_as::<_, SlotOccupantRow>(&q)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(SlotOccupantRow::into_view))
    }

    async fn mark_occupied(
        &self,
        id: Uuid,
        user: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let result = sqlx::query(
            "UPDATE slots SET is_booked = TRUE, booked_by = $2, booked_at = $3 \
             WHERE id = $1 AND is_booked = FALSE",
        )
        .bind(id)
        .bind(user)
        .bind(at)
        .execute(&self.pool)
        .await?;

        // Zero rows means another reserve won the race first.
        if result.rows_affected() == 0 {
            return Err(BookingError::AlreadyBooked);
        }
        Ok(())
    }

    async fn mark_free(&self, id: Uuid) -> Result<(), BookingError> {
        sqlx::query(
            "UPDATE slots SET is_booked = FALSE, booked_by = NULL, booked_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
