use chrono::{Days, Utc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use court_booking::database::Database;

const COURTS: &[(&str, f64)] = &[
    ("Court A - Indoor", 800.0),
    ("Court B - Outdoor", 600.0),
    ("Court C - Premium", 1200.0),
];

const TIME_SLOTS: &[&str] = &[
    "06:00 - 07:00",
    "07:00 - 08:00",
    "08:00 - 09:00",
    "09:00 - 10:00",
    "10:00 - 11:00",
    "11:00 - 12:00",
    "12:00 - 13:00",
    "13:00 - 14:00",
    "14:00 - 15:00",
    "15:00 - 16:00",
    "16:00 - 17:00",
    "17:00 - 18:00",
    "18:00 - 19:00",
    "19:00 - 20:00",
    "20:00 - 21:00",
    "21:00 - 22:00",
];

/// Provisions the slot catalog: every court gets an hourly grid for the next
/// seven days. Wipes existing slots (and their bookings) first.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("court_booking=info"))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")?;
    let db = Database::new(&database_url, 5).await?;
    db.run_migrations().await?;
    info!("Database connected");

    let mut tx = db.pool.begin().await?;

    sqlx::query("DELETE FROM bookings").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM slots").execute(&mut *tx).await?;
    info!("Cleared existing slots and bookings");

    let today = Utc::now().date_naive();
    let mut inserted = 0u32;

    for day in 0..7 {
        let date = today
            .checked_add_days(Days::new(day))
            .expect("date within range")
            .format("%Y-%m-%d")
            .to_string();

        for (court, price) in COURTS {
            for time_slot in TIME_SLOTS {
                sqlx::query(
                    "INSERT INTO slots (court_name, date, time_slot, price) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(court)
                .bind(&date)
                .bind(time_slot)
                .bind(price)
                .execute(&mut *tx)
                .await?;
                inserted += 1;
            }
        }
    }

    tx.commit().await?;
    info!("Seeded {} slots", inserted);

    Ok(())
}
