pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use crate::services::{
    BookingLedger, PgBookingLedger, PgSlotRegistry, ReservationService, SlotRegistry,
};

// Shared state for the whole application
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
    pub identity: identity::IdentityProvider,
    pub registry: Arc<dyn SlotRegistry>,
    pub ledger: Arc<dyn BookingLedger>,
    pub reservations: ReservationService,
}

impl AppState {
    pub fn new(db: database::Database, config: config::Config) -> Arc<Self> {
        let identity =
            identity::IdentityProvider::new(&config.jwt.secret, config.jwt.expires_in_hours);
        let registry: Arc<dyn SlotRegistry> = Arc::new(PgSlotRegistry::new(db.pool.clone()));
        let ledger: Arc<dyn BookingLedger> = Arc::new(PgBookingLedger::new(db.pool.clone()));
        let reservations = ReservationService::new(registry.clone(), ledger.clone());

        Arc::new(Self {
            db,
            config,
            identity,
            registry,
            ledger,
            reservations,
        })
    }
}
