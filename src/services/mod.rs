pub mod ledger;
pub mod registry;
pub mod reservations;

pub use ledger::{BookingLedger, PgBookingLedger};
pub use registry::{PgSlotRegistry, SlotRegistry};
pub use reservations::ReservationService;
