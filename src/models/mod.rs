pub mod booking;
pub mod slot;
pub mod user;

pub use booking::{Booking, BookingSnapshot, BookingView};
pub use slot::{Slot, SlotFilter, SlotView};
pub use user::{User, UserSummary};
