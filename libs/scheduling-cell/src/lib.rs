pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

// Re-export the core vocabulary for external use
pub use models::{
    Appointment, AppointmentStatus, BlockReason, BookingDecision, BookingRequest, DaySchedule,
    DaySlot, RejectionReason, SlotStatus, TimeOfDay, WeeklyAvailabilityRule,
};
pub use services::slots;
