pub mod models;
pub mod services;

pub use models::{
    BookAppointmentRequest, MoveSlotsResult, ReassignmentDetail, RescheduleOutcome,
    RescheduleRequest, ShiftTimeResult, ShiftedSlotDetail, ShrinkResult, ShrinkStrategy,
};
pub use services::{BookingService, LifecycleService, RescheduleService};
