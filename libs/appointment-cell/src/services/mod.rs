pub mod booking;
pub mod lifecycle;
pub mod reschedule;

pub use booking::BookingService;
pub use lifecycle::LifecycleService;
pub use reschedule::RescheduleService;
