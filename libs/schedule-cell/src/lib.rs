pub mod models;
pub mod services;
pub mod times;

pub use models::{
    AvailableSlotView, CreateAvailabilityRequest, CreateSlotRequest, UpdateAvailabilityRequest,
    UpdateSlotRequest,
};
pub use services::{AvailabilityService, SlotService};
