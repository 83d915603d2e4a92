pub mod auth;
pub mod entities;
pub mod error;

pub use auth::{CallerIdentity, Role};
pub use entities::{
    Appointment, AppointmentStatus, Availability, Doctor, Patient, Session, SlotStatus, TimeSlot,
};
pub use error::AppError;
