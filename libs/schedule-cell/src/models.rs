// libs/schedule-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::Session;

// ==============================================================================
// AVAILABILITY REQUEST MODELS
// ==============================================================================

/// Either `date` (one-off) or `weekdays` (recurring, expanded over the
/// configured look-ahead) must be present. Times of day are "HH:MM".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub date: Option<NaiveDate>,
    pub weekdays: Option<Vec<String>>,
    pub start_time: String,
    pub end_time: String,
    pub session: Session,
    pub booking_start_at: Option<DateTime<Utc>>,
    pub booking_end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub session: Option<Session>,
    pub booking_start_at: Option<DateTime<Utc>>,
    pub booking_end_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// SLOT REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub start_time: String,
    pub end_time: String,
    pub max_patients: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_patients: Option<i32>,
}

/// A bookable slot annotated with live capacity, as returned by the
/// available-slot listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotView {
    pub slot_id: Uuid,
    pub availability_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub session: Session,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: i32,
    pub booked_count: i64,
    pub available_count: i64,
    pub is_full: bool,
}
