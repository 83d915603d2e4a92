// libs/appointment-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// BOOKING REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub time_slot_id: Uuid,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

// ==============================================================================
// RESCHEDULE REQUEST MODELS
// ==============================================================================

/// Wire shape for the unified reschedule entry point. `operation` selects
/// one of "move_slots", "shift_time" or "shrink"; the other fields are
/// required or ignored depending on the selected operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub operation: String,
    pub availability_id: Option<Uuid>,
    pub source_slot_id: Option<Uuid>,
    pub target_slot_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub new_start_time: Option<String>,
    pub new_end_time: Option<String>,
    pub shift_minutes: Option<i64>,
    pub reason: Option<String>,
}

// ==============================================================================
// RESCHEDULE RESULT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum RescheduleOutcome {
    MoveSlots(MoveSlotsResult),
    ShiftTime(ShiftTimeResult),
    Shrink(ShrinkResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveSlotsResult {
    pub source_slot_id: Uuid,
    pub target_slot_id: Uuid,
    pub appointments_moved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftTimeResult {
    pub availability_id: Uuid,
    pub shift_minutes: i64,
    /// Doctor-supplied justification, carried into the audit payload.
    pub reason: Option<String>,
    pub slots_shifted: Vec<ShiftedSlotDetail>,
}

/// Old/new time pair for one shifted slot, for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftedSlotDetail {
    pub slot_id: Uuid,
    pub old_start_time: NaiveTime,
    pub old_end_time: NaiveTime,
    pub new_start_time: NaiveTime,
    pub new_end_time: NaiveTime,
    pub affected_appointments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShrinkResult {
    pub availability_id: Uuid,
    /// Which capacity tier satisfied the redistribution, when one ran.
    pub strategy: Option<ShrinkStrategy>,
    pub appointments_rescheduled: usize,
    pub reassignments: Vec<ReassignmentDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkStrategy {
    SameDay,
    NextDay,
    MultiDay,
}

/// Where one displaced appointment landed. `new_date` is set only when the
/// appointment moved to a different day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignmentDetail {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub old_slot_id: Uuid,
    pub new_slot_id: Uuid,
    pub old_start_time: NaiveTime,
    pub new_start_time: NaiveTime,
    pub new_date: Option<NaiveDate>,
}
