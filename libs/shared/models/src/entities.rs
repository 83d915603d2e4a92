// libs/shared/models/src/entities.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// PROFILE RECORDS (read-only inputs for the scheduling core)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// A doctor's declared consulting window for one concrete date, together
/// with the booking window during which patients may book its slots.
/// Recurring (weekday-based) availabilities are expanded into one row per
/// date at creation time. Soft-deleted, never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub consultation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub session: Session,
    pub booking_start_at: Option<DateTime<Utc>>,
    pub booking_end_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coarse time-of-day bucket used to prevent duplicate same-session
/// bookings for the same (patient, doctor, date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Morning,
    Afternoon,
    Evening,
    FullDay,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Morning => write!(f, "morning"),
            Session::Afternoon => write!(f, "afternoon"),
            Session::Evening => write!(f, "evening"),
            Session::FullDay => write!(f, "full_day"),
        }
    }
}

// ==============================================================================
// TIME SLOT
// ==============================================================================

/// A capacity-bounded bookable subdivision of an Availability. The doctor id
/// is denormalized for query convenience. `version` is bumped on every save
/// for optimistic-concurrency auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub availability_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: i32,
    pub status: SlotStatus,
    pub is_deleted: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeSlot {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Blocked,
}

impl SlotStatus {
    /// Derive the status a slot should carry given its current status and
    /// the number of active (SCHEDULED) appointments referencing it.
    ///
    /// AVAILABLE and BOOKED flip on the capacity boundary; BLOCKED is
    /// sticky and only leaves via explicit reactivation.
    pub fn recompute(current: SlotStatus, active_count: i64, max_patients: i32) -> SlotStatus {
        if current == SlotStatus::Blocked {
            return SlotStatus::Blocked;
        }
        if active_count >= max_patients as i64 {
            SlotStatus::Booked
        } else {
            SlotStatus::Available
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
            SlotStatus::Blocked => write!(f, "blocked"),
        }
    }
}

// ==============================================================================
// APPOINTMENT
// ==============================================================================

/// The relationship entity linking one patient, one doctor and one slot.
/// `scheduled_on` is the staggered reporting instant within the slot;
/// `booked_at` is the original booking instant and drives FCFS ordering
/// during shrink redistribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub time_slot_id: Uuid,
    pub status: AppointmentStatus,
    pub scheduled_on: DateTime<Utc>,
    pub booked_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_flips_to_booked_at_capacity() {
        assert_eq!(
            SlotStatus::recompute(SlotStatus::Available, 2, 2),
            SlotStatus::Booked
        );
        assert_eq!(
            SlotStatus::recompute(SlotStatus::Booked, 3, 2),
            SlotStatus::Booked
        );
    }

    #[test]
    fn recompute_frees_booked_slot_below_capacity() {
        assert_eq!(
            SlotStatus::recompute(SlotStatus::Booked, 1, 2),
            SlotStatus::Available
        );
        assert_eq!(
            SlotStatus::recompute(SlotStatus::Available, 0, 2),
            SlotStatus::Available
        );
    }

    #[test]
    fn blocked_is_sticky_below_capacity() {
        assert_eq!(
            SlotStatus::recompute(SlotStatus::Blocked, 0, 2),
            SlotStatus::Blocked
        );
        assert_eq!(
            SlotStatus::recompute(SlotStatus::Blocked, 2, 2),
            SlotStatus::Blocked
        );
    }
}
