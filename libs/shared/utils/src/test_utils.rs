use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentStatus, Availability, Doctor, Patient, Session, SlotStatus, TimeSlot,
};

/// Initialize tracing output for tests. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn test_doctor(full_name: &str) -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        full_name: full_name.to_string(),
        email: None,
        created_at: Utc::now(),
    }
}

pub fn test_patient(full_name: &str) -> Patient {
    Patient {
        id: Uuid::new_v4(),
        full_name: full_name.to_string(),
        email: None,
        created_at: Utc::now(),
    }
}

/// An availability whose booking window is already open and closes when
/// consulting starts.
pub fn test_availability(
    doctor_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    session: Session,
    booking_start_at: DateTime<Utc>,
) -> Availability {
    let now = Utc::now();
    Availability {
        id: Uuid::new_v4(),
        doctor_id,
        consultation_date: date,
        start_time: start,
        end_time: end,
        session,
        booking_start_at: Some(booking_start_at),
        booking_end_at: Some(date.and_time(start).and_utc()),
        is_deleted: false,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_slot(
    availability: &Availability,
    start: NaiveTime,
    end: NaiveTime,
    max_patients: i32,
) -> TimeSlot {
    let now = Utc::now();
    TimeSlot {
        id: Uuid::new_v4(),
        availability_id: availability.id,
        doctor_id: availability.doctor_id,
        start_time: start,
        end_time: end,
        max_patients,
        status: SlotStatus::Available,
        is_deleted: false,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_appointment(
    patient_id: Uuid,
    doctor_id: Uuid,
    time_slot_id: Uuid,
    scheduled_on: DateTime<Utc>,
    booked_at: DateTime<Utc>,
) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id,
        doctor_id,
        time_slot_id,
        status: AppointmentStatus::Scheduled,
        scheduled_on,
        booked_at,
        reason: None,
        notes: None,
        updated_at: booked_at,
    }
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}
