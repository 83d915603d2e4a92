pub mod locks;
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_models::{Appointment, AppError, Availability, Doctor, Patient, Session, TimeSlot};

pub use locks::LockRegistry;
pub use memory::MemoryStore;

/// Persistence seam for the scheduling core. The surrounding platform is
/// expected to provide an implementation backed by the real database;
/// [`MemoryStore`] is the in-process implementation used by tests and
/// embedding binaries.
///
/// Contract notes:
/// - `save_slot` bumps the slot's `version` and `updated_at` on every write.
/// - list methods exclude soft-deleted rows and return stable orderings as
///   documented per method.
/// - unexpected storage failures surface as [`AppError::Internal`].
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    // Profile records (read-only inputs for this core, writable for seeding).
    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, AppError>;
    async fn insert_patient(&self, patient: Patient) -> Result<Patient, AppError>;
    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, AppError>;
    async fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, AppError>;

    async fn insert_availability(
        &self,
        availability: Availability,
    ) -> Result<Availability, AppError>;
    async fn find_availability(&self, id: Uuid) -> Result<Option<Availability>, AppError>;
    async fn save_availability(
        &self,
        availability: Availability,
    ) -> Result<Availability, AppError>;
    /// Non-deleted availabilities for a doctor, consultation date ascending.
    async fn list_availabilities(&self, doctor_id: Uuid) -> Result<Vec<Availability>, AppError>;

    async fn insert_slot(&self, slot: TimeSlot) -> Result<TimeSlot, AppError>;
    async fn find_slot(&self, id: Uuid) -> Result<Option<TimeSlot>, AppError>;
    async fn save_slot(&self, slot: TimeSlot) -> Result<TimeSlot, AppError>;
    /// Non-deleted slots under an availability, start time ascending.
    async fn list_slots(&self, availability_id: Uuid) -> Result<Vec<TimeSlot>, AppError>;

    async fn insert_appointment(&self, appointment: Appointment)
        -> Result<Appointment, AppError>;
    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, AppError>;
    async fn save_appointment(&self, appointment: Appointment) -> Result<Appointment, AppError>;
    /// Count of SCHEDULED appointments referencing a slot.
    async fn count_scheduled(&self, slot_id: Uuid) -> Result<i64, AppError>;
    /// SCHEDULED appointments in a slot, booked_at ascending (FCFS order).
    async fn list_scheduled_for_slot(&self, slot_id: Uuid)
        -> Result<Vec<Appointment>, AppError>;
    async fn list_appointments_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, AppError>;
    async fn list_appointments_for_doctor(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, AppError>;
    /// Duplicate-session guard: an existing SCHEDULED appointment for this
    /// patient with this doctor on the given (date, session).
    async fn find_duplicate_session(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        session: Session,
    ) -> Result<Option<Appointment>, AppError>;
}
