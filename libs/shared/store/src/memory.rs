use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentStatus, AppError, Availability, Doctor, Patient, Session, TimeSlot,
};

use crate::ScheduleStore;

#[derive(Debug, Default)]
struct State {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    availabilities: HashMap<Uuid, Availability>,
    slots: HashMap<Uuid, TimeSlot>,
    appointments: HashMap<Uuid, Appointment>,
}

/// In-process [`ScheduleStore`] over keyed maps. Backs the test suites and
/// any embedding binary that does not bring its own persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn insert_doctor(&self, doctor: Doctor) -> Result<Doctor, AppError> {
        let mut state = self.state.write().await;
        state.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn insert_patient(&self, patient: Patient) -> Result<Patient, AppError> {
        let mut state = self.state.write().await;
        state.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, AppError> {
        Ok(self.state.read().await.doctors.get(&id).cloned())
    }

    async fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, AppError> {
        Ok(self.state.read().await.patients.get(&id).cloned())
    }

    async fn insert_availability(
        &self,
        availability: Availability,
    ) -> Result<Availability, AppError> {
        let mut state = self.state.write().await;
        state
            .availabilities
            .insert(availability.id, availability.clone());
        Ok(availability)
    }

    async fn find_availability(&self, id: Uuid) -> Result<Option<Availability>, AppError> {
        Ok(self.state.read().await.availabilities.get(&id).cloned())
    }

    async fn save_availability(
        &self,
        mut availability: Availability,
    ) -> Result<Availability, AppError> {
        availability.updated_at = Utc::now();
        let mut state = self.state.write().await;
        if !state.availabilities.contains_key(&availability.id) {
            return Err(AppError::internal("saving unknown availability row"));
        }
        state
            .availabilities
            .insert(availability.id, availability.clone());
        Ok(availability)
    }

    async fn list_availabilities(&self, doctor_id: Uuid) -> Result<Vec<Availability>, AppError> {
        let state = self.state.read().await;
        let mut rows: Vec<Availability> = state
            .availabilities
            .values()
            .filter(|a| a.doctor_id == doctor_id && !a.is_deleted)
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.consultation_date, a.start_time));
        Ok(rows)
    }

    async fn insert_slot(&self, slot: TimeSlot) -> Result<TimeSlot, AppError> {
        let mut state = self.state.write().await;
        state.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn find_slot(&self, id: Uuid) -> Result<Option<TimeSlot>, AppError> {
        Ok(self.state.read().await.slots.get(&id).cloned())
    }

    async fn save_slot(&self, mut slot: TimeSlot) -> Result<TimeSlot, AppError> {
        slot.version += 1;
        slot.updated_at = Utc::now();
        let mut state = self.state.write().await;
        if !state.slots.contains_key(&slot.id) {
            return Err(AppError::internal("saving unknown slot row"));
        }
        state.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn list_slots(&self, availability_id: Uuid) -> Result<Vec<TimeSlot>, AppError> {
        let state = self.state.read().await;
        let mut rows: Vec<TimeSlot> = state
            .slots
            .values()
            .filter(|s| s.availability_id == availability_id && !s.is_deleted)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.start_time);
        Ok(rows)
    }

    async fn insert_appointment(
        &self,
        appointment: Appointment,
    ) -> Result<Appointment, AppError> {
        let mut state = self.state.write().await;
        state
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, AppError> {
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }

    async fn save_appointment(
        &self,
        mut appointment: Appointment,
    ) -> Result<Appointment, AppError> {
        appointment.updated_at = Utc::now();
        let mut state = self.state.write().await;
        if !state.appointments.contains_key(&appointment.id) {
            return Err(AppError::internal("saving unknown appointment row"));
        }
        state
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn count_scheduled(&self, slot_id: Uuid) -> Result<i64, AppError> {
        let state = self.state.read().await;
        let count = state
            .appointments
            .values()
            .filter(|a| a.time_slot_id == slot_id && a.status == AppointmentStatus::Scheduled)
            .count();
        Ok(count as i64)
    }

    async fn list_scheduled_for_slot(
        &self,
        slot_id: Uuid,
    ) -> Result<Vec<Appointment>, AppError> {
        let state = self.state.read().await;
        let mut rows: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.time_slot_id == slot_id && a.status == AppointmentStatus::Scheduled)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.booked_at);
        Ok(rows)
    }

    async fn list_appointments_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, AppError> {
        let state = self.state.read().await;
        let mut rows: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.scheduled_on);
        Ok(rows)
    }

    async fn list_appointments_for_doctor(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, AppError> {
        let state = self.state.read().await;
        let mut rows: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.scheduled_on);
        Ok(rows)
    }

    async fn find_duplicate_session(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        session: Session,
    ) -> Result<Option<Appointment>, AppError> {
        let state = self.state.read().await;
        for appointment in state.appointments.values() {
            if appointment.patient_id != patient_id
                || appointment.doctor_id != doctor_id
                || appointment.status != AppointmentStatus::Scheduled
            {
                continue;
            }
            let Some(slot) = state.slots.get(&appointment.time_slot_id) else {
                continue;
            };
            let Some(availability) = state.availabilities.get(&slot.availability_id) else {
                continue;
            };
            if availability.consultation_date == date && availability.session == session {
                return Ok(Some(appointment.clone()));
            }
        }
        Ok(None)
    }
}
