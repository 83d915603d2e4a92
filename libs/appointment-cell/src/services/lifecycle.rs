// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use schedule_cell::services::SlotService;
use shared_models::{AppError, Appointment, AppointmentStatus, CallerIdentity, Role};
use shared_store::{LockRegistry, ScheduleStore};
use shared_utils::Clock;

/// Post-booking appointment lifecycle: cancellation, completion and the
/// caller-scoped listing views. Per-appointment mutations run under the
/// appointment's row lock so a concurrent cancel and reschedule of the
/// same row serialize instead of silently overwriting each other.
#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn ScheduleStore>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn Clock>,
    slot_service: SlotService,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        locks: Arc<LockRegistry>,
        clock: Arc<dyn Clock>,
        slot_service: SlotService,
    ) -> Self {
        Self {
            store,
            locks,
            clock,
            slot_service,
        }
    }

    /// Cancel a SCHEDULED appointment before its reporting time, freeing
    /// one capacity unit in the slot.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        caller: &CallerIdentity,
    ) -> Result<Appointment, AppError> {
        let _guard = self.locks.acquire(appointment_id).await;

        let mut appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Appointment {} not found", appointment_id))
            })?;

        // Only the booking patient or the assigned doctor may cancel.
        let authorized = match caller.role {
            Role::Patient => appointment.patient_id == caller.id,
            Role::Doctor => appointment.doctor_id == caller.id,
        };
        if !authorized {
            return Err(AppError::conflict(
                "Only the booking patient or the assigned doctor can cancel this appointment",
            ));
        }

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(AppError::conflict(format!(
                "Appointment is already {}",
                appointment.status
            )));
        }

        if self.clock.now() >= appointment.scheduled_on {
            return Err(AppError::conflict(
                "Too late to cancel: the consulting time has already started",
            ));
        }

        appointment.status = AppointmentStatus::Cancelled;
        let appointment = self.store.save_appointment(appointment).await?;

        if let Some(slot) = self.store.find_slot(appointment.time_slot_id).await? {
            self.slot_service.recompute_status(slot).await?;
        }

        info!(
            "Cancelled appointment {} by {} {}",
            appointment.id, caller.role, caller.id
        );
        Ok(appointment)
    }

    /// Mark a SCHEDULED appointment as completed. Doctor-initiated.
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Appointment, AppError> {
        let _guard = self.locks.acquire(appointment_id).await;

        let mut appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .filter(|a| a.doctor_id == doctor_id)
            .ok_or_else(|| {
                AppError::not_found(format!("Appointment {} not found", appointment_id))
            })?;

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(AppError::conflict(format!(
                "Cannot complete an appointment that is {}",
                appointment.status
            )));
        }

        appointment.status = AppointmentStatus::Completed;
        let appointment = self.store.save_appointment(appointment).await?;

        if let Some(slot) = self.store.find_slot(appointment.time_slot_id).await? {
            self.slot_service.recompute_status(slot).await?;
        }

        info!("Completed appointment {}", appointment.id);
        Ok(appointment)
    }

    /// Appointments visible to the caller, optionally filtered by status.
    /// SCHEDULED listings read soonest-first; everything else reads most
    /// recent first.
    pub async fn list_appointments(
        &self,
        caller: &CallerIdentity,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppError> {
        let mut appointments = match caller.role {
            Role::Patient => self.store.list_appointments_for_patient(caller.id).await?,
            Role::Doctor => self.store.list_appointments_for_doctor(caller.id).await?,
        };

        if let Some(status) = status {
            appointments.retain(|a| a.status == status);
        }

        match status {
            Some(AppointmentStatus::Scheduled) => {
                appointments.sort_by_key(|a| a.scheduled_on);
            }
            _ => {
                appointments.sort_by_key(|a| std::cmp::Reverse(a.scheduled_on));
            }
        }
        Ok(appointments)
    }
}
