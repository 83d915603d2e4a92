// libs/appointment-cell/src/services/booking.rs
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use schedule_cell::services::SlotService;
use schedule_cell::times;
use shared_models::{
    AppError, Appointment, AppointmentStatus, Availability, SlotStatus, TimeSlot,
};
use shared_store::{LockRegistry, ScheduleStore};
use shared_utils::Clock;

use crate::models::BookAppointmentRequest;

/// Admission control for new appointments. The whole check-then-insert
/// sequence runs under the slot's row lock so two concurrent requests
/// cannot both pass the capacity check.
#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn ScheduleStore>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn Clock>,
    slot_service: SlotService,
}

impl BookingService {
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

    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppError> {
        info!(
            "Booking appointment: patient {} -> slot {}",
            patient_id, request.time_slot_id
        );

        // Hold the slot lock across every check and the insert.
        let _slot_guard = self.locks.acquire(request.time_slot_id).await;

        // Step 1: slot must exist and not be deleted.
        let slot = self
            .store
            .find_slot(request.time_slot_id)
            .await?
            .filter(|s| !s.is_deleted)
            .ok_or_else(|| {
                AppError::not_found(format!("Time slot {} not found", request.time_slot_id))
            })?;

        // Step 2: slot must currently be bookable.
        if slot.status != SlotStatus::Available {
            return Err(AppError::conflict(format!(
                "Slot is no longer available (status: {})",
                slot.status
            )));
        }

        // Step 3: booking window.
        let availability = self
            .store
            .find_availability(slot.availability_id)
            .await?
            .filter(|a| !a.is_deleted)
            .ok_or_else(|| {
                AppError::not_found(format!("Availability {} not found", slot.availability_id))
            })?;
        let consulting_start =
            times::combine(availability.consultation_date, availability.start_time);
        validate_booking_window(&availability, consulting_start, self.clock.now())?;

        // Step 4: the slot must belong to the requested doctor.
        if slot.doctor_id != request.doctor_id {
            return Err(AppError::validation(format!(
                "Slot {} does not belong to doctor {}",
                slot.id, request.doctor_id
            )));
        }

        // Step 5: patient must exist.
        self.store
            .find_patient(patient_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Patient {} not found", patient_id)))?;

        // Step 6: duplicate same-session guard.
        if let Some(existing) = self
            .store
            .find_duplicate_session(
                patient_id,
                request.doctor_id,
                availability.consultation_date,
                availability.session,
            )
            .await?
        {
            return Err(AppError::conflict_with(
                format!(
                    "Patient already has a {} appointment with this doctor on {}",
                    availability.session, availability.consultation_date
                ),
                json!({ "existing_appointment_id": existing.id }),
            ));
        }

        // Step 7: capacity.
        let active_count = self.store.count_scheduled(slot.id).await?;
        if active_count >= slot.max_patients as i64 {
            return Err(AppError::conflict_with(
                "Slot is fully booked",
                json!({
                    "max_patients": slot.max_patients,
                    "booked_count": active_count,
                }),
            ));
        }

        // Step 8: staggered reporting time for this patient's index.
        let scheduled_on = staggered_reporting_time(&availability, &slot, active_count);
        debug!(
            "Patient index {} in slot {} reports at {}",
            active_count, slot.id, scheduled_on
        );

        // Step 9: commit and re-derive slot status.
        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: request.doctor_id,
            time_slot_id: slot.id,
            status: AppointmentStatus::Scheduled,
            scheduled_on,
            booked_at: now,
            reason: request.reason,
            notes: request.notes,
            updated_at: now,
        };
        let appointment = self.store.insert_appointment(appointment).await?;
        self.slot_service.recompute_status(slot).await?;

        info!(
            "Booked appointment {} (patient {}, slot {})",
            appointment.id, patient_id, appointment.time_slot_id
        );
        Ok(appointment)
    }
}

/// Shared booking-window check. Slots in the past, availabilities with no
/// configured window, inconsistent windows, and instants outside the window
/// all fail distinctly; window-timing failures carry the minutes to or since
/// the boundary so callers can surface them.
pub fn validate_booking_window(
    availability: &Availability,
    consulting_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if now >= consulting_start {
        return Err(AppError::conflict(
            "Cannot book a slot whose consulting time has already started",
        ));
    }

    let (booking_start_at, booking_end_at) =
        match (availability.booking_start_at, availability.booking_end_at) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(AppError::validation(
                    "Availability has no booking window configured",
                ));
            }
        };

    if booking_start_at >= booking_end_at || booking_end_at > consulting_start {
        return Err(AppError::validation(
            "Availability booking window is inconsistent",
        ));
    }

    if now < booking_start_at {
        let minutes_until_open = (booking_start_at - now).num_minutes();
        return Err(AppError::conflict_with(
            "Booking window has not opened yet",
            json!({
                "booking_start_at": booking_start_at,
                "minutes_until_open": minutes_until_open,
            }),
        ));
    }

    // The window end is inclusive: booking exactly at booking_end_at succeeds.
    if now > booking_end_at {
        let minutes_since_close = (now - booking_end_at).num_minutes();
        return Err(AppError::conflict_with(
            "Booking window has closed",
            json!({
                "booking_end_at": booking_end_at,
                "minutes_since_close": minutes_since_close,
            }),
        ));
    }

    Ok(())
}

/// Reporting time for the patient at `index` (zero-based) within a slot:
/// the slot is divided evenly across its capacity and each patient reports
/// one share later than the previous one.
pub fn staggered_reporting_time(
    availability: &Availability,
    slot: &TimeSlot,
    index: i64,
) -> DateTime<Utc> {
    let share = slot.duration_minutes() / slot.max_patients as i64;
    times::combine(availability.consultation_date, slot.start_time)
        + Duration::minutes(share * index)
}
