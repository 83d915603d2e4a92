// libs/schedule-cell/src/services/slots.rs
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_models::{AppError, Availability, SlotStatus, TimeSlot};
use shared_store::ScheduleStore;

use crate::models::{AvailableSlotView, CreateSlotRequest, UpdateSlotRequest};
use crate::times;

/// Manages the capacity-bounded slots under an availability and keeps each
/// slot's derived status in sync with its live booking count.
#[derive(Clone)]
pub struct SlotService {
    store: Arc<dyn ScheduleStore>,
    config: SchedulingConfig,
}

impl SlotService {
    pub fn new(store: Arc<dyn ScheduleStore>, config: SchedulingConfig) -> Self {
        Self { store, config }
    }

    pub async fn create_slot(
        &self,
        doctor_id: Uuid,
        availability_id: Uuid,
        request: CreateSlotRequest,
    ) -> Result<TimeSlot, AppError> {
        let availability = self.owned_availability(doctor_id, availability_id).await?;

        // Step 1: the slot window must be well-formed and sit inside the
        // availability's consulting window.
        let start_time = times::parse_hhmm(&request.start_time)?;
        let end_time = times::parse_hhmm(&request.end_time)?;
        if start_time >= end_time {
            return Err(AppError::validation(
                "start_time must be strictly before end_time",
            ));
        }
        if start_time < availability.start_time || end_time > availability.end_time {
            return Err(AppError::validation(format!(
                "slot {} - {} falls outside the consulting window {} - {}",
                request.start_time,
                request.end_time,
                times::format_hhmm(availability.start_time),
                times::format_hhmm(availability.end_time)
            )));
        }
        self.validate_capacity(request.max_patients)?;

        // Step 2: no overlap with sibling slots.
        let siblings = self.store.list_slots(availability_id).await?;
        if let Some(other) = siblings
            .iter()
            .find(|s| start_time < s.end_time && s.start_time < end_time)
        {
            return Err(AppError::conflict(format!(
                "slot overlaps existing slot {} - {}",
                times::format_hhmm(other.start_time),
                times::format_hhmm(other.end_time)
            )));
        }

        let now = Utc::now();
        let slot = TimeSlot {
            id: Uuid::new_v4(),
            availability_id,
            doctor_id,
            start_time,
            end_time,
            max_patients: request.max_patients,
            status: SlotStatus::Available,
            is_deleted: false,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let slot = self.store.insert_slot(slot).await?;
        info!(
            "Created slot {} ({} - {}, capacity {}) under availability {}",
            slot.id, request.start_time, request.end_time, slot.max_patients, availability_id
        );
        Ok(slot)
    }

    /// Update a slot's window or capacity. Capacity can never drop below
    /// the number of appointments already scheduled into the slot.
    pub async fn update_slot(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
        request: UpdateSlotRequest,
    ) -> Result<TimeSlot, AppError> {
        let mut slot = self.owned_slot(doctor_id, slot_id).await?;
        // Slot updates work independently of the parent's soft-delete
        // state, so the containment check reads the row as-is.
        let availability = self
            .store
            .find_availability(slot.availability_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Availability {} not found", slot.availability_id))
            })?;

        if let Some(raw) = &request.start_time {
            slot.start_time = times::parse_hhmm(raw)?;
        }
        if let Some(raw) = &request.end_time {
            slot.end_time = times::parse_hhmm(raw)?;
        }
        if slot.start_time >= slot.end_time {
            return Err(AppError::validation(
                "start_time must be strictly before end_time",
            ));
        }
        if slot.start_time < availability.start_time || slot.end_time > availability.end_time {
            return Err(AppError::validation(
                "slot window falls outside the consulting window",
            ));
        }

        let active_count = self.store.count_scheduled(slot.id).await?;
        if let Some(max_patients) = request.max_patients {
            self.validate_capacity(max_patients)?;
            if (max_patients as i64) < active_count {
                return Err(AppError::conflict(format!(
                    "cannot reduce capacity to {} with {} appointments already scheduled",
                    max_patients, active_count
                )));
            }
            slot.max_patients = max_patients;
        }

        slot.status = SlotStatus::recompute(slot.status, active_count, slot.max_patients);
        let slot = self.store.save_slot(slot).await?;
        info!("Updated slot {}", slot.id);
        Ok(slot)
    }

    /// Soft-delete a slot. Refused while appointments are still scheduled
    /// into it; those must be cancelled or rescheduled away first.
    pub async fn delete_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<TimeSlot, AppError> {
        let mut slot = self.owned_slot(doctor_id, slot_id).await?;
        let active_count = self.store.count_scheduled(slot.id).await?;
        if active_count > 0 {
            return Err(AppError::conflict(format!(
                "slot {} still has {} scheduled appointment(s)",
                slot_id, active_count
            )));
        }
        slot.is_deleted = true;
        slot.status = SlotStatus::Blocked;
        let slot = self.store.save_slot(slot).await?;
        info!("Soft-deleted slot {}", slot.id);
        Ok(slot)
    }

    /// Take a slot out of booking circulation without deleting it. BLOCKED
    /// is sticky: status recomputation never lifts it.
    pub async fn block_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<TimeSlot, AppError> {
        let mut slot = self.owned_slot(doctor_id, slot_id).await?;
        slot.status = SlotStatus::Blocked;
        let slot = self.store.save_slot(slot).await?;
        info!("Blocked slot {}", slot.id);
        Ok(slot)
    }

    /// Bring a blocked or soft-deleted slot back into circulation. The
    /// status is rebuilt from the live booking count.
    pub async fn reactivate_slot(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
    ) -> Result<TimeSlot, AppError> {
        let mut slot = self
            .store
            .find_slot(slot_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Slot {} not found", slot_id)))?;
        if slot.doctor_id != doctor_id {
            return Err(AppError::not_found(format!(
                "Slot {} not found for doctor {}",
                slot_id, doctor_id
            )));
        }

        let active_count = self.store.count_scheduled(slot.id).await?;
        slot.is_deleted = false;
        slot.status = SlotStatus::recompute(SlotStatus::Available, active_count, slot.max_patients);
        let slot = self.store.save_slot(slot).await?;
        info!("Reactivated slot {} as {}", slot.id, slot.status);
        Ok(slot)
    }

    /// Re-derive a slot's status from its live booking count and persist
    /// only if it actually changed. Returns the up-to-date slot either way.
    pub async fn recompute_status(&self, slot: TimeSlot) -> Result<TimeSlot, AppError> {
        let active_count = self.store.count_scheduled(slot.id).await?;
        let next = SlotStatus::recompute(slot.status, active_count, slot.max_patients);
        if next == slot.status {
            return Ok(slot);
        }
        debug!(
            "Slot {} status {} -> {} ({}/{} booked)",
            slot.id, slot.status, next, active_count, slot.max_patients
        );
        let mut slot = slot;
        slot.status = next;
        self.store.save_slot(slot).await
    }

    /// Bookable slots for a doctor: not deleted, not blocked, not full.
    /// Ordered by date then start time, paginated after filtering so page
    /// boundaries stay stable.
    pub async fn list_available_slots(
        &self,
        doctor_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AvailableSlotView>, AppError> {
        let availabilities = self.store.list_availabilities(doctor_id).await?;

        let mut views = Vec::new();
        for availability in &availabilities {
            for slot in self.store.list_slots(availability.id).await? {
                if slot.status == SlotStatus::Blocked {
                    continue;
                }
                let booked_count = self.store.count_scheduled(slot.id).await?;
                if booked_count >= slot.max_patients as i64 {
                    continue;
                }
                views.push(AvailableSlotView {
                    slot_id: slot.id,
                    availability_id: availability.id,
                    doctor_id,
                    date: availability.consultation_date,
                    session: availability.session,
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                    max_patients: slot.max_patients,
                    booked_count,
                    available_count: slot.max_patients as i64 - booked_count,
                    is_full: false,
                });
            }
        }

        views.sort_by_key(|v| (v.date, v.start_time));
        Ok(views.into_iter().skip(offset).take(limit).collect())
    }

    fn validate_capacity(&self, max_patients: i32) -> Result<(), AppError> {
        if max_patients < 1 || max_patients > self.config.max_slot_capacity {
            return Err(AppError::validation(format!(
                "max_patients must be between 1 and {}",
                self.config.max_slot_capacity
            )));
        }
        Ok(())
    }

    async fn owned_availability(
        &self,
        doctor_id: Uuid,
        availability_id: Uuid,
    ) -> Result<Availability, AppError> {
        let availability = self
            .store
            .find_availability(availability_id)
            .await?
            .filter(|a| !a.is_deleted)
            .ok_or_else(|| {
                AppError::not_found(format!("Availability {} not found", availability_id))
            })?;
        if availability.doctor_id != doctor_id {
            return Err(AppError::not_found(format!(
                "Availability {} not found for doctor {}",
                availability_id, doctor_id
            )));
        }
        Ok(availability)
    }

    async fn owned_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<TimeSlot, AppError> {
        let slot = self
            .store
            .find_slot(slot_id)
            .await?
            .filter(|s| !s.is_deleted)
            .ok_or_else(|| AppError::not_found(format!("Slot {} not found", slot_id)))?;
        if slot.doctor_id != doctor_id {
            return Err(AppError::not_found(format!(
                "Slot {} not found for doctor {}",
                slot_id, doctor_id
            )));
        }
        Ok(slot)
    }
}
