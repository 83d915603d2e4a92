// libs/appointment-cell/src/services/reschedule.rs
//
// The three doctor-initiated reschedule operations: slot-to-slot move,
// whole-availability time shift, and shrink with FCFS redistribution of
// displaced appointments. All three run under the doctor's row lock so a
// doctor's schedule is only ever reshaped by one operation at a time;
// capacity-sensitive reads additionally hold the involved slot locks.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use schedule_cell::services::SlotService;
use schedule_cell::times;
use shared_config::SchedulingConfig;
use shared_models::{AppError, Appointment, Availability, SlotStatus, TimeSlot};
use shared_store::{LockRegistry, ScheduleStore};

use crate::models::{
    MoveSlotsResult, ReassignmentDetail, RescheduleOutcome, RescheduleRequest, ShiftTimeResult,
    ShiftedSlotDetail, ShrinkResult, ShrinkStrategy,
};
use crate::services::booking::staggered_reporting_time;

#[derive(Clone)]
pub struct RescheduleService {
    store: Arc<dyn ScheduleStore>,
    locks: Arc<LockRegistry>,
    config: SchedulingConfig,
    slot_service: SlotService,
}

/// A slot that can absorb displaced appointments, with the capacity
/// bookkeeping for one allocation pass.
struct CandidateSlot {
    slot: TimeSlot,
    availability: Availability,
    base_count: i64,
    remaining: i64,
    assigned: i64,
}

impl RescheduleService {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        locks: Arc<LockRegistry>,
        config: SchedulingConfig,
        slot_service: SlotService,
    ) -> Self {
        Self {
            store,
            locks,
            config,
            slot_service,
        }
    }

    /// Dispatch a reschedule request to the operation named by its tag.
    pub async fn unified_reschedule(
        &self,
        doctor_id: Uuid,
        request: RescheduleRequest,
    ) -> Result<RescheduleOutcome, AppError> {
        info!(
            "Reschedule request for doctor {}: operation {:?}",
            doctor_id, request.operation
        );

        match request.operation.as_str() {
            "move_slots" => {
                let result = self
                    .move_slots(
                        doctor_id,
                        require(request.availability_id, "availability_id")?,
                        require(request.source_slot_id, "source_slot_id")?,
                        require(request.target_slot_id, "target_slot_id")?,
                        request.appointment_id,
                        request.reason,
                    )
                    .await?;
                Ok(RescheduleOutcome::MoveSlots(result))
            }
            "shift_time" => {
                let result = self
                    .shift_time(
                        doctor_id,
                        require(request.availability_id, "availability_id")?,
                        require(request.new_start_time, "new_start_time")?,
                        require(request.new_end_time, "new_end_time")?,
                        require(request.shift_minutes, "shift_minutes")?,
                        request.reason,
                    )
                    .await?;
                Ok(RescheduleOutcome::ShiftTime(result))
            }
            "shrink" => {
                let result = self
                    .shrink_schedule(
                        doctor_id,
                        require(request.availability_id, "availability_id")?,
                        request.new_start_time,
                        request.new_end_time,
                        request.reason,
                    )
                    .await?;
                Ok(RescheduleOutcome::Shrink(result))
            }
            other => Err(AppError::validation(format!(
                "Unknown reschedule operation {:?}",
                other
            ))),
        }
    }

    /// Move SCHEDULED appointments from one slot to another, all of them
    /// or a single one. All-or-nothing: the target must have room for the
    /// whole selection before anything is written.
    pub async fn move_slots(
        &self,
        doctor_id: Uuid,
        availability_id: Uuid,
        source_slot_id: Uuid,
        target_slot_id: Uuid,
        appointment_id: Option<Uuid>,
        reason: Option<String>,
    ) -> Result<MoveSlotsResult, AppError> {
        if source_slot_id == target_slot_id {
            return Err(AppError::validation(
                "source and target slot must be different",
            ));
        }

        let _doctor_guard = self.locks.acquire(doctor_id).await;
        let _slot_guards = self
            .locks
            .acquire_many(&[source_slot_id, target_slot_id])
            .await;

        self.owned_availability(doctor_id, availability_id).await?;
        let source = self.owned_slot(doctor_id, source_slot_id).await?;
        if source.availability_id != availability_id {
            return Err(AppError::validation(format!(
                "Slot {} does not belong to availability {}",
                source_slot_id, availability_id
            )));
        }
        let target = self.owned_slot(doctor_id, target_slot_id).await?;
        let target_availability = self
            .owned_availability(doctor_id, target.availability_id)
            .await?;

        // Select what moves: the whole slot or one named appointment.
        let moving = match appointment_id {
            Some(id) => {
                let appointment = self
                    .store
                    .find_appointment(id)
                    .await?
                    .filter(|a| {
                        a.time_slot_id == source_slot_id
                            && a.status == shared_models::AppointmentStatus::Scheduled
                    })
                    .ok_or_else(|| {
                        AppError::not_found(format!(
                            "Scheduled appointment {} not found in slot {}",
                            id, source_slot_id
                        ))
                    })?;
                vec![appointment]
            }
            None => self.store.list_scheduled_for_slot(source_slot_id).await?,
        };
        if moving.is_empty() {
            return Err(AppError::not_found(format!(
                "No scheduled appointments to move in slot {}",
                source_slot_id
            )));
        }

        let appointment_ids: Vec<Uuid> = moving.iter().map(|a| a.id).collect();
        let _appointment_guards = self.locks.acquire_many(&appointment_ids).await;

        // Capacity gate before any write.
        let target_count = self.store.count_scheduled(target_slot_id).await?;
        let available = target.max_patients as i64 - target_count;
        if available < moving.len() as i64 {
            return Err(AppError::conflict_with(
                format!(
                    "Target slot cannot absorb the move: need {}, have {}",
                    moving.len(),
                    available.max(0)
                ),
                json!({
                    "required_capacity": moving.len(),
                    "available_capacity": available.max(0),
                }),
            ));
        }

        for (index, mut appointment) in moving.into_iter().enumerate() {
            appointment.time_slot_id = target_slot_id;
            appointment.scheduled_on = staggered_reporting_time(
                &target_availability,
                &target,
                target_count + index as i64,
            );
            appointment.notes = append_reason(appointment.notes, reason.as_deref());
            self.store.save_appointment(appointment).await?;
        }

        // One status recompute per touched slot.
        self.recompute_slots(&[source_slot_id, target_slot_id])
            .await?;

        info!(
            "Moved {} appointment(s) from slot {} to slot {}",
            appointment_ids.len(),
            source_slot_id,
            target_slot_id
        );
        Ok(MoveSlotsResult {
            source_slot_id,
            target_slot_id,
            appointments_moved: appointment_ids.len(),
        })
    }

    /// Rewrite an availability's consulting window and shift every slot
    /// under it by the same signed number of minutes.
    ///
    /// Appointment reporting times are deliberately left untouched here;
    /// patients keep the instant they were told when they booked.
    pub async fn shift_time(
        &self,
        doctor_id: Uuid,
        availability_id: Uuid,
        new_start_time: String,
        new_end_time: String,
        shift_minutes: i64,
        reason: Option<String>,
    ) -> Result<ShiftTimeResult, AppError> {
        if shift_minutes == 0 {
            return Err(AppError::validation("shift_minutes must be non-zero"));
        }

        let _doctor_guard = self.locks.acquire(doctor_id).await;

        let mut availability = self.owned_availability(doctor_id, availability_id).await?;
        let new_start = times::parse_hhmm(&new_start_time)?;
        let new_end = times::parse_hhmm(&new_end_time)?;
        if new_start >= new_end {
            return Err(AppError::validation(
                "new_start_time must be strictly before new_end_time",
            ));
        }

        availability.start_time = new_start;
        availability.end_time = new_end;
        self.store.save_availability(availability).await?;

        let slots = self.store.list_slots(availability_id).await?;
        let slot_ids: Vec<Uuid> = slots.iter().map(|s| s.id).collect();
        let _slot_guards = self.locks.acquire_many(&slot_ids).await;

        let mut slots_shifted = Vec::with_capacity(slots.len());
        for mut slot in slots {
            let old_start_time = slot.start_time;
            let old_end_time = slot.end_time;
            slot.start_time = times::shift_time(slot.start_time, shift_minutes);
            slot.end_time = times::shift_time(slot.end_time, shift_minutes);
            let affected_appointments = self.store.count_scheduled(slot.id).await?;
            let slot = self.store.save_slot(slot).await?;

            debug!(
                "Shifted slot {} from {}-{} to {}-{}",
                slot.id,
                times::format_hhmm(old_start_time),
                times::format_hhmm(old_end_time),
                times::format_hhmm(slot.start_time),
                times::format_hhmm(slot.end_time)
            );
            slots_shifted.push(ShiftedSlotDetail {
                slot_id: slot.id,
                old_start_time,
                old_end_time,
                new_start_time: slot.start_time,
                new_end_time: slot.end_time,
                affected_appointments,
            });
        }

        info!(
            "Shifted availability {} by {} minute(s) across {} slot(s)",
            availability_id,
            shift_minutes,
            slots_shifted.len()
        );
        Ok(ShiftTimeResult {
            availability_id,
            shift_minutes,
            reason,
            slots_shifted,
        })
    }

    /// Reduce an availability's consulting range, redistributing displaced
    /// appointments FCFS across same-day, next-day, then multi-day spare
    /// capacity. All-or-nothing: if no tier can absorb every displaced
    /// appointment, nothing is written.
    pub async fn shrink_schedule(
        &self,
        doctor_id: Uuid,
        availability_id: Uuid,
        new_start_time: Option<String>,
        new_end_time: Option<String>,
        reason: Option<String>,
    ) -> Result<ShrinkResult, AppError> {
        if new_start_time.is_none() && new_end_time.is_none() {
            return Err(AppError::validation(
                "at least one of new_start_time or new_end_time is required",
            ));
        }

        let _doctor_guard = self.locks.acquire(doctor_id).await;

        let mut availability = self.owned_availability(doctor_id, availability_id).await?;

        let new_start = new_start_time.as_deref().map(times::parse_hhmm).transpose()?;
        let new_end = new_end_time.as_deref().map(times::parse_hhmm).transpose()?;
        if let Some(start) = new_start {
            if start <= availability.start_time {
                return Err(AppError::validation(
                    "new_start_time must be later than the current consulting start",
                ));
            }
        }
        if let Some(end) = new_end {
            if end >= availability.end_time {
                return Err(AppError::validation(
                    "new_end_time must be earlier than the current consulting end",
                ));
            }
        }
        let range_start = new_start.unwrap_or(availability.start_time);
        let range_end = new_end.unwrap_or(availability.end_time);
        if range_start >= range_end {
            return Err(AppError::validation(
                "the shrunk range must keep start before end",
            ));
        }

        // Slots that no longer fit entirely inside the new range lose
        // their appointments.
        let slots = self.store.list_slots(availability_id).await?;
        let (outside, _inside): (Vec<TimeSlot>, Vec<TimeSlot>) = slots
            .iter()
            .cloned()
            .partition(|s| s.start_time < range_start || s.end_time > range_end);

        let mut affected: Vec<Appointment> = Vec::new();
        let mut vacated_ids: Vec<Uuid> = Vec::new();
        for slot in &outside {
            let displaced = self.store.list_scheduled_for_slot(slot.id).await?;
            if !displaced.is_empty() {
                vacated_ids.push(slot.id);
            }
            affected.extend(displaced);
        }
        affected.sort_by_key(|a| a.booked_at);
        affected.dedup_by_key(|a| a.id);

        if affected.is_empty() {
            let outside_ids: Vec<Uuid> = outside.iter().map(|s| s.id).collect();
            let _slot_guards = self.locks.acquire_many(&outside_ids).await;
            availability.start_time = range_start;
            availability.end_time = range_end;
            self.store.save_availability(availability).await?;
            self.deactivate_slots(outside).await?;
            info!(
                "Shrunk availability {} with no displaced appointments",
                availability_id
            );
            return Ok(ShrinkResult {
                availability_id,
                strategy: None,
                appointments_rescheduled: 0,
                reassignments: Vec::new(),
            });
        }

        let required = affected.len() as i64;
        info!(
            "Shrink of availability {} displaces {} appointment(s)",
            availability_id, required
        );

        // Everything capacity-related is read under the involved slot
        // locks so a concurrent booking cannot invalidate the allocation.
        let future_availabilities: Vec<Availability> = self
            .store
            .list_availabilities(doctor_id)
            .await?
            .into_iter()
            .filter(|a| a.consultation_date > availability.consultation_date)
            .take(self.config.multi_day_search_limit)
            .collect();

        let mut future_slots: Vec<(Availability, Vec<TimeSlot>)> = Vec::new();
        for future in &future_availabilities {
            future_slots.push((future.clone(), self.store.list_slots(future.id).await?));
        }

        let mut lock_ids: Vec<Uuid> = slots.iter().map(|s| s.id).collect();
        lock_ids.extend(
            future_slots
                .iter()
                .flat_map(|(_, slots)| slots.iter().map(|s| s.id)),
        );
        let _slot_guards = self.locks.acquire_many(&lock_ids).await;

        // Same-day candidates are every slot under this availability except
        // the vacated ones; a slot outside the new range that holds no
        // appointments can still absorb displaced ones.
        let same_day_pool: Vec<TimeSlot> = slots
            .iter()
            .filter(|s| !vacated_ids.contains(&s.id))
            .cloned()
            .collect();

        let counts = self.scheduled_counts(&same_day_pool, &future_slots).await?;
        let (strategy, mut candidates) = self
            .pick_strategy(&availability, &same_day_pool, &future_slots, &counts, required)
            .map_err(|err| {
                warn!(
                    "Shrink of availability {} found insufficient capacity",
                    availability_id
                );
                err
            })?;
        info!(
            "Shrink redistribution uses the {:?} tier across {} candidate slot(s)",
            strategy,
            candidates.len()
        );

        let appointment_ids: Vec<Uuid> = affected.iter().map(|a| a.id).collect();
        let _appointment_guards = self.locks.acquire_many(&appointment_ids).await;

        // Greedy FCFS allocation against local counters; nothing here can
        // re-read stale capacity mid-pass.
        let mut placements: Vec<(Appointment, usize)> = Vec::with_capacity(affected.len());
        let mut cursor = 0usize;
        for appointment in affected {
            while candidates[cursor].remaining == 0 {
                cursor += 1;
            }
            candidates[cursor].remaining -= 1;
            placements.push((appointment, cursor));
        }

        // Reassign every displaced appointment before touching the
        // availability or the vacated slots.
        let old_slots: HashMap<Uuid, TimeSlot> =
            outside.iter().map(|s| (s.id, s.clone())).collect();
        let mut reassignments = Vec::with_capacity(placements.len());
        for (mut appointment, cand_index) in placements {
            let candidate = &mut candidates[cand_index];
            let index_in_slot = candidate.base_count + candidate.assigned;
            candidate.assigned += 1;

            let old_slot_id = appointment.time_slot_id;
            let old_start_time = old_slots
                .get(&old_slot_id)
                .map(|s| s.start_time)
                .unwrap_or(appointment.scheduled_on.time());

            appointment.time_slot_id = candidate.slot.id;
            appointment.scheduled_on =
                staggered_reporting_time(&candidate.availability, &candidate.slot, index_in_slot);
            appointment.notes = append_reason(appointment.notes, reason.as_deref());
            let appointment = self.store.save_appointment(appointment).await?;

            let patient_name = self
                .store
                .find_patient(appointment.patient_id)
                .await?
                .map(|p| p.full_name)
                .unwrap_or_else(|| "unknown patient".to_string());
            let new_date = (candidate.availability.consultation_date
                != availability.consultation_date)
                .then_some(candidate.availability.consultation_date);

            reassignments.push(ReassignmentDetail {
                appointment_id: appointment.id,
                patient_name,
                old_slot_id,
                new_slot_id: candidate.slot.id,
                old_start_time,
                new_start_time: candidate.slot.start_time,
                new_date,
            });
        }

        // Apply the shrink itself, then retire every outside slot left
        // with nothing scheduled. An outside slot that just absorbed
        // displaced appointments stays active.
        availability.start_time = range_start;
        availability.end_time = range_end;
        self.store.save_availability(availability).await?;
        let mut emptied = Vec::new();
        for slot in outside {
            if self.store.count_scheduled(slot.id).await? == 0 {
                emptied.push(slot);
            }
        }
        self.deactivate_slots(emptied).await?;

        let target_ids: Vec<Uuid> = candidates
            .iter()
            .filter(|c| c.assigned > 0)
            .map(|c| c.slot.id)
            .collect();
        self.recompute_slots(&target_ids).await?;

        info!(
            "Shrink of availability {} rescheduled {} appointment(s) via {:?}",
            availability_id,
            reassignments.len(),
            strategy
        );
        Ok(ShrinkResult {
            availability_id,
            strategy: Some(strategy),
            appointments_rescheduled: reassignments.len(),
            reassignments,
        })
    }

    /// Three-tier capacity search: same-day spare slots, then the next
    /// consulting day, then up to the configured number of future days.
    /// The first tier that can absorb the whole displacement wins.
    fn pick_strategy(
        &self,
        availability: &Availability,
        same_day_pool: &[TimeSlot],
        future_slots: &[(Availability, Vec<TimeSlot>)],
        counts: &HashMap<Uuid, i64>,
        required: i64,
    ) -> Result<(ShrinkStrategy, Vec<CandidateSlot>), AppError> {
        let same_day = candidate_slots(availability, same_day_pool, counts);
        let same_day_capacity = capacity_of(&same_day);
        if same_day_capacity >= required {
            return Ok((ShrinkStrategy::SameDay, same_day));
        }

        if let Some((next_availability, slots)) = future_slots.first() {
            let next_day = candidate_slots(next_availability, slots, counts);
            if capacity_of(&next_day) >= required {
                return Ok((ShrinkStrategy::NextDay, next_day));
            }
        }

        let mut multi_day = Vec::new();
        for (future, slots) in future_slots {
            multi_day.extend(candidate_slots(future, slots, counts));
            if capacity_of(&multi_day) >= required {
                return Ok((ShrinkStrategy::MultiDay, multi_day));
            }
        }

        let available = capacity_of(&multi_day).max(same_day_capacity);
        Err(AppError::conflict_with(
            format!(
                "Insufficient capacity to reschedule displaced appointments: need {}, have {}",
                required, available
            ),
            json!({
                "required_capacity": required,
                "available_capacity": available,
                "recommendation":
                    "free up capacity by adding slots or widening a future availability, then retry",
            }),
        ))
    }

    async fn scheduled_counts(
        &self,
        same_day_pool: &[TimeSlot],
        future_slots: &[(Availability, Vec<TimeSlot>)],
    ) -> Result<HashMap<Uuid, i64>, AppError> {
        let mut counts = HashMap::new();
        for slot in same_day_pool {
            counts.insert(slot.id, self.store.count_scheduled(slot.id).await?);
        }
        for (_, slots) in future_slots {
            for slot in slots {
                counts.insert(slot.id, self.store.count_scheduled(slot.id).await?);
            }
        }
        Ok(counts)
    }

    /// Mark vacated slots BLOCKED and soft-deleted.
    async fn deactivate_slots(&self, slots: Vec<TimeSlot>) -> Result<(), AppError> {
        for mut slot in slots {
            slot.status = SlotStatus::Blocked;
            slot.is_deleted = true;
            self.store.save_slot(slot).await?;
        }
        Ok(())
    }

    async fn recompute_slots(&self, slot_ids: &[Uuid]) -> Result<(), AppError> {
        let mut seen: Vec<Uuid> = slot_ids.to_vec();
        seen.sort();
        seen.dedup();
        for slot_id in seen {
            if let Some(slot) = self.store.find_slot(slot_id).await? {
                self.slot_service.recompute_status(slot).await?;
            }
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

/// Spare capacity under one availability: AVAILABLE, non-deleted slots with
/// room left, in start-time order.
fn candidate_slots(
    availability: &Availability,
    slots: &[TimeSlot],
    counts: &HashMap<Uuid, i64>,
) -> Vec<CandidateSlot> {
    let mut candidates: Vec<CandidateSlot> = slots
        .iter()
        .filter(|s| s.status == SlotStatus::Available && !s.is_deleted)
        .filter_map(|s| {
            let base_count = counts.get(&s.id).copied().unwrap_or(0);
            let remaining = s.max_patients as i64 - base_count;
            (remaining > 0).then(|| CandidateSlot {
                slot: s.clone(),
                availability: availability.clone(),
                base_count,
                remaining,
                assigned: 0,
            })
        })
        .collect();
    candidates.sort_by_key(|c| c.slot.start_time);
    candidates
}

fn capacity_of(candidates: &[CandidateSlot]) -> i64 {
    candidates.iter().map(|c| c.remaining).sum()
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::validation(format!("{} is required for this operation", field)))
}

fn append_reason(notes: Option<String>, reason: Option<&str>) -> Option<String> {
    let Some(reason) = reason else {
        return notes;
    };
    let line = format!("Rescheduled: {}", reason);
    Some(match notes {
        Some(existing) => format!("{}\n{}", existing, line),
        None => line,
    })
}
