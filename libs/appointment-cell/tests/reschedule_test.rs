// libs/appointment-cell/tests/reschedule_test.rs

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use appointment_cell::models::{
    BookAppointmentRequest, RescheduleOutcome, RescheduleRequest, ShrinkStrategy,
};
use appointment_cell::services::{BookingService, RescheduleService};
use schedule_cell::services::SlotService;
use schedule_cell::times;
use shared_config::SchedulingConfig;
use shared_models::{
    AppError, Appointment, Availability, Doctor, Session, SlotStatus, TimeSlot,
};
use shared_store::{LockRegistry, MemoryStore, ScheduleStore};
use shared_utils::test_utils::{
    hm, init_test_tracing, test_availability, test_doctor, test_patient, test_slot, ymd,
};
use shared_utils::ManualClock;

// ==============================================================================
// TEST FIXTURES AND UTILITIES
// ==============================================================================

fn base_now() -> DateTime<Utc> {
    times::combine(ymd(2026, 3, 1), hm(8, 0))
}

struct TestSetup {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    booking: BookingService,
    reschedule: RescheduleService,
    doctor: Doctor,
    availability: Availability,
    slot_a: TimeSlot,
    slot_b: TimeSlot,
}

impl TestSetup {
    /// Consulting 09:00-10:00 on 2026-03-10 with slot A 09:00-09:30 and
    /// slot B 09:30-10:00, both capacity 2.
    async fn new() -> Self {
        init_test_tracing();

        let store = Arc::new(MemoryStore::new());
        let locks = Arc::new(LockRegistry::new());
        let clock = Arc::new(ManualClock::new(base_now()));
        let slot_service = SlotService::new(store.clone(), SchedulingConfig::default());
        let booking = BookingService::new(
            store.clone(),
            locks.clone(),
            clock.clone(),
            slot_service.clone(),
        );
        let reschedule = RescheduleService::new(
            store.clone(),
            locks,
            SchedulingConfig::default(),
            slot_service,
        );

        let doctor = store
            .insert_doctor(test_doctor("Dr. Asha Rao"))
            .await
            .unwrap();
        let availability = store
            .insert_availability(test_availability(
                doctor.id,
                ymd(2026, 3, 10),
                hm(9, 0),
                hm(10, 0),
                Session::Morning,
                base_now(),
            ))
            .await
            .unwrap();
        let slot_a = store
            .insert_slot(test_slot(&availability, hm(9, 0), hm(9, 30), 2))
            .await
            .unwrap();
        let slot_b = store
            .insert_slot(test_slot(&availability, hm(9, 30), hm(10, 0), 2))
            .await
            .unwrap();

        Self {
            store,
            clock,
            booking,
            reschedule,
            doctor,
            availability,
            slot_a,
            slot_b,
        }
    }

    /// Book a fresh patient into a slot. The clock advances a minute per
    /// booking so booked_at instants are strictly ordered for FCFS checks.
    async fn book(&self, name: &str, slot_id: Uuid) -> Appointment {
        let patient = self.store.insert_patient(test_patient(name)).await.unwrap();
        let appointment = self
            .booking
            .book_appointment(
                patient.id,
                BookAppointmentRequest {
                    doctor_id: self.doctor.id,
                    time_slot_id: slot_id,
                    reason: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        self.clock.advance(Duration::minutes(1));
        appointment
    }

    async fn add_day(
        &self,
        date: chrono::NaiveDate,
        slot_capacity: i32,
    ) -> (Availability, TimeSlot) {
        let availability = self
            .store
            .insert_availability(test_availability(
                self.doctor.id,
                date,
                hm(9, 0),
                hm(10, 0),
                Session::Morning,
                base_now(),
            ))
            .await
            .unwrap();
        let slot = self
            .store
            .insert_slot(test_slot(&availability, hm(9, 0), hm(10, 0), slot_capacity))
            .await
            .unwrap();
        (availability, slot)
    }

    async fn fresh_appointment(&self, id: Uuid) -> Appointment {
        self.store.find_appointment(id).await.unwrap().unwrap()
    }

    async fn fresh_slot(&self, id: Uuid) -> TimeSlot {
        self.store.find_slot(id).await.unwrap().unwrap()
    }
}

// ==============================================================================
// UNIFIED DISPATCH
// ==============================================================================

#[tokio::test]
async fn dispatch_rejects_unknown_operation_and_missing_fields() {
    let setup = TestSetup::new().await;

    let err = setup
        .reschedule
        .unified_reschedule(
            setup.doctor.id,
            RescheduleRequest {
                operation: "swap".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Validation(_));

    let err = setup
        .reschedule
        .unified_reschedule(
            setup.doctor.id,
            RescheduleRequest {
                operation: "move_slots".to_string(),
                availability_id: Some(setup.availability.id),
                source_slot_id: Some(setup.slot_a.id),
                // target_slot_id missing
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Validation(_));
}

// ==============================================================================
// MOVE
// ==============================================================================

#[tokio::test]
async fn move_relocates_whole_slot_and_recomputes_both_statuses() {
    let setup = TestSetup::new().await;
    let first = setup.book("Ravi Menon", setup.slot_a.id).await;
    let second = setup.book("Meera Iyer", setup.slot_a.id).await;
    assert_eq!(setup.fresh_slot(setup.slot_a.id).await.status, SlotStatus::Booked);

    let outcome = setup
        .reschedule
        .unified_reschedule(
            setup.doctor.id,
            RescheduleRequest {
                operation: "move_slots".to_string(),
                availability_id: Some(setup.availability.id),
                source_slot_id: Some(setup.slot_a.id),
                target_slot_id: Some(setup.slot_b.id),
                reason: Some("equipment failure".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = match outcome {
        RescheduleOutcome::MoveSlots(result) => result,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert_eq!(result.appointments_moved, 2);

    // Emptied source reverts to AVAILABLE; target fills.
    assert_eq!(setup.fresh_slot(setup.slot_a.id).await.status, SlotStatus::Available);
    assert_eq!(setup.fresh_slot(setup.slot_b.id).await.status, SlotStatus::Booked);

    // FCFS: first booked takes the first share of the target slot.
    let first = setup.fresh_appointment(first.id).await;
    let second = setup.fresh_appointment(second.id).await;
    assert_eq!(first.time_slot_id, setup.slot_b.id);
    assert_eq!(first.scheduled_on, times::combine(ymd(2026, 3, 10), hm(9, 30)));
    assert_eq!(second.scheduled_on, times::combine(ymd(2026, 3, 10), hm(9, 45)));
    assert_eq!(first.notes.as_deref(), Some("Rescheduled: equipment failure"));
}

#[tokio::test]
async fn move_with_insufficient_target_capacity_mutates_nothing() {
    let setup = TestSetup::new().await;
    let first = setup.book("Ravi Menon", setup.slot_a.id).await;
    setup.book("Meera Iyer", setup.slot_a.id).await;
    setup.book("Anil Kumar", setup.slot_b.id).await;
    setup.book("Divya Nair", setup.slot_b.id).await;

    let err = setup
        .reschedule
        .move_slots(
            setup.doctor.id,
            setup.availability.id,
            setup.slot_a.id,
            setup.slot_b.id,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Conflict { .. });
    let details = err.conflict_details().unwrap();
    assert_eq!(details["required_capacity"], 2);
    assert_eq!(details["available_capacity"], 0);

    let untouched = setup.fresh_appointment(first.id).await;
    assert_eq!(untouched.time_slot_id, setup.slot_a.id);
    assert_eq!(untouched.scheduled_on, first.scheduled_on);
}

#[tokio::test]
async fn move_single_appointment_by_id() {
    let setup = TestSetup::new().await;
    let first = setup.book("Ravi Menon", setup.slot_a.id).await;
    let second = setup.book("Meera Iyer", setup.slot_a.id).await;

    let result = setup
        .reschedule
        .move_slots(
            setup.doctor.id,
            setup.availability.id,
            setup.slot_a.id,
            setup.slot_b.id,
            Some(second.id),
            None,
        )
        .await
        .unwrap();
    assert_eq!(result.appointments_moved, 1);

    assert_eq!(setup.fresh_appointment(first.id).await.time_slot_id, setup.slot_a.id);
    assert_eq!(setup.fresh_appointment(second.id).await.time_slot_id, setup.slot_b.id);
}

#[tokio::test]
async fn move_with_empty_source_is_not_found() {
    let setup = TestSetup::new().await;

    let err = setup
        .reschedule
        .move_slots(
            setup.doctor.id,
            setup.availability.id,
            setup.slot_a.id,
            setup.slot_b.id,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppError::NotFound(_));
}

// ==============================================================================
// TIME SHIFT
// ==============================================================================

#[tokio::test]
async fn shift_requires_non_zero_minutes() {
    let setup = TestSetup::new().await;

    let err = setup
        .reschedule
        .shift_time(
            setup.doctor.id,
            setup.availability.id,
            "10:00".to_string(),
            "11:00".to_string(),
            0,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Validation(_));
}

#[tokio::test]
async fn shift_moves_slots_but_pins_reporting_times() {
    let setup = TestSetup::new().await;
    let appointment = setup.book("Ravi Menon", setup.slot_a.id).await;

    let result = setup
        .reschedule
        .shift_time(
            setup.doctor.id,
            setup.availability.id,
            "10:00".to_string(),
            "11:00".to_string(),
            60,
            Some("clinic opening delayed".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(result.shift_minutes, 60);
    assert_eq!(result.reason.as_deref(), Some("clinic opening delayed"));
    assert_eq!(result.slots_shifted.len(), 2);
    let shifted_a = result
        .slots_shifted
        .iter()
        .find(|d| d.slot_id == setup.slot_a.id)
        .unwrap();
    assert_eq!(shifted_a.old_start_time, hm(9, 0));
    assert_eq!(shifted_a.new_start_time, hm(10, 0));
    assert_eq!(shifted_a.affected_appointments, 1);

    let availability = setup
        .store
        .find_availability(setup.availability.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(availability.start_time, hm(10, 0));
    assert_eq!(availability.end_time, hm(11, 0));

    assert_eq!(setup.fresh_slot(setup.slot_b.id).await.start_time, hm(10, 30));

    // Patients keep the reporting instant they were told when booking.
    let pinned = setup.fresh_appointment(appointment.id).await;
    assert_eq!(pinned.scheduled_on, times::combine(ymd(2026, 3, 10), hm(9, 0)));
}

// ==============================================================================
// SHRINK
// ==============================================================================

#[tokio::test]
async fn shrink_validates_direction_of_change() {
    let setup = TestSetup::new().await;

    let err = setup
        .reschedule
        .shrink_schedule(setup.doctor.id, setup.availability.id, None, None, None)
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Validation(_));

    // new_start must move later, new_end earlier.
    let err = setup
        .reschedule
        .shrink_schedule(
            setup.doctor.id,
            setup.availability.id,
            Some("08:30".to_string()),
            None,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Validation(_));

    let err = setup
        .reschedule
        .shrink_schedule(
            setup.doctor.id,
            setup.availability.id,
            None,
            Some("10:30".to_string()),
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Validation(_));
}

#[tokio::test]
async fn shrink_redistributes_same_day_and_retires_vacated_slot() {
    let setup = TestSetup::new().await;
    let first = setup.book("Ravi Menon", setup.slot_a.id).await;
    let second = setup.book("Meera Iyer", setup.slot_a.id).await;

    let result = setup
        .reschedule
        .shrink_schedule(
            setup.doctor.id,
            setup.availability.id,
            None,
            Some("09:15".to_string()),
            Some("doctor leaving early".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(result.appointments_rescheduled, 2);
    assert_eq!(result.strategy, Some(ShrinkStrategy::SameDay));

    // Both displaced appointments landed in slot B, FCFS order.
    let first = setup.fresh_appointment(first.id).await;
    let second = setup.fresh_appointment(second.id).await;
    assert_eq!(first.time_slot_id, setup.slot_b.id);
    assert_eq!(second.time_slot_id, setup.slot_b.id);
    assert_eq!(first.scheduled_on, times::combine(ymd(2026, 3, 10), hm(9, 30)));
    assert_eq!(second.scheduled_on, times::combine(ymd(2026, 3, 10), hm(9, 45)));

    // The vacated slot is retired; the absorbing slot fills up.
    let slot_a = setup.fresh_slot(setup.slot_a.id).await;
    assert!(slot_a.is_deleted);
    assert_eq!(slot_a.status, SlotStatus::Blocked);
    assert_eq!(setup.fresh_slot(setup.slot_b.id).await.status, SlotStatus::Booked);

    // Reassignment details stay on the same day.
    assert!(result.reassignments.iter().all(|r| r.new_date.is_none()));
    assert_eq!(result.reassignments[0].patient_name, "Ravi Menon");
}

#[tokio::test]
async fn shrink_spills_to_next_day_when_same_day_is_full() {
    let setup = TestSetup::new().await;
    let first = setup.book("Ravi Menon", setup.slot_a.id).await;
    let second = setup.book("Meera Iyer", setup.slot_a.id).await;
    // Slot B is kept (inside the new range) but has no room left.
    setup.book("Anil Kumar", setup.slot_b.id).await;
    setup.book("Divya Nair", setup.slot_b.id).await;
    let (_, next_day_slot) = setup.add_day(ymd(2026, 3, 11), 2).await;

    let result = setup
        .reschedule
        .shrink_schedule(
            setup.doctor.id,
            setup.availability.id,
            Some("09:30".to_string()),
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.appointments_rescheduled, 2);
    assert_eq!(result.strategy, Some(ShrinkStrategy::NextDay));
    for id in [first.id, second.id] {
        assert_eq!(setup.fresh_appointment(id).await.time_slot_id, next_day_slot.id);
    }
    assert!(result
        .reassignments
        .iter()
        .all(|r| r.new_date == Some(ymd(2026, 3, 11))));
}

#[tokio::test]
async fn shrink_accumulates_capacity_across_days_in_fcfs_order() {
    let setup = TestSetup::new().await;
    let first = setup.book("Ravi Menon", setup.slot_a.id).await;
    let second = setup.book("Meera Iyer", setup.slot_a.id).await;
    setup.book("Anil Kumar", setup.slot_b.id).await;
    setup.book("Divya Nair", setup.slot_b.id).await;
    // One seat per day across the next two days.
    let (_, day2_slot) = setup.add_day(ymd(2026, 3, 11), 1).await;
    let (_, day3_slot) = setup.add_day(ymd(2026, 3, 12), 1).await;

    let result = setup
        .reschedule
        .shrink_schedule(
            setup.doctor.id,
            setup.availability.id,
            Some("09:30".to_string()),
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.strategy, Some(ShrinkStrategy::MultiDay));
    // Earliest booking gets the earliest seat.
    assert_eq!(setup.fresh_appointment(first.id).await.time_slot_id, day2_slot.id);
    assert_eq!(setup.fresh_appointment(second.id).await.time_slot_id, day3_slot.id);
}

#[tokio::test]
async fn shrink_is_all_or_nothing_when_capacity_is_insufficient() {
    let setup = TestSetup::new().await;
    // Three displaced appointments, two replacement seats anywhere.
    let mut slot_a = setup.fresh_slot(setup.slot_a.id).await;
    slot_a.max_patients = 3;
    let slot_a = setup.store.save_slot(slot_a).await.unwrap();
    let first = setup.book("Ravi Menon", slot_a.id).await;
    setup.book("Meera Iyer", slot_a.id).await;
    setup.book("Anil Kumar", slot_a.id).await;

    let err = setup
        .reschedule
        .shrink_schedule(
            setup.doctor.id,
            setup.availability.id,
            None,
            Some("09:15".to_string()),
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Conflict { .. });
    let details = err.conflict_details().unwrap();
    assert_eq!(details["required_capacity"], 3);
    assert_eq!(details["available_capacity"], 2);
    assert!(details["recommendation"].is_string());

    // Nothing moved, nothing retired, the window is unchanged.
    let availability = setup
        .store
        .find_availability(setup.availability.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(availability.end_time, hm(10, 0));
    let slot_a = setup.fresh_slot(slot_a.id).await;
    assert!(!slot_a.is_deleted);
    assert_eq!(setup.fresh_appointment(first.id).await.time_slot_id, slot_a.id);
    assert_eq!(setup.store.count_scheduled(slot_a.id).await.unwrap(), 3);
}

#[tokio::test]
async fn shrink_without_displacement_just_retires_outside_slots() {
    let setup = TestSetup::new().await;
    let kept = setup.book("Ravi Menon", setup.slot_a.id).await;

    let result = setup
        .reschedule
        .shrink_schedule(
            setup.doctor.id,
            setup.availability.id,
            None,
            Some("09:30".to_string()),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.appointments_rescheduled, 0);
    assert_eq!(result.strategy, None);

    let slot_b = setup.fresh_slot(setup.slot_b.id).await;
    assert!(slot_b.is_deleted);
    assert_eq!(slot_b.status, SlotStatus::Blocked);

    // The kept slot and its appointment are untouched.
    let slot_a = setup.fresh_slot(setup.slot_a.id).await;
    assert!(!slot_a.is_deleted);
    assert_eq!(setup.fresh_appointment(kept.id).await.time_slot_id, setup.slot_a.id);
}
