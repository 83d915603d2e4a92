// libs/schedule-cell/src/services/availability.rs
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_models::{AppError, Availability};
use shared_store::ScheduleStore;
use shared_utils::Clock;

use crate::models::{CreateAvailabilityRequest, UpdateAvailabilityRequest};
use crate::times;

/// Manages a doctor's declared consulting windows. Recurring weekday
/// requests are expanded into one concrete row per date at creation time,
/// so everything downstream only ever deals with dated rows.
#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn ScheduleStore>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Create one or more availability rows for a doctor. Returns the rows
    /// in date order.
    pub async fn create_availability(
        &self,
        doctor_id: Uuid,
        request: CreateAvailabilityRequest,
    ) -> Result<Vec<Availability>, AppError> {
        info!("Creating availability for doctor {}", doctor_id);

        // Step 1: the doctor must exist.
        self.store
            .find_doctor(doctor_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Doctor {} not found", doctor_id)))?;

        // Step 2: parse and validate the consulting window.
        let start_time = times::parse_hhmm(&request.start_time)?;
        let end_time = times::parse_hhmm(&request.end_time)?;
        if start_time >= end_time {
            return Err(AppError::validation(
                "start_time must be strictly before end_time",
            ));
        }

        // Step 3: resolve the concrete dates this request covers.
        let today = self.clock.now().date_naive();
        if let Some(booking_start_at) = request.booking_start_at {
            if booking_start_at.date_naive() < today {
                return Err(AppError::validation(
                    "booking_start_at must not be before today",
                ));
            }
        }
        let dates = self.resolve_dates(&request, today)?;

        // Step 4: one row per date, each with its own booking window.
        let mut created = Vec::with_capacity(dates.len());
        for date in dates {
            let consulting_start = times::combine(date, start_time);

            let booking_start_at = request.booking_start_at.unwrap_or_else(|| self.clock.now());
            let booking_end_at = request.booking_end_at.unwrap_or(consulting_start);

            validate_booking_window(booking_start_at, booking_end_at, consulting_start)?;

            let now = Utc::now();
            let availability = Availability {
                id: Uuid::new_v4(),
                doctor_id,
                consultation_date: date,
                start_time,
                end_time,
                session: request.session,
                booking_start_at: Some(booking_start_at),
                booking_end_at: Some(booking_end_at),
                is_deleted: false,
                created_at: now,
                updated_at: now,
            };

            let availability = self.store.insert_availability(availability).await?;
            debug!(
                "Created availability {} on {} ({} - {})",
                availability.id, date, request.start_time, request.end_time
            );
            created.push(availability);
        }

        info!(
            "Created {} availability row(s) for doctor {}",
            created.len(),
            doctor_id
        );
        Ok(created)
    }

    /// Update an availability in place. The merged row is re-validated as a
    /// whole so a partial update cannot sneak an inconsistent window past
    /// the creation checks.
    pub async fn update_availability(
        &self,
        doctor_id: Uuid,
        availability_id: Uuid,
        request: UpdateAvailabilityRequest,
    ) -> Result<Availability, AppError> {
        let mut availability = self.owned_availability(doctor_id, availability_id).await?;

        if let Some(raw) = &request.start_time {
            availability.start_time = times::parse_hhmm(raw)?;
        }
        if let Some(raw) = &request.end_time {
            availability.end_time = times::parse_hhmm(raw)?;
        }
        if let Some(session) = request.session {
            availability.session = session;
        }
        if let Some(booking_start_at) = request.booking_start_at {
            availability.booking_start_at = Some(booking_start_at);
        }
        if let Some(booking_end_at) = request.booking_end_at {
            availability.booking_end_at = Some(booking_end_at);
        }

        if availability.start_time >= availability.end_time {
            return Err(AppError::validation(
                "start_time must be strictly before end_time",
            ));
        }
        let consulting_start =
            times::combine(availability.consultation_date, availability.start_time);
        if let (Some(start), Some(end)) =
            (availability.booking_start_at, availability.booking_end_at)
        {
            validate_booking_window(start, end, consulting_start)?;
        }

        let availability = self.store.save_availability(availability).await?;
        info!("Updated availability {}", availability.id);
        Ok(availability)
    }

    /// Soft-delete an availability. Existing slots and appointments under
    /// it are left untouched; callers that need them gone run the shrink or
    /// cancellation flows first.
    pub async fn delete_availability(
        &self,
        doctor_id: Uuid,
        availability_id: Uuid,
    ) -> Result<Availability, AppError> {
        let mut availability = self.owned_availability(doctor_id, availability_id).await?;
        availability.is_deleted = true;
        let availability = self.store.save_availability(availability).await?;
        info!("Soft-deleted availability {}", availability.id);
        Ok(availability)
    }

    /// Non-deleted availabilities for a doctor, date ascending.
    pub async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Availability>, AppError> {
        self.store.list_availabilities(doctor_id).await
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

    fn resolve_dates(
        &self,
        request: &CreateAvailabilityRequest,
        today: NaiveDate,
    ) -> Result<Vec<NaiveDate>, AppError> {
        let dates = match (&request.date, &request.weekdays) {
            (Some(_), Some(_)) => {
                return Err(AppError::validation(
                    "provide either a date or weekdays, not both",
                ));
            }
            (Some(date), None) => vec![*date],
            (None, Some(weekdays)) => {
                if weekdays.is_empty() {
                    return Err(AppError::validation("weekdays must not be empty"));
                }
                let parsed = weekdays
                    .iter()
                    .map(|raw| times::parse_weekday(raw))
                    .collect::<Result<Vec<_>, _>>()?;
                times::expand_weekdays(today, &parsed, self.config.lookahead_weeks)
            }
            (None, None) => {
                return Err(AppError::validation(
                    "either a date or a weekday list is required",
                ));
            }
        };

        if let Some(past) = dates.iter().find(|d| **d < today) {
            return Err(AppError::validation(format!(
                "consultation date {} is in the past",
                past
            )));
        }
        Ok(dates)
    }
}

/// Window integrity: booking must open before it closes, and must close no
/// later than the consulting start instant (closing exactly at consulting
/// start is the default and is allowed).
fn validate_booking_window(
    booking_start_at: chrono::DateTime<Utc>,
    booking_end_at: chrono::DateTime<Utc>,
    consulting_start: chrono::DateTime<Utc>,
) -> Result<(), AppError> {
    if booking_start_at >= booking_end_at {
        return Err(AppError::validation(
            "booking_start_at must be before booking_end_at",
        ));
    }
    if booking_end_at > consulting_start {
        return Err(AppError::validation(
            "booking_end_at must not be after the consulting start",
        ));
    }
    Ok(())
}
