use std::env;
use tracing::warn;

/// Tunables for the scheduling engine. Every value has a sane default so
/// the services work without any environment configured.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    /// How many weeks ahead a weekday-recurring availability is expanded
    /// into concrete dates.
    pub lookahead_weeks: u32,
    /// How many future availabilities the shrink capacity search scans in
    /// its multi-day tier.
    pub multi_day_search_limit: usize,
    /// Upper bound on a slot's max_patients.
    pub max_slot_capacity: i32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            lookahead_weeks: 4,
            multi_day_search_limit: 7,
            max_slot_capacity: 50,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            lookahead_weeks: read_env("SCHEDULING_LOOKAHEAD_WEEKS", defaults.lookahead_weeks),
            multi_day_search_limit: read_env(
                "SCHEDULING_MULTI_DAY_SEARCH_LIMIT",
                defaults.multi_day_search_limit,
            ),
            max_slot_capacity: read_env("SCHEDULING_MAX_SLOT_CAPACITY", defaults.max_slot_capacity),
        }
    }
}

fn read_env<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has unparseable value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
