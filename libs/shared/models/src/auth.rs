use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who is calling the scheduling core. Resolved by the surrounding auth
/// layer (out of scope here) and passed into every operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Doctor => write!(f, "doctor"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

impl CallerIdentity {
    pub fn doctor(id: Uuid) -> Self {
        Self { id, role: Role::Doctor }
    }

    pub fn patient(id: Uuid) -> Self {
        Self { id, role: Role::Patient }
    }
}
