// src/models/room.rs

//! Classroom record decoded from one grid row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RoomSchedule;

/// A physical classroom with its weekly schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    /// Room identifier as printed (not necessarily numeric)
    pub number: String,

    /// Building identifier
    pub building: String,

    /// Display name
    pub name: String,

    /// Seat count, 0 when the source cell is not an integer
    pub capacity: u32,

    /// Monday to Friday schedule
    pub schedule: RoomSchedule,

    /// When this record was decoded, not when the source changed
    #[serde(rename = "last_updated")]
    pub last_decoded_at: DateTime<Utc>,
}

impl Room {
    /// Short label used in log lines.
    pub fn label(&self) -> String {
        format!("{}-{} ({})", self.building, self.number, self.name)
    }
}
