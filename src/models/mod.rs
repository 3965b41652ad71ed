// src/models/mod.rs

//! Domain models for the observer.
//!
//! This module contains the decoded schedule structures and the application
//! configuration.

mod config;
mod room;
mod schedule;

// Re-export all public types
pub use config::{
    CheckpointConfig, Config, LoggingConfig, MonitorConfig, NotifierConfig, SourceConfig,
    SourceKind,
};
pub use room::Room;
pub use schedule::{DaySchedule, RoomSchedule, SLOTS_PER_DAY, TIME_SLOTS, TimeSlot, Weekday};

/// Raw rows of text cells as read from the source. Rows may differ in length.
pub type Grid = Vec<Vec<String>>;
