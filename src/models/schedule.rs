// src/models/schedule.rs

//! Weekly schedule data structures: slots, days, and the five-day week.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical time intervals of the template, earliest first.
pub const TIME_SLOTS: [(&str, &str); 14] = [
    ("07:00", "08:00"),
    ("08:00", "09:00"),
    ("09:00", "10:00"),
    ("10:00", "11:00"),
    ("11:00", "12:00"),
    ("12:00", "13:00"),
    ("13:00", "14:00"),
    ("14:00", "15:00"),
    ("15:00", "16:00"),
    ("16:00", "17:00"),
    ("17:00", "18:00"),
    ("18:00", "19:00"),
    ("19:00", "20:00"),
    ("20:00", "21:00"),
];

/// Number of slots in every day.
pub const SLOTS_PER_DAY: usize = TIME_SLOTS.len();

/// Weekdays covered by the schedule, in template order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    /// All weekdays, Monday first.
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    /// Zero-based position of the day within the week.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduling cell for a single day and interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
    pub professor: String,
    pub program: String,
}

impl TimeSlot {
    /// Create a slot with no recorded occupancy.
    pub fn empty(start_time: &str, end_time: &str) -> Self {
        Self {
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            subject: String::new(),
            professor: String::new(),
            program: String::new(),
        }
    }

    /// A slot is empty when subject, professor, and program are all empty.
    pub fn is_empty(&self) -> bool {
        self.subject.is_empty() && self.professor.is_empty() && self.program.is_empty()
    }
}

/// The ordered slots of one weekday.
///
/// Order is positional and follows [`TIME_SLOTS`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct DaySchedule(Vec<TimeSlot>);

impl DaySchedule {
    pub fn new(slots: Vec<TimeSlot>) -> Self {
        Self(slots)
    }

    /// A day where every canonical interval is empty.
    pub fn empty() -> Self {
        Self(
            TIME_SLOTS
                .iter()
                .map(|(start, end)| TimeSlot::empty(start, end))
                .collect(),
        )
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Count slots with recorded occupancy.
    pub fn occupied_count(&self) -> usize {
        self.0.iter().filter(|slot| !slot.is_empty()).count()
    }
}

/// A full Monday-to-Friday schedule. All five days are always present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSchedule {
    pub monday: DaySchedule,
    pub tuesday: DaySchedule,
    pub wednesday: DaySchedule,
    pub thursday: DaySchedule,
    pub friday: DaySchedule,
}

impl RoomSchedule {
    /// Build a schedule by producing each day in week order.
    pub fn from_fn(mut day: impl FnMut(Weekday) -> DaySchedule) -> Self {
        Self {
            monday: day(Weekday::Monday),
            tuesday: day(Weekday::Tuesday),
            wednesday: day(Weekday::Wednesday),
            thursday: day(Weekday::Thursday),
            friday: day(Weekday::Friday),
        }
    }

    pub fn empty() -> Self {
        Self::from_fn(|_| DaySchedule::empty())
    }

    pub fn day(&self, weekday: Weekday) -> &DaySchedule {
        match weekday {
            Weekday::Monday => &self.monday,
            Weekday::Tuesday => &self.tuesday,
            Weekday::Wednesday => &self.wednesday,
            Weekday::Thursday => &self.thursday,
            Weekday::Friday => &self.friday,
        }
    }

    /// Iterate days in week order.
    pub fn days(&self) -> impl Iterator<Item = (Weekday, &DaySchedule)> {
        Weekday::ALL.into_iter().map(move |d| (d, self.day(d)))
    }

    pub fn occupied_count(&self) -> usize {
        self.days().map(|(_, day)| day.occupied_count()).sum()
    }
}
