use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type RoomId = i64;
pub type BookingId = i64;

/// Room reference carried by a booking that has not been placed yet.
pub const UNASSIGNED: RoomId = 0;

/// Wire rendering of "no free room". Outside the valid id space.
pub const NO_ROOM: RoomId = -1;

/// Inclusive day range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Stay {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Both ends inclusive: a stay ending on day D overlaps one starting on D.
    pub fn overlaps(&self, other: &Stay) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Calendar days in ascending order. Empty when `start > end`.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    #[serde(default)]
    pub description: String,
}

impl Room {
    pub fn new(id: RoomId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default)]
    pub id: BookingId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Inactive bookings are kept for history and ignored by every check.
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub room_id: RoomId,
}

impl Booking {
    /// A booking request: no id, no room, not yet active.
    pub fn request(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: 0,
            start_date,
            end_date,
            is_active: false,
            room_id: UNASSIGNED,
        }
    }

    pub fn stay(&self) -> Stay {
        Stay::new(self.start_date, self.end_date)
    }
}
