use chrono::NaiveDate;

use crate::model::*;

// ── Occupancy Algorithms ──────────────────────────────────────────

/// First room, in the order given, with no active booking overlapping `stay`.
///
/// Rooms are not sorted: callers get whatever order the room source produced.
pub fn first_free_room(rooms: &[Room], bookings: &[Booking], stay: &Stay) -> Option<RoomId> {
    rooms
        .iter()
        .find(|room| {
            !bookings
                .iter()
                .any(|b| b.is_active && b.room_id == room.id && b.stay().overlaps(stay))
        })
        .map(|room| room.id)
}

/// Days of `query` on which the number of active bookings covering the day
/// equals `room_count`. Zero capacity never saturates.
///
/// Bookings are counted, not distinct rooms, so unassigned bookings take up
/// capacity too.
pub fn saturated_days(room_count: usize, bookings: &[Booking], query: &Stay) -> Vec<NaiveDate> {
    if room_count == 0 {
        return Vec::new();
    }

    let active: Vec<Stay> = bookings
        .iter()
        .filter(|b| b.is_active && b.stay().overlaps(query))
        .map(Booking::stay)
        .collect();

    query
        .days()
        .filter(|day| active.iter().filter(|s| s.covers(*day)).count() == room_count)
        .collect()
}
