use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::limits::*;
use crate::model::*;
use crate::source::{BookingSink, BookingSource, RoomSource, StoreError};

/// In-memory rooms and bookings for one property. Insertion order is the
/// order handed to the resolver.
///
/// `persist` does not re-check availability, so it does not close the race
/// between two concurrent booking requests.
#[derive(Default)]
pub struct PropertyStore {
    rooms: RwLock<Vec<Room>>,
    bookings: RwLock<Vec<Booking>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Rooms ────────────────────────────────────────────────

    pub async fn add_room(&self, room: Room) -> Result<(), StoreError> {
        if room.id <= UNASSIGNED {
            return Err(StoreError::InvalidRoomId(room.id));
        }
        if room.description.len() > MAX_DESCRIPTION_LEN {
            return Err(StoreError::LimitExceeded("room description too long"));
        }
        let mut rooms = self.rooms.write().await;
        if rooms.len() >= MAX_ROOMS_PER_PROPERTY {
            return Err(StoreError::LimitExceeded("too many rooms"));
        }
        if rooms.iter().any(|r| r.id == room.id) {
            return Err(StoreError::RoomExists(room.id));
        }
        rooms.push(room);
        Ok(())
    }

    pub async fn remove_room(&self, id: RoomId) -> Result<Room, StoreError> {
        let mut rooms = self.rooms.write().await;
        let pos = rooms
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::RoomNotFound(id))?;
        Ok(rooms.remove(pos))
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    // ── Bookings ─────────────────────────────────────────────

    /// Load an existing booking as-is, bypassing availability checks.
    pub async fn import_booking(&self, booking: Booking) -> Result<Booking, StoreError> {
        let mut bookings = self.bookings.write().await;
        insert_booking(&mut bookings, booking)
    }

    /// Clear the active flag. The booking stays in history.
    pub async fn cancel_booking(&self, id: BookingId) -> Result<Booking, StoreError> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(StoreError::BookingNotFound(id))?;
        booking.is_active = false;
        Ok(booking.clone())
    }

    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }
}

/// Append a booking, assigning the next id when it has none.
fn insert_booking(bookings: &mut Vec<Booking>, mut booking: Booking) -> Result<Booking, StoreError> {
    if bookings.len() >= MAX_BOOKINGS_PER_PROPERTY {
        return Err(StoreError::LimitExceeded("too many bookings"));
    }
    if booking.id == 0 {
        booking.id = bookings
            .iter()
            .map(|b| b.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or(StoreError::LimitExceeded("booking ids exhausted"))?;
    } else if bookings.iter().any(|b| b.id == booking.id) {
        return Err(StoreError::BookingExists(booking.id));
    }
    bookings.push(booking.clone());
    Ok(booking)
}

#[async_trait]
impl BookingSource for PropertyStore {
    async fn fetch_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.bookings.read().await.clone())
    }
}

#[async_trait]
impl BookingSink for PropertyStore {
    async fn persist(&self, booking: Booking) -> Result<Booking, StoreError> {
        let mut bookings = self.bookings.write().await;
        insert_booking(&mut bookings, booking)
    }
}

#[async_trait]
impl RoomSource for PropertyStore {
    async fn fetch_rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.rooms.read().await.clone())
    }
}
