use async_trait::async_trait;

use crate::model::{Booking, BookingId, Room, RoomId};

/// Produces every known booking, active or not, in store order.
#[async_trait]
pub trait BookingSource: Send + Sync {
    async fn fetch_bookings(&self) -> Result<Vec<Booking>, StoreError>;
}

/// Accepts a placed booking for persistence.
#[async_trait]
pub trait BookingSink: Send + Sync {
    async fn persist(&self, booking: Booking) -> Result<Booking, StoreError>;
}

/// Produces every room of the property, in store order.
#[async_trait]
pub trait RoomSource: Send + Sync {
    async fn fetch_rooms(&self) -> Result<Vec<Room>, StoreError>;
}

/// The booking store is in practice both source and sink.
pub trait BookingStore: BookingSource + BookingSink {}

impl<T: BookingSource + BookingSink> BookingStore for T {}

#[derive(Debug)]
pub enum StoreError {
    RoomNotFound(RoomId),
    /// Room ids must be positive; 0 and below mean "no room".
    InvalidRoomId(RoomId),
    BookingNotFound(BookingId),
    RoomExists(RoomId),
    BookingExists(BookingId),
    LimitExceeded(&'static str),
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            StoreError::InvalidRoomId(id) => write!(f, "invalid room id: {id} (must be positive)"),
            StoreError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            StoreError::RoomExists(id) => write!(f, "room already exists: {id}"),
            StoreError::BookingExists(id) => write!(f, "booking already exists: {id}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
