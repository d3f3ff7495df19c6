mod error;
mod occupancy;

pub use error::ResolverError;
pub use occupancy::{first_free_room, saturated_days};

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::model::*;
use crate::source::{BookingStore, RoomSource};

/// Local calendar date. Every future-date check is made against this.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Result of a booking attempt. Running out of rooms is an answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    /// The booking as persisted: room assigned, active.
    Created(Booking),
    NoRoomAvailable,
}

impl BookingOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, BookingOutcome::Created(_))
    }
}

/// Resolves availability from full snapshots of the booking and room stores.
///
/// Holds no state between calls. Two concurrent `create_booking` calls see
/// independent snapshots and can both claim the last free room; serializing
/// writes is the booking store's job.
pub struct AvailabilityResolver {
    bookings: Arc<dyn BookingStore>,
    rooms: Arc<dyn RoomSource>,
}

impl AvailabilityResolver {
    pub fn new(bookings: Arc<dyn BookingStore>, rooms: Arc<dyn RoomSource>) -> Self {
        Self { bookings, rooms }
    }

    pub async fn find_available_room(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<RoomId>, ResolverError> {
        self.find_available_room_as_of(today(), start, end).await
    }

    /// `start` must lie strictly after `today` and strictly before `end`.
    pub async fn find_available_room_as_of(
        &self,
        today: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<RoomId>, ResolverError> {
        if start <= today {
            return Err(ResolverError::invalid_range(start, end, "start date must be in the future"));
        }
        if start >= end {
            return Err(ResolverError::invalid_range(start, end, "start date must be before end date"));
        }

        let rooms = self.rooms.fetch_rooms().await?;
        let bookings = self.bookings.fetch_bookings().await?;

        let room = first_free_room(&rooms, &bookings, &Stay::new(start, end));
        debug!(%start, %end, rooms = rooms.len(), ?room, "room search");
        Ok(room)
    }

    pub async fn create_booking(&self, booking: Option<Booking>) -> Result<BookingOutcome, ResolverError> {
        self.create_booking_as_of(today(), booking).await
    }

    /// Place `booking` in the first free room and hand it to the booking sink.
    /// Nothing is persisted when no room is free.
    pub async fn create_booking_as_of(
        &self,
        today: NaiveDate,
        booking: Option<Booking>,
    ) -> Result<BookingOutcome, ResolverError> {
        let mut booking = booking.ok_or(ResolverError::NullInput)?;

        let Some(room_id) = self
            .find_available_room_as_of(today, booking.start_date, booking.end_date)
            .await?
        else {
            metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL).increment(1);
            debug!(start = %booking.start_date, end = %booking.end_date, "no room available");
            return Ok(BookingOutcome::NoRoomAvailable);
        };

        booking.room_id = room_id;
        booking.is_active = true;
        let stored = self.bookings.persist(booking).await?;
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        debug!(booking_id = stored.id, room_id, "booking created");
        Ok(BookingOutcome::Created(stored))
    }

    /// Days in `[start, end]` on which every room is taken. Past dates are fine.
    pub async fn fully_occupied_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, ResolverError> {
        if start > end {
            return Err(ResolverError::invalid_range(start, end, "start date must not be after end date"));
        }

        let rooms = self.rooms.fetch_rooms().await?;
        let bookings = self.bookings.fetch_bookings().await?;

        let days = saturated_days(rooms.len(), &bookings, &Stay::new(start, end));
        debug!(%start, %end, rooms = rooms.len(), occupied = days.len(), "occupancy scan");
        Ok(days)
    }
}
