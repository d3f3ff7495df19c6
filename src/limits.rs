pub const MAX_PROPERTIES: usize = 1_000;
pub const MAX_PROPERTY_NAME_LEN: usize = 256;
pub const MAX_ROOMS_PER_PROPERTY: usize = 10_000;
pub const MAX_BOOKINGS_PER_PROPERTY: usize = 1_000_000;
pub const MAX_DESCRIPTION_LEN: usize = 1_024;
/// Widest `occupied_dates` window accepted over the wire (about ten years).
pub const MAX_OCCUPANCY_QUERY_DAYS: i64 = 3_660;
