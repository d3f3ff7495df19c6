use chrono::NaiveDate;

use crate::source::StoreError;

#[derive(Debug)]
pub enum ResolverError {
    /// Date preconditions failed. Raised before anything is fetched.
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
        reason: &'static str,
    },
    /// `create_booking` was handed no booking at all.
    NullInput,
    /// A source or sink failed; carried through untouched.
    Store(StoreError),
}

impl ResolverError {
    pub(crate) fn invalid_range(start: NaiveDate, end: NaiveDate, reason: &'static str) -> Self {
        ResolverError::InvalidRange { start, end, reason }
    }
}

impl std::fmt::Display for ResolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolverError::InvalidRange { start, end, reason } => {
                write!(f, "invalid range [{start}, {end}]: {reason}")
            }
            ResolverError::NullInput => write!(f, "booking is null"),
            ResolverError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for ResolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolverError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ResolverError {
    fn from(e: StoreError) -> Self {
        ResolverError::Store(e)
    }
}
