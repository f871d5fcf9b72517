use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use std::fmt;

use crate::validators::ValidationError;

pub mod budget;
pub mod contribution;
pub mod expense;
pub mod family;
pub mod goal;
pub mod streak;
pub mod user_profile;

pub type DbThreadPool = diesel::r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub fn create_db_thread_pool(database_uri: &str, max_db_connections: Option<u32>) -> DbThreadPool {
    let mut pool_builder = diesel::r2d2::Pool::builder();

    if let Some(max_connections) = max_db_connections {
        pool_builder = pool_builder.max_size(max_connections);
    }

    pool_builder
        .build(ConnectionManager::<PgConnection>::new(database_uri))
        .expect("Failed to create DB thread pool")
}

#[derive(Debug)]
pub enum DaoError {
    DbThreadPoolFailure(r2d2::Error),
    QueryFailure(diesel::result::Error),
    // A concurrent request won a race on the same row despite the locking
    // discipline; the caller may retry.
    Conflict(diesel::result::Error),
    CannotRunQuery(&'static str),
    Validation(ValidationError),
}

impl std::error::Error for DaoError {}

impl fmt::Display for DaoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoError::DbThreadPoolFailure(e) => {
                write!(f, "DaoError: Failed to obtain DB connection: {e}")
            }
            DaoError::QueryFailure(e) => {
                write!(f, "DaoError: Query failed: {e}")
            }
            DaoError::Conflict(e) => {
                write!(f, "DaoError: Concurrent modification conflict: {e}")
            }
            DaoError::CannotRunQuery(msg) => {
                write!(f, "DaoError: Cannot run query: {msg}")
            }
            DaoError::Validation(e) => {
                write!(f, "DaoError: Validation failed: {e}")
            }
        }
    }
}

impl From<r2d2::Error> for DaoError {
    fn from(error: r2d2::Error) -> Self {
        DaoError::DbThreadPoolFailure(error)
    }
}

impl From<diesel::result::Error> for DaoError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::SerializationFailure,
                _,
            ) => DaoError::Conflict(error),
            _ => DaoError::QueryFailure(error),
        }
    }
}

impl From<ValidationError> for DaoError {
    fn from(error: ValidationError) -> Self {
        DaoError::Validation(error)
    }
}

/// Half-open window for a calendar month: the first day of the month through
/// (exclusive) the first day of the following month.
pub(crate) fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), DaoError> {
    const BAD_MONTH: DaoError = DaoError::CannotRunQuery("Month is not a valid calendar month");

    let window_start = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(d) => d,
        None => return Err(BAD_MONTH),
    };

    let window_end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    match window_end {
        Some(window_end) => Ok((window_start, window_end)),
        None => Err(BAD_MONTH),
    }
}

/// Percentage of `whole_cents` covered by `part_cents`, guarded to zero for a
/// non-positive whole so callers never divide by zero.
pub(crate) fn percentage_of_cents(part_cents: i64, whole_cents: i64) -> f64 {
    if whole_cents <= 0 {
        return 0.0;
    }

    (part_cents as f64 / whole_cents as f64) * 100.0
}
