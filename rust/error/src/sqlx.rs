use crate::{CoralError, ErrorCodes};
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Wrapper around `sqlx::Error` that assigns each storage failure an
/// [`ErrorCodes`] so callers can distinguish transient unavailability
/// (safe to retry from the outside) from data-shaped failures.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct WrappedSqlxError(#[from] sqlx::Error);

impl WrappedSqlxError {
    pub fn inner(&self) -> &sqlx::Error {
        &self.0
    }

    /// True when the underlying error is a unique-constraint violation.
    /// The registry relies on this as the authoritative duplicate check.
    pub fn is_unique_violation(&self) -> bool {
        match &self.0 {
            sqlx::Error::Database(db_err) => db_err.kind() == ErrorKind::UniqueViolation,
            _ => false,
        }
    }
}

impl CoralError for WrappedSqlxError {
    fn code(&self) -> ErrorCodes {
        match &self.0 {
            sqlx::Error::RowNotFound => ErrorCodes::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                ErrorCodes::Unavailable
            }
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => ErrorCodes::AlreadyExists,
                ErrorKind::ForeignKeyViolation => ErrorCodes::FailedPrecondition,
                ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                    ErrorCodes::InvalidArgument
                }
                _ => ErrorCodes::Internal,
            },
            _ => ErrorCodes::Internal,
        }
    }
}

impl From<sqlx::Error> for Box<dyn CoralError> {
    fn from(error: sqlx::Error) -> Self {
        Box::new(WrappedSqlxError(error))
    }
}
