use crate::{CoralError, ErrorCodes};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Validation error: {0}")]
pub struct CoralValidationError(#[from] validator::ValidationErrors);

impl CoralError for CoralValidationError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}
