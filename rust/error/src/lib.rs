// Standard error codes modeled on the gRPC status codes
// (https://grpc.github.io/grpc/core/md_doc_statuscodes.html).
// Domain errors carry one of these so that generic layers (the HTTP
// surface, logging) can handle them uniformly.
use std::error::Error;

#[cfg(feature = "sqlx")]
mod sqlx;
#[cfg(feature = "sqlx")]
pub use sqlx::*;

#[cfg(feature = "validator")]
mod validator;
#[cfg(feature = "validator")]
pub use validator::*;

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ErrorCodes {
    // OK is returned on success, we use "Success" since Ok is a keyword in Rust.
    Success = 0,
    // UNKNOWN indicates an unknown error.
    Unknown = 2,
    // INVALID_ARGUMENT indicates client specified an invalid argument.
    InvalidArgument = 3,
    // NOT_FOUND means some requested entity was not found.
    NotFound = 5,
    // ALREADY_EXISTS means an entity that we attempted to create already exists.
    AlreadyExists = 6,
    // FAILED_PRECONDITION indicates the system is not in a state required for the operation.
    FailedPrecondition = 9,
    // ABORTED indicates the operation was aborted.
    Aborted = 10,
    // INTERNAL errors are internal errors.
    Internal = 13,
    // UNAVAILABLE indicates the storage engine or another dependency is currently unreachable.
    Unavailable = 14,
    // UNAUTHENTICATED indicates the request does not carry valid tenant credentials.
    Unauthenticated = 16,
}

impl ErrorCodes {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCodes::InvalidArgument => "InvalidArgumentError",
            ErrorCodes::NotFound => "NotFoundError",
            ErrorCodes::AlreadyExists => "AlreadyExistsError",
            ErrorCodes::Unavailable => "UnavailableError",
            ErrorCodes::Internal => "InternalError",
            _ => "CoralError",
        }
    }
}

pub trait CoralError: Error + Send {
    fn code(&self) -> ErrorCodes;
    fn boxed(self) -> Box<dyn CoralError>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl Error for Box<dyn CoralError> {}

impl CoralError for Box<dyn CoralError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }
}

impl CoralError for std::io::Error {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::Unknown
    }
}
