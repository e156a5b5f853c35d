use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coral_error::CoralError;
use serde::Serialize;

/// Wrapper around `dyn CoralError` that implements `IntoResponse`. Route
/// handlers return `Result<_, ServerError>` and use the `?` operator to
/// surface arbitrary domain errors.
pub(crate) struct ServerError(Box<dyn CoralError>);

impl<E: CoralError + 'static> From<E> for ServerError {
    fn from(e: E) -> Self {
        ServerError(Box::new(e))
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
    pub(crate) message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!("Error: {:?}", self.0);
        let status_code = match self.0.code() {
            coral_error::ErrorCodes::Success => StatusCode::OK,
            coral_error::ErrorCodes::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            coral_error::ErrorCodes::InvalidArgument => StatusCode::BAD_REQUEST,
            coral_error::ErrorCodes::NotFound => StatusCode::NOT_FOUND,
            coral_error::ErrorCodes::AlreadyExists => StatusCode::CONFLICT,
            coral_error::ErrorCodes::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
            coral_error::ErrorCodes::Aborted => StatusCode::BAD_REQUEST,
            coral_error::ErrorCodes::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            coral_error::ErrorCodes::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            coral_error::ErrorCodes::Unauthenticated => StatusCode::UNAUTHORIZED,
        };

        let error = ErrorResponse {
            error: status_code.to_string(),
            message: self.0.to_string(),
        };

        (status_code, Json(error)).into_response()
    }
}
