use crate::error::AppError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use error_types::{error_codes, error_types as categories, ErrorResponse};

/// Map domain errors to HTTP responses.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (error_type, code) = match err {
        AppError::BadRequest(_) => (categories::VALIDATION_ERROR, error_codes::INVALID_REQUEST),
        AppError::Unauthorized => (
            categories::AUTHENTICATION_ERROR,
            error_codes::TOKEN_INVALID,
        ),
        AppError::Forbidden => (
            categories::AUTHORIZATION_ERROR,
            error_codes::NOT_CONVERSATION_PARTICIPANT,
        ),
        AppError::NotFound => (
            categories::NOT_FOUND_ERROR,
            error_codes::CONVERSATION_NOT_FOUND,
        ),
        AppError::Database(_) => (categories::SERVER_ERROR, error_codes::DATABASE_ERROR),
        AppError::Encryption(_) => (categories::SERVER_ERROR, error_codes::ENCRYPTION_ERROR),
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => (
            categories::SERVER_ERROR,
            error_codes::INTERNAL_SERVER_ERROR,
        ),
    };

    // 5xx bodies carry a generic message; the detail only goes to the log.
    let message = if status.is_server_error() {
        tracing::error!(error = %err, code, "request failed");
        match err {
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Encryption(_) => "Failed to process message content".to_string(),
            _ => "An internal error occurred".to_string(),
        }
    } else {
        err.to_string()
    };
    let response = ErrorResponse::new(
        match status {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        },
        &message,
        status.as_u16(),
        error_type,
        code,
    );

    (status, response)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, response) = map_error(&err);
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_maps_to_participant_code() {
        let (status, body) = map_error(&AppError::Forbidden);
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.code, error_codes::NOT_CONVERSATION_PARTICIPANT);
        assert_eq!(body.error_type, categories::AUTHORIZATION_ERROR);
    }

    #[test]
    fn database_errors_hide_internals_behind_500() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        let detail = err.to_string();
        let (status, body) = map_error(&err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, error_codes::DATABASE_ERROR);
        assert_eq!(body.message, "A database error occurred");
        assert!(!body.message.contains(&detail));
    }

    #[test]
    fn encryption_errors_get_a_generic_message() {
        let (status, body) = map_error(&AppError::Encryption("bad nonce length".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, error_codes::ENCRYPTION_ERROR);
        assert!(!body.message.contains("nonce"));
    }

    #[test]
    fn bad_request_keeps_its_message() {
        let err = AppError::BadRequest("cannot start a conversation with yourself".into());
        let (status, body) = map_error(&err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.message.contains("yourself"));
    }
}
