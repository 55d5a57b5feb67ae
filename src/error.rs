use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Error envelope sent to clients
///
/// Every non-validation failure is reported with this fixed shape:
/// ```json
/// { "error": "Resource not found." }
/// ```
///
/// Internal details (SQL errors, hashing failures) never reach this struct;
/// handlers log them and pick a fixed [`ErrorMessage`] instead.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl fmt::Display for ErrorResponse {
    /// Formats the envelope as its JSON body
    ///
    /// # Returns
    /// - `Ok(())`: the JSON text was written to `f`
    /// - `Err(fmt::Error)`: serialization failed
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Field path -> list of messages, e.g. `{"publicationDate": ["This value should not be blank."]}`
///
/// A `BTreeMap` keeps the keys sorted so responses are stable.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Fixed messages used across the application
///
/// Handlers and validators pick a variant instead of formatting their own
/// text, so one message is spelled the same way on every endpoint. The
/// wording of the form variants (`NotBlank`, `InvalidValue`, ...) is part of
/// the API: clients match on it.
///
/// PartialEq allows comparing error variants (useful in tests)
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Resource errors
    ResourceNotFound,
    GeneralError,
    InvalidBody,

    // Password errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize), // the limit that was exceeded
    InvalidHashFormat,
    HashingError,

    // Authentication errors
    InvalidToken,
    InvalidCredentials,
    UserNotAuthenticated,
    UserNoLongerExist,

    // Authorization errors
    PermissionDenied,

    // Form errors
    NotBlank,
    InvalidValue,
    IsbnAlreadyExists,
    EmailAlreadyExists,
}

impl fmt::Display for ErrorMessage {
    /// Writes the client-facing text; `to_string()` goes through here
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::ResourceNotFound => "Resource not found.".to_string(),
            ErrorMessage::GeneralError => "Something went wrong.".to_string(),
            ErrorMessage::InvalidBody => "Invalid request body.".to_string(),
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::InvalidCredentials => "Invalid credentials.".to_string(),
            ErrorMessage::UserNotAuthenticated => {
                "Authentication required. Please log in.".to_string()
            }
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::NotBlank => "This value should not be blank.".to_string(),
            ErrorMessage::InvalidValue => "This value is not valid.".to_string(),
            ErrorMessage::IsbnAlreadyExists => "Book with this ISBN already exists.".to_string(),
            ErrorMessage::EmailAlreadyExists => "Email already exists.".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used throughout the application
///
/// Handlers return `Result<T, HttpError>`; Axum turns the error side into a
/// response through [`IntoResponse`]. When `errors` is set the body is the
/// field map itself (validation failures), otherwise the `{"error": ...}`
/// envelope.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String, // body of the `{"error": ...}` envelope
    pub status: StatusCode,
    pub errors: Option<FieldErrors>, // replaces the envelope when set
}

impl HttpError {
    /// Envelope error with an arbitrary status
    ///
    /// Prefer the named constructors below; they carry the fixed message for
    /// their status.
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
            errors: None,
        }
    }

    /// 500 with the fixed generic message. Callers log the cause first.
    pub fn server_error() -> Self {
        HttpError::new(
            ErrorMessage::GeneralError.to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    /// 400 whose body is the field -> messages map
    pub fn form_invalid(errors: FieldErrors) -> Self {
        HttpError {
            message: "Submitted form did not pass validation.".to_string(),
            status: StatusCode::BAD_REQUEST,
            errors: Some(errors),
        }
    }

    /// 401 - the caller is anonymous or presented a bad token
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    /// 403 - the caller is known but the voter said no
    pub fn forbidden() -> Self {
        HttpError::new(
            ErrorMessage::PermissionDenied.to_string(),
            StatusCode::FORBIDDEN,
        )
    }

    pub fn not_found() -> Self {
        HttpError::new(
            ErrorMessage::ResourceNotFound.to_string(),
            StatusCode::NOT_FOUND,
        )
    }

    /// Build the Axum response
    ///
    /// # Returns
    /// - validation failure: `status` with the field map as body
    /// - anything else: `status` with `{"error": message}`
    pub fn into_http_response(self) -> Response {
        match self.errors {
            Some(errors) => (self.status, Json(errors)).into_response(),
            None => {
                let json_response = Json(ErrorResponse {
                    error: self.message,
                });
                (self.status, json_response).into_response()
            }
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_the_public_envelopes() {
        assert_eq!(ErrorMessage::ResourceNotFound.to_string(), "Resource not found.");
        assert_eq!(ErrorMessage::GeneralError.to_string(), "Something went wrong.");
        assert_eq!(
            ErrorMessage::ExceededMaxPasswordLength(64).to_string(),
            "Password must not be more than 64 characters"
        );
    }

    #[test]
    fn status_codes_follow_the_constructor() {
        assert_eq!(HttpError::not_found().status, StatusCode::NOT_FOUND);
        assert_eq!(HttpError::forbidden().status, StatusCode::FORBIDDEN);
        assert_eq!(
            HttpError::server_error().status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let mut errors = FieldErrors::new();
        errors.insert("isbn".to_string(), vec!["x".to_string()]);
        let err = HttpError::form_invalid(errors);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.errors.is_some());
    }

    #[test]
    fn error_response_displays_as_json() {
        let response = ErrorResponse {
            error: "Resource not found.".to_string(),
        };
        assert_eq!(response.to_string(), r#"{"error":"Resource not found."}"#);
    }
}
