pub mod auth;
pub mod books;
pub mod movies;
pub mod reviews;
pub mod users;

use crate::error::{FieldErrors, HttpError};

/// Log a repository failure and hide it behind the generic 500
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> HttpError {
    move |e| {
        tracing::error!("DB error, {}: {}", context, e);
        HttpError::server_error()
    }
}

/// Ids are numeric; anything else cannot name a resource
pub(crate) fn parse_id(raw: &str) -> Result<i64, HttpError> {
    raw.parse::<i64>().map_err(|_| HttpError::not_found())
}

pub(crate) fn ensure_valid(errors: FieldErrors) -> Result<(), HttpError> {
    if errors.is_empty() {
        return Ok(());
    }
    tracing::debug!(?errors, "form rejected");
    Err(HttpError::form_invalid(errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn non_numeric_ids_are_not_found() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert_eq!(parse_id("abc").unwrap_err().status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn empty_error_map_passes() {
        assert!(ensure_valid(FieldErrors::new()).is_ok());
        let mut errors = FieldErrors::new();
        errors.insert("isbn".to_string(), vec!["taken".to_string()]);
        let err = ensure_valid(errors).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
