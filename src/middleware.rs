use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError},
    models::{Role, User},
    utils::token,
};

/// Middleware extension that stores authenticated user information
///
/// Inserted into the request extensions when a valid token was presented.
/// Handlers read it through [`CurrentUser`].
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

/// Pull the raw token from the `access_token` cookie or `Authorization: Bearer`
///
/// The cookie wins when both are present. It is what `/login_check` sets, so
/// browser clients never have to copy the token into a header.
///
/// # Returns
/// The token text without the `Bearer ` prefix, or `None` for an anonymous
/// request
fn extract_token(cookie_jar: &CookieJar, req: &Request) -> Option<String> {
    cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_owned())
        })
}

/// Authentication middleware, applied to every route
///
/// Requests without a token pass through as anonymous; the voters decide
/// later whether that is enough. A token that is present must be valid and
/// must still belong to a stored user.
///
/// Order of checks:
/// 1. Extract the token (cookie, then header)
/// 2. Verify signature and expiry, read the user id from `sub`
/// 3. Load that user, so role changes apply without a new token
/// 4. Store the user in the request extensions
///
/// # Errors
/// Returns 500 if the user lookup hits a database error.
/// Returns 401 Unauthorized if:
/// - Token is invalid or expired
/// - User no longer exists in database
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let Some(token) = extract_token(&cookie_jar, &req) else {
        return Ok(next.run(req).await);
    };

    // Bad signature or expired: 401 with the token message
    let user_id = token::decode_token(token, app_state.env.jwt_secret.as_bytes())?;

    let user = app_state
        .db_client
        .get_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, loading token user: {}", e);
            HttpError::server_error()
        })?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    // Roles come from the stored row, not from the token
    let roles = user.roles();
    tracing::debug!(
        user_id = user.id,
        roles = ?roles.iter().map(Role::to_str).collect::<Vec<_>>(),
        "request authenticated"
    );

    req.extensions_mut().insert(JWTAuthMiddleware { user });

    Ok(next.run(req).await)
}

/// The caller, if the request was authenticated
///
/// Extracting it never fails: `None` means anonymous, and the voters turn
/// that into 401 where a route needs a user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(
            parts
                .extensions
                .get::<JWTAuthMiddleware>()
                .map(|auth| auth.user.clone()),
        ))
    }
}
