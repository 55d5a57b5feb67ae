use crate::{
    AppState,
    db::UserExt,
    dtos::{LoginUserDto, TokenResponseDto},
    error::{ErrorMessage, HttpError},
    forms::{check, parse_body},
    handler::{db_error, ensure_valid},
    utils::{password, token},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
    routing::post,
};
use axum_extra::extract::cookie::Cookie;
use tracing::instrument;

/// Router for authentication endpoints
pub fn auth_handler() -> Router<AppState> {
    Router::new().route("/login_check", post(login_check))
}

fn invalid_credentials() -> HttpError {
    HttpError::unauthorized(ErrorMessage::InvalidCredentials.to_string())
}

/// Exchange `{username, password}` for a JWT
///
/// The token is returned in the body and also set as the `access_token`
/// cookie, which the auth middleware accepts as well.
#[instrument(skip(app_state, body))]
pub async fn login_check(
    State(app_state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let body: LoginUserDto = parse_body(&body)?;
    ensure_valid(check(&body))?;

    let user = app_state
        .db_client
        .get_user_by_username(&body.username)
        .await
        .map_err(db_error("getting user"))?
        .ok_or_else(|| {
            tracing::warn!(username = %body.username, "Login failed, unknown user");
            invalid_credentials()
        })?;

    let password_matched = password::compare(&body.password, &user.password).map_err(|e| {
        tracing::warn!(user_id = user.id, "Password error: {}", e);
        invalid_credentials()
    })?;

    if !password_matched {
        tracing::warn!(user_id = user.id, "Login failed, wrong password");
        return Err(invalid_credentials());
    }

    let access_token = token::create_token(
        user.id,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Access token creation error: {}", e);
        HttpError::server_error()
    })?;

    let access_cookie = Cookie::build(("access_token", access_token.clone()))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::seconds(app_state.env.jwt_maxage))
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        access_cookie.to_string().parse().map_err(|e| {
            tracing::error!("Cookie header error: {}", e);
            HttpError::server_error()
        })?,
    );

    tracing::info!(user_id = user.id, "Login successful");
    Ok((headers, Json(TokenResponseDto { token: access_token })))
}
