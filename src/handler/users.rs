use std::collections::{BTreeSet, HashMap};

use crate::{
    AppState,
    db::{BookExt, DBClient, MovieExt, UserExt},
    dtos::{CollectionResponseDto, SuccessResponse},
    error::{ErrorMessage, FieldErrors, HttpError},
    filter::ListQuery,
    forms::{UserData, UserForm, add_error, check, parse_body},
    handler::{db_error, ensure_valid, parse_id},
    middleware::CurrentUser,
    models::{Role, User},
    resource::{Action, USERS},
    security::authorize,
    serializer::{Groups, user_view, user_views},
    utils::password,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;

/// Router for `/users`
///
/// Registration is the open `POST /users`; changing or deleting an account
/// needs its owner, a moderator or an admin.
pub fn users_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(get_users).post(create_user))
        .route("/{id}", get(get_user).patch(update_user).delete(delete_user))
}

async fn find_user(db: &DBClient, raw_id: &str) -> Result<User, HttpError> {
    let user_id = parse_id(raw_id)?;
    db.get_user(user_id)
        .await
        .map_err(db_error("getting user"))?
        .ok_or_else(HttpError::not_found)
}

fn distinct(ids: &[i64]) -> BTreeSet<i64> {
    ids.iter().copied().collect()
}

async fn check_books(db: &DBClient, ids: &[i64], errors: &mut FieldErrors) -> Result<(), HttpError> {
    let wanted: Vec<i64> = distinct(ids).into_iter().collect();
    let found = db
        .get_books_by_ids(&wanted)
        .await
        .map_err(db_error("checking user books"))?;
    if found.len() != wanted.len() {
        add_error(errors, "books", ErrorMessage::InvalidValue);
    }
    Ok(())
}

async fn check_movies(
    db: &DBClient,
    ids: &[i64],
    errors: &mut FieldErrors,
) -> Result<(), HttpError> {
    let wanted: Vec<i64> = distinct(ids).into_iter().collect();
    let found = db
        .get_movies_by_ids(&wanted)
        .await
        .map_err(db_error("checking user movies"))?;
    if found.len() != wanted.len() {
        add_error(errors, "movies", ErrorMessage::InvalidValue);
    }
    Ok(())
}

/// Form checks, email uniqueness, referenced books/movies, then the
/// password hash. The plain password does not outlive this function.
async fn validate_user(
    db: &DBClient,
    form: UserForm,
    user_id: Option<i64>,
) -> Result<UserData, HttpError> {
    let mut errors = check(&form);

    if let Some(email) = form.email.as_deref() {
        if !errors.contains_key("email")
            && db
                .email_taken(email, user_id)
                .await
                .map_err(db_error("checking email"))?
        {
            add_error(&mut errors, "email", ErrorMessage::EmailAlreadyExists);
        }
    }

    match form.plain_password.as_deref() {
        None if user_id.is_none() => add_error(&mut errors, "plainPassword", ErrorMessage::NotBlank),
        None => {}
        Some(plain) => match password::check_length(plain) {
            Ok(()) => {}
            Err(ErrorMessage::EmptyPassword) => {
                add_error(&mut errors, "plainPassword", ErrorMessage::NotBlank)
            }
            Err(e) => add_error(&mut errors, "plainPassword", e),
        },
    }

    if let Some(books) = form.books.as_deref() {
        check_books(db, books, &mut errors).await?;
    }
    if let Some(movies) = form.movies.as_deref() {
        check_movies(db, movies, &mut errors).await?;
    }

    ensure_valid(errors)?;

    let password_hash = match form.plain_password.as_deref() {
        Some(plain) => Some(password::hash(plain).map_err(|e| {
            tracing::error!("Password hashing error: {}", e);
            HttpError::server_error()
        })?),
        None => None,
    };

    form.into_data(password_hash)
}

/// Query params: ?user_filter[email]=...&user_filter[movies]=<title>&expand=books
#[instrument(skip(app_state))]
pub async fn get_users(
    Query(params): Query<HashMap<String, String>>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let query = ListQuery::from_params(&params, &USERS)?;
    let db = &app_state.db_client;

    let total = db
        .get_user_count(&query.predicates)
        .await
        .map_err(db_error("counting users"))?;
    let pagination = query.page.pagination(total)?;

    let users = db
        .get_users(&query.predicates, query.page)
        .await
        .map_err(db_error("getting users"))?;
    let items = user_views(db, &users, &query.groups)
        .await
        .map_err(db_error("loading user relations"))?;

    tracing::info!("get_users successful");
    Ok(Json(CollectionResponseDto {
        key: USERS.response_key,
        items,
        pagination,
    }))
}

#[instrument(skip(app_state, params))]
pub async fn get_user(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let user = find_user(db, &id).await?;

    let view = user_view(db, &user, &Groups::from_params(&params, &USERS))
        .await
        .map_err(db_error("loading user relations"))?;

    Ok(Json(view))
}

#[instrument(skip(app_state, actor, body))]
pub async fn create_user(
    State(app_state): State<AppState>,
    actor: CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    authorize(&USERS, Action::Create, actor.user(), None)?;

    let db = &app_state.db_client;
    let form: UserForm = parse_body(&body)?;
    let data = validate_user(db, form, None).await?;

    let user = db
        .save_user(&data, vec![Role::User])
        .await
        .map_err(db_error("saving user"))?;
    let view = user_view(db, &user, &Groups::defaults(&USERS))
        .await
        .map_err(db_error("loading user relations"))?;

    tracing::info!(user_id = user.id, "create_user successful");
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(app_state, actor, body))]
pub async fn update_user(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    actor: CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let user = find_user(db, &id).await?;
    authorize(&USERS, Action::Update, actor.user(), Some(user.id))?;

    let patch: UserForm = parse_body(&body)?;
    let form = UserForm::from_user(&user).merge(patch);
    let data = validate_user(db, form, Some(user.id)).await?;

    let user = db
        .update_user(user.id, &data)
        .await
        .map_err(db_error("updating user"))?;
    let view = user_view(db, &user, &Groups::defaults(&USERS))
        .await
        .map_err(db_error("loading user relations"))?;

    tracing::info!(user_id = user.id, "update_user successful");
    Ok(Json(view))
}

#[instrument(skip(app_state, actor))]
pub async fn delete_user(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    actor: CurrentUser,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let user = find_user(db, &id).await?;
    authorize(&USERS, Action::Delete, actor.user(), Some(user.id))?;

    db.delete_user(user.id)
        .await
        .map_err(db_error("deleting user"))?;

    tracing::info!(user_id = user.id, "delete_user successful");
    Ok(Json(SuccessResponse::deleted()))
}
