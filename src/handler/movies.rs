use std::collections::HashMap;

use crate::{
    AppState,
    db::{DBClient, MovieExt},
    dtos::{CollectionResponseDto, SuccessResponse},
    error::HttpError,
    filter::ListQuery,
    forms::{MovieForm, check, parse_body},
    handler::{db_error, ensure_valid, parse_id},
    middleware::CurrentUser,
    models::Movie,
    resource::{Action, MOVIES},
    security::authorize,
    serializer::{Groups, movie_view, movie_views},
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

/// Router for `/movies`
pub fn movies_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(get_movies).post(create_movie))
        .route(
            "/{id}",
            get(get_movie).patch(update_movie).delete(delete_movie),
        )
}

async fn find_movie(db: &DBClient, raw_id: &str) -> Result<Movie, HttpError> {
    let movie_id = parse_id(raw_id)?;
    db.get_movie(movie_id)
        .await
        .map_err(db_error("getting movie"))?
        .ok_or_else(HttpError::not_found)
}

#[instrument(skip(app_state))]
pub async fn get_movies(
    Query(params): Query<HashMap<String, String>>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let query = ListQuery::from_params(&params, &MOVIES)?;
    let db = &app_state.db_client;

    let total = db
        .get_movie_count(&query.predicates)
        .await
        .map_err(db_error("counting movies"))?;
    let pagination = query.page.pagination(total)?;

    let movies = db
        .get_movies(&query.predicates, query.page)
        .await
        .map_err(db_error("getting movies"))?;
    let items = movie_views(db, &movies, &query.groups)
        .await
        .map_err(db_error("loading movie relations"))?;

    tracing::info!("get_movies successful");
    Ok(Json(CollectionResponseDto {
        key: MOVIES.response_key,
        items,
        pagination,
    }))
}

#[instrument(skip(app_state, params))]
pub async fn get_movie(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let movie = find_movie(db, &id).await?;

    let view = movie_view(db, &movie, &Groups::from_params(&params, &MOVIES))
        .await
        .map_err(db_error("loading movie relations"))?;

    Ok(Json(view))
}

#[instrument(skip(app_state, actor, body))]
pub async fn create_movie(
    State(app_state): State<AppState>,
    actor: CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    authorize(&MOVIES, Action::Create, actor.user(), None)?;

    let form: MovieForm = parse_body(&body)?;
    ensure_valid(check(&form))?;
    let data = form.into_data()?;

    let db = &app_state.db_client;
    let movie = db
        .save_movie(&data)
        .await
        .map_err(db_error("saving movie"))?;
    let view = movie_view(db, &movie, &Groups::defaults(&MOVIES))
        .await
        .map_err(db_error("loading movie relations"))?;

    tracing::info!(movie_id = movie.id, "create_movie successful");
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(app_state, actor, body))]
pub async fn update_movie(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    actor: CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let movie = find_movie(db, &id).await?;
    authorize(&MOVIES, Action::Update, actor.user(), None)?;

    let patch: MovieForm = parse_body(&body)?;
    let form = MovieForm::from_movie(&movie).merge(patch);
    ensure_valid(check(&form))?;
    let data = form.into_data()?;

    let movie = db
        .update_movie(movie.id, &data)
        .await
        .map_err(db_error("updating movie"))?;
    let view = movie_view(db, &movie, &Groups::defaults(&MOVIES))
        .await
        .map_err(db_error("loading movie relations"))?;

    tracing::info!(movie_id = movie.id, "update_movie successful");
    Ok(Json(view))
}

#[instrument(skip(app_state, actor))]
pub async fn delete_movie(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    actor: CurrentUser,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let movie = find_movie(db, &id).await?;
    authorize(&MOVIES, Action::Delete, actor.user(), None)?;

    db.delete_movie(movie.id)
        .await
        .map_err(db_error("deleting movie"))?;

    tracing::info!(movie_id = movie.id, "delete_movie successful");
    Ok(Json(SuccessResponse::deleted()))
}
