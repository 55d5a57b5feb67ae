use std::collections::HashMap;

use crate::{
    AppState,
    db::{BookExt, DBClient, MovieExt, ReviewExt, UserExt},
    dtos::{CollectionResponseDto, SuccessResponse},
    error::{ErrorMessage, HttpError},
    filter::ListQuery,
    forms::{ReviewData, ReviewForm, add_error, check, parse_body},
    handler::{db_error, ensure_valid, parse_id},
    middleware::CurrentUser,
    models::Review,
    resource::{Action, REVIEWS},
    security::authorize,
    serializer::{Groups, review_view, review_views},
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

/// Router for `/reviews`
pub fn reviews_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(get_reviews).post(create_review))
        .route(
            "/{id}",
            get(get_review).patch(update_review).delete(delete_review),
        )
}

async fn find_review(db: &DBClient, raw_id: &str) -> Result<Review, HttpError> {
    let review_id = parse_id(raw_id)?;
    db.get_review(review_id)
        .await
        .map_err(db_error("getting review"))?
        .ok_or_else(HttpError::not_found)
}

/// Form checks plus existence of every referenced author, book and movie
async fn validate_review(db: &DBClient, form: ReviewForm) -> Result<ReviewData, HttpError> {
    let mut errors = check(&form);

    if let Some(author_id) = form.author {
        let author = db
            .get_user(author_id)
            .await
            .map_err(db_error("checking review author"))?;
        if author.is_none() {
            add_error(&mut errors, "author", ErrorMessage::InvalidValue);
        }
    }
    if let Some(Some(book_id)) = form.book {
        let book = db
            .get_book(book_id)
            .await
            .map_err(db_error("checking review book"))?;
        if book.is_none() {
            add_error(&mut errors, "book", ErrorMessage::InvalidValue);
        }
    }
    if let Some(Some(movie_id)) = form.movie {
        let movie = db
            .get_movie(movie_id)
            .await
            .map_err(db_error("checking review movie"))?;
        if movie.is_none() {
            add_error(&mut errors, "movie", ErrorMessage::InvalidValue);
        }
    }

    ensure_valid(errors)?;
    form.into_data()
}

/// Query params: ?review_filter[rating]=5&page=1&limit=10&expand=books,movies
#[instrument(skip(app_state))]
pub async fn get_reviews(
    Query(params): Query<HashMap<String, String>>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let query = ListQuery::from_params(&params, &REVIEWS)?;
    let db = &app_state.db_client;

    let total = db
        .get_review_count(&query.predicates)
        .await
        .map_err(db_error("counting reviews"))?;
    let pagination = query.page.pagination(total)?;

    let reviews = db
        .get_reviews(&query.predicates, query.page)
        .await
        .map_err(db_error("getting reviews"))?;
    let items = review_views(db, &reviews, &query.groups)
        .await
        .map_err(db_error("loading review relations"))?;

    tracing::info!("get_reviews successful");
    Ok(Json(CollectionResponseDto {
        key: REVIEWS.response_key,
        items,
        pagination,
    }))
}

#[instrument(skip(app_state, params))]
pub async fn get_review(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let review = find_review(db, &id).await?;

    let view = review_view(db, &review, &Groups::from_params(&params, &REVIEWS))
        .await
        .map_err(db_error("loading review relations"))?;

    Ok(Json(view))
}

/// The author defaults to the caller when the body names none
#[instrument(skip(app_state, actor, body))]
pub async fn create_review(
    State(app_state): State<AppState>,
    actor: CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    authorize(&REVIEWS, Action::Create, actor.user(), None)?;

    let db = &app_state.db_client;
    let mut form: ReviewForm = parse_body(&body)?;
    if form.author.is_none() {
        form.author = actor.user().map(|user| user.id);
    }
    let data = validate_review(db, form).await?;

    let review = db
        .save_review(&data)
        .await
        .map_err(db_error("saving review"))?;
    let view = review_view(db, &review, &Groups::defaults(&REVIEWS))
        .await
        .map_err(db_error("loading review relations"))?;

    tracing::info!(review_id = review.id, "create_review successful");
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(app_state, actor, body))]
pub async fn update_review(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    actor: CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let review = find_review(db, &id).await?;
    authorize(&REVIEWS, Action::Update, actor.user(), None)?;

    let patch: ReviewForm = parse_body(&body)?;
    let form = ReviewForm::from_review(&review).merge(patch);
    let data = validate_review(db, form).await?;

    let review = db
        .update_review(review.id, &data)
        .await
        .map_err(db_error("updating review"))?;
    let view = review_view(db, &review, &Groups::defaults(&REVIEWS))
        .await
        .map_err(db_error("loading review relations"))?;

    tracing::info!(review_id = review.id, "update_review successful");
    Ok(Json(view))
}

#[instrument(skip(app_state, actor))]
pub async fn delete_review(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    actor: CurrentUser,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let review = find_review(db, &id).await?;
    authorize(&REVIEWS, Action::Delete, actor.user(), None)?;

    db.delete_review(review.id)
        .await
        .map_err(db_error("deleting review"))?;

    tracing::info!(review_id = review.id, "delete_review successful");
    Ok(Json(SuccessResponse::deleted()))
}
