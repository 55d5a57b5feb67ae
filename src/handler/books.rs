use std::collections::HashMap;

use crate::{
    AppState,
    db::{BookExt, DBClient},
    dtos::{CollectionResponseDto, SuccessResponse},
    error::{ErrorMessage, HttpError},
    filter::ListQuery,
    forms::{BookData, BookForm, add_error, check, parse_body},
    handler::{db_error, ensure_valid, parse_id},
    middleware::CurrentUser,
    models::Book,
    resource::{Action, BOOKS},
    security::authorize,
    serializer::{Groups, book_view, book_views},
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

/// Router for `/books`
pub fn books_handler() -> Router<AppState> {
    Router::new()
        .route("/", get(get_books).post(create_book))
        .route("/{id}", get(get_book).patch(update_book).delete(delete_book))
}

async fn find_book(db: &DBClient, raw_id: &str) -> Result<Book, HttpError> {
    let book_id = parse_id(raw_id)?;
    db.get_book(book_id)
        .await
        .map_err(db_error("getting book"))?
        .ok_or_else(HttpError::not_found)
}

/// Form checks plus ISBN uniqueness against every other book
async fn validate_book(
    db: &DBClient,
    form: BookForm,
    book_id: Option<i64>,
) -> Result<BookData, HttpError> {
    let mut errors = check(&form);

    if let Some(isbn) = form.isbn.as_deref() {
        if !errors.contains_key("isbn")
            && db
                .isbn_taken(isbn, book_id)
                .await
                .map_err(db_error("checking isbn"))?
        {
            add_error(&mut errors, "isbn", ErrorMessage::IsbnAlreadyExists);
        }
    }

    ensure_valid(errors)?;
    form.into_data()
}

/// Query params: ?book_filter[isbn]=...&page=1&limit=10&expand=readers
#[instrument(skip(app_state))]
pub async fn get_books(
    Query(params): Query<HashMap<String, String>>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let query = ListQuery::from_params(&params, &BOOKS)?;
    let db = &app_state.db_client;

    let total = db
        .get_book_count(&query.predicates)
        .await
        .map_err(db_error("counting books"))?;
    let pagination = query.page.pagination(total)?;

    let books = db
        .get_books(&query.predicates, query.page)
        .await
        .map_err(db_error("getting books"))?;
    let items = book_views(db, &books, &query.groups)
        .await
        .map_err(db_error("loading book relations"))?;

    tracing::info!("get_books successful");
    Ok(Json(CollectionResponseDto {
        key: BOOKS.response_key,
        items,
        pagination,
    }))
}

#[instrument(skip(app_state, params))]
pub async fn get_book(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let book = find_book(db, &id).await?;

    let view = book_view(db, &book, &Groups::from_params(&params, &BOOKS))
        .await
        .map_err(db_error("loading book relations"))?;

    Ok(Json(view))
}

#[instrument(skip(app_state, actor, body))]
pub async fn create_book(
    State(app_state): State<AppState>,
    actor: CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    authorize(&BOOKS, Action::Create, actor.user(), None)?;

    let db = &app_state.db_client;
    let form: BookForm = parse_body(&body)?;
    let data = validate_book(db, form, None).await?;

    let book = db.save_book(&data).await.map_err(db_error("saving book"))?;
    let view = book_view(db, &book, &Groups::defaults(&BOOKS))
        .await
        .map_err(db_error("loading book relations"))?;

    tracing::info!(book_id = book.id, "create_book successful");
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(app_state, actor, body))]
pub async fn update_book(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    actor: CurrentUser,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let book = find_book(db, &id).await?;
    authorize(&BOOKS, Action::Update, actor.user(), None)?;

    let patch: BookForm = parse_body(&body)?;
    let form = BookForm::from_book(&book).merge(patch);
    let data = validate_book(db, form, Some(book.id)).await?;

    let book = db
        .update_book(book.id, &data)
        .await
        .map_err(db_error("updating book"))?;
    let view = book_view(db, &book, &Groups::defaults(&BOOKS))
        .await
        .map_err(db_error("loading book relations"))?;

    tracing::info!(book_id = book.id, "update_book successful");
    Ok(Json(view))
}

#[instrument(skip(app_state, actor))]
pub async fn delete_book(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    actor: CurrentUser,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let book = find_book(db, &id).await?;
    authorize(&BOOKS, Action::Delete, actor.user(), None)?;

    db.delete_book(book.id)
        .await
        .map_err(db_error("deleting book"))?;

    tracing::info!(book_id = book.id, "delete_book successful");
    Ok(Json(SuccessResponse::deleted()))
}
