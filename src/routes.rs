use axum::{Router, middleware, response::IntoResponse};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    error::HttpError,
    handler::{
        auth::auth_handler, books::books_handler, movies::movies_handler,
        reviews::reviews_handler, users::users_handler,
    },
    middleware::auth,
    resource::{BOOKS, MOVIES, REVIEWS, USERS},
};

async fn not_found() -> impl IntoResponse {
    HttpError::not_found()
}

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .merge(auth_handler())
        .nest(BOOKS.route, books_handler())
        .nest(MOVIES.route, movies_handler())
        .nest(REVIEWS.route, reviews_handler())
        .nest(USERS.route, users_handler())
        .fallback(not_found)
        // every route sees the (optional) caller; voters decide per action
        .layer(middleware::from_fn_with_state(app_state.clone(), auth))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
