//! HTTP-level integration tests for `/books`: CRUD, voters, validation,
//! filters, pagination and relation groups.

mod common;

use axum::http::StatusCode;
use catalog_api::models::Role;
use common::{
    admin_token, body_json, book_body, build_test_app, create_user, create_via_api, delete_auth,
    get, patch_json_auth, post_json, post_json_auth, token_for,
};
use serde_json::json;
use sqlx::SqlitePool;

// ---------------------------------------------------------------------------
// Create / show
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_admin_creates_book_and_reads_it_back(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);

    let response = post_json_auth(app.clone(), "/books", &token, book_body("9783161484100")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_i64().expect("id");
    assert_eq!(created["publicationDate"], "2000-09-04T17:58:04Z");
    assert_eq!(created["reviews"], json!([]), "reviews is a default group");
    assert!(created.get("readers").is_none());

    let response = get(app, &format!("/books/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["isbn"], "9783161484100");
    assert_eq!(json["author"], "Jade Carroll");
}

#[sqlx::test]
async fn test_missing_publication_date_is_a_field_error(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);

    let mut body = book_body("9783161484100");
    body.as_object_mut().unwrap().remove("publicationDate");
    let response = post_json_auth(app, "/books", &token, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(
        json,
        json!({"publicationDate": ["This value should not be blank."]})
    );
}

#[sqlx::test]
async fn test_duplicate_isbn_is_rejected(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);

    create_via_api(app.clone(), "/books", &token, book_body("111")).await;
    let response = post_json_auth(app, "/books", &token, book_body("111")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["isbn"], json!(["Book with this ISBN already exists."]));
}

#[sqlx::test]
async fn test_malformed_body_is_a_bad_request(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);

    let response = post_json_auth(app, "/books", &token, json!("just a string")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Invalid request body."})
    );
}

// ---------------------------------------------------------------------------
// Voters
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_anonymous_create_is_unauthorized(pool: SqlitePool) {
    let app = build_test_app(pool);
    let response = post_json(app, "/books", book_body("222")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(response).await["error"].is_string());
}

#[sqlx::test]
async fn test_plain_user_cannot_create_but_moderator_can(pool: SqlitePool) {
    let plain = create_user(&pool, "plain@example.com", vec![Role::User]).await;
    let moderator = create_user(&pool, "mod@example.com", vec![Role::Moderator]).await;
    let app = build_test_app(pool);

    let response = post_json_auth(app.clone(), "/books", &token_for(&plain), book_body("333")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json_auth(app, "/books", &token_for(&moderator), book_body("333")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[sqlx::test]
async fn test_invalid_token_is_unauthorized(pool: SqlitePool) {
    let app = build_test_app(pool);
    let response = post_json_auth(app, "/books", "not-a-token", book_body("444")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_patch_changes_only_sent_fields(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);
    let id = create_via_api(app.clone(), "/books", &token, book_body("555")).await;

    let response = patch_json_auth(
        app.clone(),
        &format!("/books/{id}"),
        &token,
        json!({"title": "Renamed"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["title"], "Renamed");
    assert_eq!(json["isbn"], "555");
    assert_eq!(json["author"], "Jade Carroll");

    // keeping its own isbn is not a uniqueness violation
    let response = patch_json_auth(app, &format!("/books/{id}"), &token, json!({"isbn": "555"})).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test]
async fn test_delete_then_show_is_not_found(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);
    let id = create_via_api(app.clone(), "/books", &token, book_body("666")).await;

    let response = delete_auth(app.clone(), &format!("/books/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"success": "Deleted."}));

    let response = get(app, &format!("/books/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Resource not found."})
    );
}

#[sqlx::test]
async fn test_missing_ids_are_not_found(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);

    assert_eq!(get(app.clone(), "/books/0").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(app.clone(), "/books/abc").await.status(), StatusCode::NOT_FOUND);
    let response = patch_json_auth(app.clone(), "/books/0", &token, json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = delete_auth(app, "/books/0", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn test_any_authenticated_user_may_delete_a_book(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let plain = create_user(&pool, "reader@example.com", vec![]).await;
    let app = build_test_app(pool);
    let id = create_via_api(app.clone(), "/books", &token, book_body("777")).await;

    let response = delete_auth(app, &format!("/books/{id}"), &token_for(&plain)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_filter_by_isbn_returns_only_matches(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);
    create_via_api(app.clone(), "/books", &token, book_body("9783161484100")).await;
    create_via_api(app.clone(), "/books", &token, book_body("9780000000002")).await;

    let response = get(app, "/books?book_filter%5Bisbn%5D=9783161484100").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let books = json["books"].as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["isbn"], "9783161484100");
    assert_eq!(json["pagination"]["totalItems"], 1);
}

#[sqlx::test]
async fn test_publication_date_range_is_inclusive_by_day(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);
    create_via_api(app.clone(), "/books", &token, book_body("1")).await;

    let response = get(
        app.clone(),
        "/books?book_filter%5BpublicationDate%5D%5Bleft_datetime%5D=2000-09-04&book_filter%5BpublicationDate%5D%5Bright_datetime%5D=2000-09-04",
    )
    .await;
    assert_eq!(body_json(response).await["books"].as_array().unwrap().len(), 1);

    let response = get(
        app.clone(),
        "/books?book_filter%5BpublicationDate%5D%5Bleft_datetime%5D=2000-09-05",
    )
    .await;
    assert_eq!(body_json(response).await["books"].as_array().unwrap().len(), 0);

    let response = get(app, "/books?book_filter%5BpublicationDate%5D%5Bleft_datetime%5D=soon").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn test_pagination_metadata_and_bounds(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);
    for n in 0..3 {
        create_via_api(app.clone(), "/books", &token, book_body(&format!("isbn-{n}"))).await;
    }

    let response = get(app.clone(), "/books?page=2&limit=2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["books"].as_array().unwrap().len(), 1);
    assert_eq!(json["books"][0]["isbn"], "isbn-2");
    assert_eq!(
        json["pagination"],
        json!({"currentPage": 2, "itemsPerPage": 2, "totalItems": 3, "totalPages": 2})
    );

    assert_eq!(get(app.clone(), "/books?page=3&limit=2").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(app.clone(), "/books?limit=101").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(get(app, "/books?page=0").await.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn test_empty_collection_has_one_page(pool: SqlitePool) {
    let app = build_test_app(pool);
    let json = body_json(get(app, "/books").await).await;
    assert_eq!(json["books"], json!([]));
    assert_eq!(json["pagination"]["totalPages"], 1);
    assert_eq!(json["pagination"]["currentPage"], 1);
    assert_eq!(json["pagination"]["itemsPerPage"], 10);
}

#[sqlx::test]
async fn test_expand_readers_lists_users_holding_the_book(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);
    let book_id = create_via_api(app.clone(), "/books", &token, book_body("888")).await;

    let body = json!({
        "fullName": "Avid Reader",
        "email": "avid@example.com",
        "plainPassword": "pa55word",
        "books": [book_id],
    });
    let response = post_json(app.clone(), "/users", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(get(app, &format!("/books/{book_id}?expand=readers")).await).await;
    let readers = json["readers"].as_array().unwrap();
    assert_eq!(readers.len(), 1);
    assert_eq!(readers[0]["email"], "avid@example.com");
    assert!(readers[0].get("password").is_none());
}

#[sqlx::test]
async fn test_unknown_route_is_not_found_envelope(pool: SqlitePool) {
    let app = build_test_app(pool);
    let response = get(app, "/nothing-here").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Resource not found."})
    );
}

#[sqlx::test]
async fn test_patch_keeps_fractional_publication_date(pool: SqlitePool) {
    let token = admin_token(&pool).await;
    let app = build_test_app(pool);
    let mut body = book_body("9783161484100");
    body["publicationDate"] = json!("2000-09-04T17:58:04.750+00:00");
    let id = create_via_api(app.clone(), "/books", &token, body).await;

    let before = body_json(get(app.clone(), &format!("/books/{id}")).await).await;
    assert_eq!(before["publicationDate"], "2000-09-04T17:58:04.750Z");

    let response = patch_json_auth(app, &format!("/books/{id}"), &token, json!({"title": "Renamed"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["title"], "Renamed");
    assert_eq!(json["publicationDate"], before["publicationDate"]);
}
