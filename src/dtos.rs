use crate::models::{Book, Movie, Review, User};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, ser::SerializeMap};
use validator::Validate;

// DTOs (Data Transfer Objects) define the structure of data exchanged with clients
// They are separate from database models so only allow-listed fields are exposed

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Login request, same shape as a JSON login form: `username` is the email
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "This value should not be blank."))]
    pub username: String,

    #[validate(length(min = 1, message = "This value should not be blank."))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponseDto {
    pub token: String,
}

// ============================================================================
// Envelopes
// ============================================================================

/// `{"success": "Deleted."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: String,
}

impl SuccessResponse {
    pub fn deleted() -> Self {
        SuccessResponse {
            success: "Deleted.".to_string(),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub current_page: i64,
    pub items_per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

/// Collection response: `{"<key>": [...], "pagination": {...}}`
///
/// The key comes from the resource configuration (`books`, `movies`, ...),
/// so it is written by hand instead of derived.
#[derive(Debug)]
pub struct CollectionResponseDto<T> {
    pub key: &'static str,
    pub items: Vec<T>,
    pub pagination: PaginationDto,
}

impl<T: Serialize> Serialize for CollectionResponseDto<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.key, &self.items)?;
        map.serialize_entry("pagination", &self.pagination)?;
        map.end()
    }
}

// ============================================================================
// Resource DTOs (allow-listed fields, relation groups are optional)
// ============================================================================

/// Client-safe user: no password hash, username or roles
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub books: Option<Vec<BookDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movies: Option<Vec<MovieDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<ReviewDto>>,
}

impl UserDto {
    pub fn filter_user(user: &User) -> Self {
        UserDto {
            id: user.id,
            full_name: user.full_name.to_owned(),
            email: user.email.to_owned(),
            created: user.created,
            updated: user.updated,
            books: None,
            movies: None,
            reviews: None,
        }
    }

    pub fn filter_users(users: &[User]) -> Vec<UserDto> {
        users.iter().map(UserDto::filter_user).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDto {
    pub id: i64,
    pub isbn: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub publication_date: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<ReviewDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readers: Option<Vec<UserDto>>,
}

impl From<&Book> for BookDto {
    fn from(book: &Book) -> Self {
        BookDto {
            id: book.id,
            isbn: book.isbn.to_owned(),
            title: book.title.to_owned(),
            description: book.description.to_owned(),
            author: book.author.to_owned(),
            publication_date: book.publication_date,
            created: book.created,
            updated: book.updated,
            reviews: None,
            readers: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieDto {
    pub id: i64,
    pub duration: i64,
    pub title: String,
    pub description: String,
    pub director: String,
    pub publication_date: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<ReviewDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<UserDto>>,
}

impl From<&Movie> for MovieDto {
    fn from(movie: &Movie) -> Self {
        MovieDto {
            id: movie.id,
            duration: movie.duration,
            title: movie.title.to_owned(),
            description: movie.description.to_owned(),
            director: movie.director.to_owned(),
            publication_date: movie.publication_date,
            created: movie.created,
            updated: movie.updated,
            reviews: None,
            audience: None,
        }
    }
}

/// Review with its author always attached; `book`/`movie` are groups
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDto {
    pub id: i64,
    pub body: String,
    pub rating: i64,
    pub publication_date: NaiveDate,
    pub author: Option<UserDto>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<MovieDto>,
}

impl ReviewDto {
    pub fn filter_review(review: &Review, author: Option<&User>) -> Self {
        ReviewDto {
            id: review.id,
            body: review.body.to_owned(),
            rating: review.rating,
            publication_date: review.publication_date,
            author: author.map(UserDto::filter_user),
            created: review.created,
            updated: review.updated,
            book: None,
            movie: None,
        }
    }
}
