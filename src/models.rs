use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Security role carried by a user account.
///
/// Stored as a JSON array of strings in the `users.roles` column, using the
/// same `ROLE_*` names clients see in tokens and fixtures.
///
/// Derive macros explained:
/// - `Serialize/Deserialize`: the `ROLE_*` wire names come from `serde(rename)`
/// - `Hash, Eq`: roles are compared against small allow-lists in the voters
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User, // Every account has at least this role
    #[serde(rename = "ROLE_MODERATOR")]
    Moderator, // May manage books, movies and other users
    #[serde(rename = "ROLE_ADMIN")]
    Admin, // Full access, including deleting movies
}

impl Role {
    pub fn to_str(&self) -> &str {
        match self {
            Role::User => "ROLE_USER",
            Role::Moderator => "ROLE_MODERATOR",
            Role::Admin => "ROLE_ADMIN",
        }
    }
}

/// User model representing the users table
///
/// `username` is never written independently: the repository copies the
/// email into it on every insert and update.
///
/// Security notes:
/// - `password`: Argon2id hash in PHC format (never plain text)
/// - `roles`: may be empty in storage; use [`User::roles`] to read them
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub roles: Json<Vec<Role>>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl User {
    /// Effective roles: the stored ones, deduplicated, or `ROLE_USER` when
    /// none are stored.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = Vec::with_capacity(self.roles.0.len().max(1));
        for role in self.roles.0.iter() {
            if !roles.contains(role) {
                roles.push(*role);
            }
        }
        if roles.is_empty() {
            roles.push(Role::User);
        }
        roles
    }

    pub fn has_any_role(&self, wanted: &[Role]) -> bool {
        self.roles().iter().any(|role| wanted.contains(role))
    }
}

/// Book model representing the books table
///
/// One book owns many reviews (`reviews.book_id`, deleted with the book) and
/// has many readers through the `user_books` join table.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Book {
    pub id: i64,
    pub isbn: String, // Unique
    pub title: String,
    pub description: String,
    pub author: String,
    pub publication_date: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Movie model representing the movies table
///
/// Reviews point at a movie through `reviews.movie_id`; the audience is the
/// `user_movies` join table.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Movie {
    pub id: i64,
    pub duration: i64, // Minutes
    pub title: String,
    pub description: String,
    pub director: String,
    pub publication_date: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Review model representing the reviews table
///
/// Relationships:
/// - `author_id`: References users.id (required)
/// - `book_id`: References books.id (optional)
/// - `movie_id`: References movies.id (optional)
///
/// Both `book_id` and `movie_id` may be set, or neither.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Review {
    pub id: i64,
    pub body: String,
    pub rating: i64,
    pub publication_date: NaiveDate,
    pub author_id: i64,
    pub book_id: Option<i64>,
    pub movie_id: Option<i64>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}
