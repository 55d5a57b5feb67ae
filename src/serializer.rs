//! Entity -> DTO conversion with relation groups.
//!
//! The DTOs in [`crate::dtos`] hold every relation field as an `Option`;
//! the builders here fill only those whose group is active, loading the
//! relation through the repository traits. Nested objects never carry their
//! own groups, except that a review always brings its author.

use std::collections::{HashMap, HashSet};

use crate::{
    db::{BookExt, DBClient, MovieExt, ReviewExt, UserExt},
    dtos::{BookDto, MovieDto, ReviewDto, UserDto},
    models::{Book, Movie, Review, User},
    resource::ResourceConfig,
};

/// Active serialization groups for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Groups(Vec<&'static str>);

impl Groups {
    /// The resource defaults
    pub fn defaults(config: &ResourceConfig) -> Self {
        Groups(config.default_groups.to_vec())
    }

    /// Defaults plus every known name in `?expand=a,b`
    pub fn from_params(params: &HashMap<String, String>, config: &ResourceConfig) -> Self {
        let mut groups = Groups::defaults(config);
        if let Some(expand) = params.get("expand") {
            for name in expand.split(',').map(str::trim) {
                if let Some(&group) = config.groups.iter().find(|group| **group == name) {
                    if !groups.has(group) {
                        groups.0.push(group);
                    }
                }
            }
        }
        groups
    }

    pub fn has(&self, group: &str) -> bool {
        self.0.iter().any(|active| *active == group)
    }
}

fn unique_ids(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

pub async fn review_views(
    db: &DBClient,
    reviews: &[Review],
    groups: &Groups,
) -> Result<Vec<ReviewDto>, sqlx::Error> {
    let author_ids = unique_ids(reviews.iter().map(|review| review.author_id));
    let authors: HashMap<i64, User> = db
        .get_users_by_ids(&author_ids)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let books: HashMap<i64, Book> = if groups.has("books") {
        let ids = unique_ids(reviews.iter().filter_map(|review| review.book_id));
        db.get_books_by_ids(&ids)
            .await?
            .into_iter()
            .map(|book| (book.id, book))
            .collect()
    } else {
        HashMap::new()
    };

    let movies: HashMap<i64, Movie> = if groups.has("movies") {
        let ids = unique_ids(reviews.iter().filter_map(|review| review.movie_id));
        db.get_movies_by_ids(&ids)
            .await?
            .into_iter()
            .map(|movie| (movie.id, movie))
            .collect()
    } else {
        HashMap::new()
    };

    Ok(reviews
        .iter()
        .map(|review| {
            let mut dto = ReviewDto::filter_review(review, authors.get(&review.author_id));
            dto.book = review
                .book_id
                .and_then(|id| books.get(&id))
                .map(BookDto::from);
            dto.movie = review
                .movie_id
                .and_then(|id| movies.get(&id))
                .map(MovieDto::from);
            dto
        })
        .collect())
}

pub async fn review_view(
    db: &DBClient,
    review: &Review,
    groups: &Groups,
) -> Result<ReviewDto, sqlx::Error> {
    let mut views = review_views(db, std::slice::from_ref(review), groups).await?;
    views.pop().ok_or(sqlx::Error::RowNotFound)
}

pub async fn book_view(db: &DBClient, book: &Book, groups: &Groups) -> Result<BookDto, sqlx::Error> {
    let mut dto = BookDto::from(book);
    if groups.has("reviews") {
        let reviews = db.get_book_reviews(book.id).await?;
        dto.reviews = Some(review_views(db, &reviews, &Groups::default()).await?);
    }
    if groups.has("readers") {
        let readers = db.get_book_readers(book.id).await?;
        dto.readers = Some(UserDto::filter_users(&readers));
    }
    Ok(dto)
}

pub async fn book_views(
    db: &DBClient,
    books: &[Book],
    groups: &Groups,
) -> Result<Vec<BookDto>, sqlx::Error> {
    let mut views = Vec::with_capacity(books.len());
    for book in books {
        views.push(book_view(db, book, groups).await?);
    }
    Ok(views)
}

pub async fn movie_view(
    db: &DBClient,
    movie: &Movie,
    groups: &Groups,
) -> Result<MovieDto, sqlx::Error> {
    let mut dto = MovieDto::from(movie);
    if groups.has("reviews") {
        let reviews = db.get_movie_reviews(movie.id).await?;
        dto.reviews = Some(review_views(db, &reviews, &Groups::default()).await?);
    }
    if groups.has("audience") {
        let audience = db.get_movie_audience(movie.id).await?;
        dto.audience = Some(UserDto::filter_users(&audience));
    }
    Ok(dto)
}

pub async fn movie_views(
    db: &DBClient,
    movies: &[Movie],
    groups: &Groups,
) -> Result<Vec<MovieDto>, sqlx::Error> {
    let mut views = Vec::with_capacity(movies.len());
    for movie in movies {
        views.push(movie_view(db, movie, groups).await?);
    }
    Ok(views)
}

pub async fn user_view(db: &DBClient, user: &User, groups: &Groups) -> Result<UserDto, sqlx::Error> {
    let mut dto = UserDto::filter_user(user);
    if groups.has("books") {
        let books = db.get_user_books(user.id).await?;
        dto.books = Some(books.iter().map(BookDto::from).collect());
    }
    if groups.has("movies") {
        let movies = db.get_user_movies(user.id).await?;
        dto.movies = Some(movies.iter().map(MovieDto::from).collect());
    }
    if groups.has("reviews") {
        let reviews = db.get_author_reviews(user.id).await?;
        dto.reviews = Some(review_views(db, &reviews, &Groups::default()).await?);
    }
    Ok(dto)
}

pub async fn user_views(
    db: &DBClient,
    users: &[User],
    groups: &Groups,
) -> Result<Vec<UserDto>, sqlx::Error> {
    let mut views = Vec::with_capacity(users.len());
    for user in users {
        views.push(user_view(db, user, groups).await?);
    }
    Ok(views)
}
