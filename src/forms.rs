//! Write-side forms.
//!
//! A request body is decoded into a form whose fields are all optional.
//! POST validates the form as sent; PATCH first merges it onto a form built
//! from the stored entity, so fields the client left out keep their values.
//! A validated form converts into the plain `*Data` struct the repository
//! writes.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    error::{ErrorMessage, FieldErrors, HttpError},
    filter::parse_day,
    models::{Book, Movie, Review, User},
};

// ============================================================================
// Body parsing
// ============================================================================

/// Decode a JSON body regardless of `Content-Type`. An empty body is `{}`;
/// anything that does not fit the form is a 400 envelope.
pub fn parse_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, HttpError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| {
        tracing::debug!("Invalid JSON body: {}", e);
        HttpError::bad_request(ErrorMessage::InvalidBody.to_string())
    })
}

// ============================================================================
// Error collection
// ============================================================================

/// `publication_date` -> `publicationDate`
pub fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Flatten validator output into the field -> messages map clients see
pub fn collect_field_errors(errors: &ValidationErrors, into: &mut FieldErrors) {
    for (field, field_errors) in errors.field_errors() {
        let entry = into.entry(to_camel_case(&field)).or_default();
        for error in field_errors.iter() {
            let message = error
                .message
                .as_ref()
                .map(|message| message.to_string())
                .unwrap_or_else(|| ErrorMessage::InvalidValue.to_string());
            entry.push(message);
        }
    }
}

/// Run the derived validation and return the collected field errors
pub fn check<T: Validate>(form: &T) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Err(e) = form.validate() {
        collect_field_errors(&e, &mut errors);
    }
    errors
}

pub fn add_error(errors: &mut FieldErrors, field: &str, message: ErrorMessage) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, HttpError> {
    value.ok_or_else(|| {
        let mut errors = FieldErrors::new();
        add_error(&mut errors, field, ErrorMessage::NotBlank);
        HttpError::form_invalid(errors)
    })
}

// ============================================================================
// Date handling
// ============================================================================

fn invalid_value() -> ValidationError {
    ValidationError::new("invalid").with_message(Cow::Borrowed("This value is not valid."))
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as UTC midnight
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        })
}

/// Review dates are calendar days; a full timestamp keeps only its UTC day
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_day(raw)
}

fn validate_datetime(value: &String) -> Result<(), ValidationError> {
    match parse_datetime(value) {
        Some(_) => Ok(()),
        None => Err(invalid_value()),
    }
}

fn validate_date(value: &String) -> Result<(), ValidationError> {
    match parse_date(value) {
        Some(_) => Ok(()),
        None => Err(invalid_value()),
    }
}

/// Inverse of [`parse_datetime`], keeping sub-second precision
fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// `"field": null` is `Some(None)`, a missing field is `None` (via `default`)
fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Book
// ============================================================================

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookForm {
    #[validate(
        required(message = "This value should not be blank."),
        length(min = 1, message = "This value should not be blank.")
    )]
    pub isbn: Option<String>,

    #[validate(
        required(message = "This value should not be blank."),
        length(min = 1, message = "This value should not be blank.")
    )]
    pub title: Option<String>,

    #[validate(
        required(message = "This value should not be blank."),
        length(min = 1, message = "This value should not be blank.")
    )]
    pub description: Option<String>,

    #[validate(
        required(message = "This value should not be blank."),
        length(min = 1, message = "This value should not be blank.")
    )]
    pub author: Option<String>,

    #[validate(
        required(message = "This value should not be blank."),
        custom(function = "validate_datetime")
    )]
    pub publication_date: Option<String>,
}

/// Validated book fields, ready to insert or update
#[derive(Debug, Clone)]
pub struct BookData {
    pub isbn: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub publication_date: DateTime<Utc>,
}

impl BookForm {
    pub fn from_book(book: &Book) -> Self {
        BookForm {
            isbn: Some(book.isbn.clone()),
            title: Some(book.title.clone()),
            description: Some(book.description.clone()),
            author: Some(book.author.clone()),
            publication_date: Some(format_datetime(&book.publication_date)),
        }
    }

    /// PATCH semantics: fields present in `patch` win
    pub fn merge(self, patch: BookForm) -> Self {
        BookForm {
            isbn: patch.isbn.or(self.isbn),
            title: patch.title.or(self.title),
            description: patch.description.or(self.description),
            author: patch.author.or(self.author),
            publication_date: patch.publication_date.or(self.publication_date),
        }
    }

    pub fn into_data(self) -> Result<BookData, HttpError> {
        let raw_date = required(self.publication_date, "publicationDate")?;
        Ok(BookData {
            isbn: required(self.isbn, "isbn")?,
            title: required(self.title, "title")?,
            description: required(self.description, "description")?,
            author: required(self.author, "author")?,
            publication_date: required(parse_datetime(&raw_date), "publicationDate")?,
        })
    }
}

// ============================================================================
// Movie
// ============================================================================

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MovieForm {
    #[validate(
        required(message = "This value should not be blank."),
        range(min = 0, message = "This value should be positive or zero.")
    )]
    pub duration: Option<i64>,

    #[validate(
        required(message = "This value should not be blank."),
        length(min = 1, message = "This value should not be blank.")
    )]
    pub title: Option<String>,

    #[validate(
        required(message = "This value should not be blank."),
        length(min = 1, message = "This value should not be blank.")
    )]
    pub description: Option<String>,

    #[validate(
        required(message = "This value should not be blank."),
        length(min = 1, message = "This value should not be blank.")
    )]
    pub director: Option<String>,

    #[validate(
        required(message = "This value should not be blank."),
        custom(function = "validate_datetime")
    )]
    pub publication_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MovieData {
    pub duration: i64,
    pub title: String,
    pub description: String,
    pub director: String,
    pub publication_date: DateTime<Utc>,
}

impl MovieForm {
    pub fn from_movie(movie: &Movie) -> Self {
        MovieForm {
            duration: Some(movie.duration),
            title: Some(movie.title.clone()),
            description: Some(movie.description.clone()),
            director: Some(movie.director.clone()),
            publication_date: Some(format_datetime(&movie.publication_date)),
        }
    }

    pub fn merge(self, patch: MovieForm) -> Self {
        MovieForm {
            duration: patch.duration.or(self.duration),
            title: patch.title.or(self.title),
            description: patch.description.or(self.description),
            director: patch.director.or(self.director),
            publication_date: patch.publication_date.or(self.publication_date),
        }
    }

    pub fn into_data(self) -> Result<MovieData, HttpError> {
        let raw_date = required(self.publication_date, "publicationDate")?;
        Ok(MovieData {
            duration: required(self.duration, "duration")?,
            title: required(self.title, "title")?,
            description: required(self.description, "description")?,
            director: required(self.director, "director")?,
            publication_date: required(parse_datetime(&raw_date), "publicationDate")?,
        })
    }
}

// ============================================================================
// Review
// ============================================================================

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewForm {
    #[validate(
        required(message = "This value should not be blank."),
        length(min = 1, message = "This value should not be blank.")
    )]
    pub body: Option<String>,

    #[validate(required(message = "This value should not be blank."))]
    pub rating: Option<i64>,

    #[validate(
        required(message = "This value should not be blank."),
        custom(function = "validate_date")
    )]
    pub publication_date: Option<String>,

    /// User id; the handler fills in the caller when it is missing on create
    #[validate(required(message = "This value should not be blank."))]
    pub author: Option<i64>,

    /// Outer `None`: not sent. `Some(None)`: sent as null, clears the link.
    #[serde(default, deserialize_with = "nullable")]
    pub book: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub movie: Option<Option<i64>>,
}

#[derive(Debug, Clone)]
pub struct ReviewData {
    pub body: String,
    pub rating: i64,
    pub publication_date: NaiveDate,
    pub author_id: i64,
    pub book_id: Option<i64>,
    pub movie_id: Option<i64>,
}

impl ReviewForm {
    pub fn from_review(review: &Review) -> Self {
        ReviewForm {
            body: Some(review.body.clone()),
            rating: Some(review.rating),
            publication_date: Some(review.publication_date.format("%Y-%m-%d").to_string()),
            author: Some(review.author_id),
            book: Some(review.book_id),
            movie: Some(review.movie_id),
        }
    }

    pub fn merge(self, patch: ReviewForm) -> Self {
        ReviewForm {
            body: patch.body.or(self.body),
            rating: patch.rating.or(self.rating),
            publication_date: patch.publication_date.or(self.publication_date),
            author: patch.author.or(self.author),
            book: patch.book.or(self.book),
            movie: patch.movie.or(self.movie),
        }
    }

    pub fn into_data(self) -> Result<ReviewData, HttpError> {
        let raw_date = required(self.publication_date, "publicationDate")?;
        Ok(ReviewData {
            body: required(self.body, "body")?,
            rating: required(self.rating, "rating")?,
            publication_date: required(parse_date(&raw_date), "publicationDate")?,
            author_id: required(self.author, "author")?,
            book_id: self.book.flatten(),
            movie_id: self.movie.flatten(),
        })
    }
}

// ============================================================================
// User
// ============================================================================

#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserForm {
    #[validate(
        required(message = "This value should not be blank."),
        length(min = 1, message = "This value should not be blank.")
    )]
    pub full_name: Option<String>,

    #[validate(
        required(message = "This value should not be blank."),
        email(message = "This value is not a valid email address.")
    )]
    pub email: Option<String>,

    /// Write-only; hashed by the handler and then dropped
    pub plain_password: Option<String>,

    /// Replaces the whole set when present
    pub books: Option<Vec<i64>>,
    pub movies: Option<Vec<i64>>,
}

/// Validated user fields. `password` is already hashed.
#[derive(Debug, Clone)]
pub struct UserData {
    pub full_name: String,
    pub email: String,
    pub password: Option<String>,
    pub books: Option<Vec<i64>>,
    pub movies: Option<Vec<i64>>,
}

impl UserForm {
    /// The stored password is not part of the form: an update without
    /// `plainPassword` leaves it untouched.
    pub fn from_user(user: &User) -> Self {
        UserForm {
            full_name: Some(user.full_name.clone()),
            email: Some(user.email.clone()),
            plain_password: None,
            books: None,
            movies: None,
        }
    }

    pub fn merge(self, patch: UserForm) -> Self {
        UserForm {
            full_name: patch.full_name.or(self.full_name),
            email: patch.email.or(self.email),
            plain_password: patch.plain_password.or(self.plain_password),
            books: patch.books.or(self.books),
            movies: patch.movies.or(self.movies),
        }
    }

    pub fn into_data(self, password_hash: Option<String>) -> Result<UserData, HttpError> {
        Ok(UserData {
            full_name: required(self.full_name, "fullName")?,
            email: required(self.email, "email")?,
            password: password_hash,
            books: self.books,
            movies: self.movies,
        })
    }
}
