//! Query-string filtering and pagination.
//!
//! `GET /books?book_filter[isbn]=978...&page=2&limit=5` becomes a
//! [`ListQuery`]: a validated page request plus a list of conjunctive
//! predicates that the repository layer pushes onto a `QueryBuilder`.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use validator::Validate;

use crate::{
    dtos::PaginationDto,
    error::{ErrorMessage, FieldErrors, HttpError},
    forms::collect_field_errors,
    resource::{FilterKind, ResourceConfig},
    serializer::Groups,
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals {
        column: &'static str,
        value: FilterValue,
    },
    AtLeast {
        column: &'static str,
        value: FilterValue,
    },
    Before {
        column: &'static str,
        value: FilterValue,
    },
    InSubquery {
        column: &'static str,
        select: &'static str,
        value: FilterValue,
    },
}

/// Generic pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct PageRequest {
    #[validate(range(min = 1, message = "This value should be 1 or more."))]
    pub page: i64,

    #[validate(range(min = 1, max = 100, message = "This value should be between 1 and 100."))]
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        ((total + self.limit - 1) / self.limit).max(1)
    }

    /// Metadata for a slice of `total` items, or 404 if the page lies past
    /// the last one.
    pub fn pagination(&self, total: i64) -> Result<PaginationDto, HttpError> {
        let total_pages = self.total_pages(total);
        if self.page > total_pages {
            return Err(HttpError::not_found());
        }
        Ok(PaginationDto {
            current_page: self.page,
            items_per_page: self.limit,
            total_items: total,
            total_pages,
        })
    }
}

/// Everything a list endpoint reads from its query string
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: PageRequest,
    pub predicates: Vec<Predicate>,
    pub groups: Groups,
}

impl ListQuery {
    pub fn from_params(
        params: &HashMap<String, String>,
        config: &ResourceConfig,
    ) -> Result<Self, HttpError> {
        let mut errors = FieldErrors::new();

        let page = PageRequest {
            page: parse_number(params, "page", DEFAULT_PAGE, &mut errors),
            limit: parse_number(params, "limit", DEFAULT_LIMIT, &mut errors),
        };
        if errors.is_empty() {
            if let Err(e) = page.validate() {
                collect_field_errors(&e, &mut errors);
            }
        }

        let predicates = parse_filters(params, config, &mut errors);

        if !errors.is_empty() {
            tracing::debug!(resource = config.route, ?errors, "rejected list query");
            return Err(HttpError::form_invalid(errors));
        }

        Ok(ListQuery {
            page,
            predicates,
            groups: Groups::from_params(params, config),
        })
    }
}

fn parse_number(
    params: &HashMap<String, String>,
    name: &str,
    default: i64,
    errors: &mut FieldErrors,
) -> i64 {
    match params.get(name).map(|raw| raw.trim()) {
        None | Some("") => default,
        Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
            errors
                .entry(name.to_string())
                .or_default()
                .push(ErrorMessage::InvalidValue.to_string());
            default
        }),
    }
}

/// Split `book_filter[publicationDate][left_datetime]` into
/// `("publicationDate", Some("left_datetime"))`.
fn split_filter_key<'a>(key: &'a str, form_name: &str) -> Option<(&'a str, Option<&'a str>)> {
    let inner = key
        .strip_prefix(form_name)?
        .strip_prefix('[')?
        .strip_suffix(']')?;
    let mut segments = inner.split("][");
    let field = segments.next().filter(|field| !field.is_empty())?;
    let sub = segments.next();
    if segments.next().is_some() {
        return None;
    }
    Some((field, sub))
}

fn parse_filters(
    params: &HashMap<String, String>,
    config: &ResourceConfig,
    errors: &mut FieldErrors,
) -> Vec<Predicate> {
    let descriptor = &config.filter;

    // sorted so the generated SQL is stable across requests
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();

    let mut predicates = Vec::new();
    for key in keys {
        let Some((name, sub)) = split_filter_key(key, descriptor.form_name) else {
            continue;
        };
        let Some(field) = descriptor.field(name) else {
            continue;
        };
        let raw = params[key].trim();
        if raw.is_empty() {
            continue;
        }

        let mut invalid = || {
            errors
                .entry(key.clone())
                .or_default()
                .push(ErrorMessage::InvalidValue.to_string());
        };

        match field.kind {
            FilterKind::Text => predicates.push(Predicate::Equals {
                column: field.column,
                value: FilterValue::Text(raw.to_string()),
            }),
            FilterKind::Integer => match raw.parse::<i64>() {
                Ok(number) => predicates.push(Predicate::Equals {
                    column: field.column,
                    value: FilterValue::Integer(number),
                }),
                Err(_) => invalid(),
            },
            FilterKind::InSubquery { select } => predicates.push(Predicate::InSubquery {
                column: field.column,
                select,
                value: FilterValue::Text(raw.to_string()),
            }),
            FilterKind::DateTimeRange | FilterKind::DateRange => {
                let Some(day) = parse_day(raw) else {
                    invalid();
                    continue;
                };
                let Some(next_day) = day.checked_add_days(Days::new(1)) else {
                    invalid();
                    continue;
                };
                let bound = |date: NaiveDate| match field.kind {
                    FilterKind::DateRange => FilterValue::Date(date),
                    _ => FilterValue::DateTime(date.and_time(NaiveTime::MIN).and_utc()),
                };
                let lower = Predicate::AtLeast {
                    column: field.column,
                    value: bound(day),
                };
                let upper = Predicate::Before {
                    column: field.column,
                    value: bound(next_day),
                };
                match sub {
                    Some("left_datetime") | Some("left_date") => predicates.push(lower),
                    Some("right_datetime") | Some("right_date") => predicates.push(upper),
                    None => {
                        predicates.push(lower);
                        predicates.push(upper);
                    }
                    Some(_) => continue,
                }
            }
        }
    }
    predicates
}

/// `YYYY-MM-DD`, or an RFC 3339 timestamp reduced to its UTC day
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &FilterValue) {
    match value.clone() {
        FilterValue::Text(text) => {
            builder.push_bind(text);
        }
        FilterValue::Integer(number) => {
            builder.push_bind(number);
        }
        FilterValue::DateTime(datetime) => {
            builder.push_bind(datetime);
        }
        FilterValue::Date(date) => {
            builder.push_bind(date);
        }
    }
}

/// Append ` AND <predicate>` for each predicate. The builder must already
/// end inside a `WHERE` clause.
pub fn push_predicates(builder: &mut QueryBuilder<'_, Sqlite>, predicates: &[Predicate]) {
    for predicate in predicates {
        builder.push(" AND ");
        match predicate {
            Predicate::Equals { column, value } => {
                builder.push(*column).push(" = ");
                push_value(builder, value);
            }
            Predicate::AtLeast { column, value } => {
                builder.push(*column).push(" >= ");
                push_value(builder, value);
            }
            Predicate::Before { column, value } => {
                builder.push(*column).push(" < ");
                push_value(builder, value);
            }
            Predicate::InSubquery {
                column,
                select,
                value,
            } => {
                builder.push(*column).push(" IN (").push(*select);
                push_value(builder, value);
                builder.push(")");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{BOOKS, MOVIES, REVIEWS, USERS};
    use axum::http::StatusCode;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_first_page_of_ten() {
        let query = ListQuery::from_params(&HashMap::new(), &BOOKS).unwrap();
        assert_eq!(query.page, PageRequest { page: 1, limit: 10 });
        assert!(query.predicates.is_empty());
        assert_eq!(query.page.offset(), 0);
    }

    #[test]
    fn rejects_non_numeric_and_out_of_range_pages() {
        let err = ListQuery::from_params(&params(&[("page", "abc")]), &BOOKS).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.errors.unwrap().contains_key("page"));

        let err = ListQuery::from_params(&params(&[("limit", "0")]), &BOOKS).unwrap_err();
        assert!(err.errors.unwrap().contains_key("limit"));

        let err = ListQuery::from_params(&params(&[("limit", "1000")]), &BOOKS).unwrap_err();
        assert!(err.errors.unwrap().contains_key("limit"));
    }

    #[test]
    fn text_filter_becomes_equality() {
        let query =
            ListQuery::from_params(&params(&[("book_filter[isbn]", "978-3")]), &BOOKS).unwrap();
        assert_eq!(
            query.predicates,
            vec![Predicate::Equals {
                column: "isbn",
                value: FilterValue::Text("978-3".to_string()),
            }]
        );
    }

    #[test]
    fn foreign_unknown_and_empty_filters_are_ignored() {
        let query = ListQuery::from_params(
            &params(&[
                ("movie_filter[title]", "Heat"),
                ("book_filter[unknown]", "x"),
                ("book_filter[title]", "  "),
            ]),
            &BOOKS,
        )
        .unwrap();
        assert!(query.predicates.is_empty());
    }

    #[test]
    fn integer_filter_must_parse() {
        let query =
            ListQuery::from_params(&params(&[("review_filter[rating]", "5")]), &REVIEWS).unwrap();
        assert_eq!(
            query.predicates,
            vec![Predicate::Equals {
                column: "rating",
                value: FilterValue::Integer(5),
            }]
        );

        let err = ListQuery::from_params(&params(&[("movie_filter[duration]", "long")]), &MOVIES)
            .unwrap_err();
        assert!(err.errors.unwrap().contains_key("movie_filter[duration]"));
    }

    #[test]
    fn date_range_bounds_cover_whole_days() {
        let query = ListQuery::from_params(
            &params(&[
                ("review_filter[publicationDate][left_datetime]", "2018-06-01"),
                ("review_filter[publicationDate][right_datetime]", "2018-06-30"),
            ]),
            &REVIEWS,
        )
        .unwrap();
        assert_eq!(
            query.predicates,
            vec![
                Predicate::AtLeast {
                    column: "publication_date",
                    value: FilterValue::Date(NaiveDate::from_ymd_opt(2018, 6, 1).unwrap()),
                },
                Predicate::Before {
                    column: "publication_date",
                    value: FilterValue::Date(NaiveDate::from_ymd_opt(2018, 7, 1).unwrap()),
                },
            ]
        );
    }

    #[test]
    fn datetime_range_binds_utc_midnight() {
        let query = ListQuery::from_params(
            &params(&[("book_filter[publicationDate][left_datetime]", "2000-09-04")]),
            &BOOKS,
        )
        .unwrap();
        let expected = NaiveDate::from_ymd_opt(2000, 9, 4)
            .unwrap()
            .and_time(NaiveTime::MIN)
            .and_utc();
        assert_eq!(
            query.predicates,
            vec![Predicate::AtLeast {
                column: "publication_date",
                value: FilterValue::DateTime(expected),
            }]
        );

        let err = ListQuery::from_params(
            &params(&[("book_filter[publicationDate][left_datetime]", "yesterday")]),
            &BOOKS,
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn user_movie_filter_uses_subquery() {
        let query =
            ListQuery::from_params(&params(&[("user_filter[movies]", "Heat")]), &USERS).unwrap();
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE 1 = 1");
        push_predicates(&mut builder, &query.predicates);
        let sql = builder.sql();
        assert!(sql.contains(" AND id IN (SELECT um.user_id FROM user_movies"));
        assert!(sql.ends_with("m.title = ?)"));
    }

    #[test]
    fn split_filter_key_handles_nesting() {
        assert_eq!(
            split_filter_key("book_filter[isbn]", "book_filter"),
            Some(("isbn", None))
        );
        assert_eq!(
            split_filter_key("book_filter[publicationDate][left_datetime]", "book_filter"),
            Some(("publicationDate", Some("left_datetime")))
        );
        assert_eq!(split_filter_key("book_filter", "book_filter"), None);
        assert_eq!(split_filter_key("book_filterx[isbn]", "book_filter"), None);
    }

    #[test]
    fn pagination_metadata_and_out_of_range_pages() {
        let page = PageRequest { page: 2, limit: 10 };
        let meta = page.pagination(15).unwrap();
        assert_eq!(meta.total_pages, 2);
        assert_eq!(meta.total_items, 15);
        assert_eq!(page.offset(), 10);

        assert_eq!(PageRequest::default().pagination(0).unwrap().total_pages, 1);

        let err = PageRequest { page: 3, limit: 10 }.pagination(15).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn parse_day_accepts_dates_and_timestamps() {
        let day = NaiveDate::from_ymd_opt(2000, 9, 4).unwrap();
        assert_eq!(parse_day("2000-09-04"), Some(day));
        assert_eq!(parse_day("2000-09-04T17:58:04+00:00"), Some(day));
        assert_eq!(parse_day("04/09/2000"), None);
    }
}
