//! Static per-entity configuration: where a resource is routed, how its
//! collection is keyed, which query fields filter it, who may write it and
//! which relation groups are serialized by default.

use crate::models::Role;

/// How a filter field compares against its column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// `column = value`
    Text,
    /// `column = value`, value must parse as an integer
    Integer,
    /// `left_datetime`/`right_datetime` day bounds on a date-time column
    DateTimeRange,
    /// `left_datetime`/`right_datetime` day bounds on a calendar date column
    DateRange,
    /// `column IN (<select> ?)`, the select ending in one bound text parameter
    InSubquery { select: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    /// Name used in the query string: `book_filter[<name>]`
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FilterKind,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterDescriptor {
    /// Query parameter prefix, e.g. `book_filter`
    pub form_name: &'static str,
    /// Table the listing and count queries read
    pub table: &'static str,
    pub fields: &'static [FilterField],
}

impl FilterDescriptor {
    pub fn field(&self, name: &str) -> Option<&FilterField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Who may perform one action on one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Open,
    Authenticated,
    Roles(&'static [Role]),
    RolesOrSelf(&'static [Role]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn to_str(&self) -> &str {
        match self {
            Action::Create => "can-create",
            Action::Update => "can-update",
            Action::Delete => "can-delete",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub create: Rule,
    pub update: Rule,
    pub delete: Rule,
}

impl Policy {
    pub fn rule(&self, action: Action) -> Rule {
        match action {
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceConfig {
    pub route: &'static str,
    /// Key wrapping the items of a collection response
    pub response_key: &'static str,
    pub filter: FilterDescriptor,
    pub policy: Policy,
    /// Every group this resource understands
    pub groups: &'static [&'static str],
    /// Groups serialized when the request does not ask for more
    pub default_groups: &'static [&'static str],
}

const MANAGERS: &[Role] = &[Role::Moderator, Role::Admin];
const ADMINS: &[Role] = &[Role::Admin];

pub const BOOKS: ResourceConfig = ResourceConfig {
    route: "/books",
    response_key: "books",
    filter: FilterDescriptor {
        form_name: "book_filter",
        table: "books",
        fields: &[
            FilterField {
                name: "isbn",
                column: "isbn",
                kind: FilterKind::Text,
            },
            FilterField {
                name: "title",
                column: "title",
                kind: FilterKind::Text,
            },
            FilterField {
                name: "author",
                column: "author",
                kind: FilterKind::Text,
            },
            FilterField {
                name: "publicationDate",
                column: "publication_date",
                kind: FilterKind::DateTimeRange,
            },
        ],
    },
    policy: Policy {
        create: Rule::Roles(MANAGERS),
        update: Rule::Roles(MANAGERS),
        delete: Rule::Authenticated,
    },
    groups: &["reviews", "readers"],
    default_groups: &["reviews"],
};

pub const MOVIES: ResourceConfig = ResourceConfig {
    route: "/movies",
    response_key: "movies",
    filter: FilterDescriptor {
        form_name: "movie_filter",
        table: "movies",
        fields: &[
            FilterField {
                name: "title",
                column: "title",
                kind: FilterKind::Text,
            },
            FilterField {
                name: "director",
                column: "director",
                kind: FilterKind::Text,
            },
            FilterField {
                name: "duration",
                column: "duration",
                kind: FilterKind::Integer,
            },
            FilterField {
                name: "publicationDate",
                column: "publication_date",
                kind: FilterKind::DateTimeRange,
            },
        ],
    },
    policy: Policy {
        create: Rule::Roles(MANAGERS),
        update: Rule::Roles(MANAGERS),
        delete: Rule::Roles(ADMINS),
    },
    groups: &["reviews", "audience"],
    default_groups: &["reviews"],
};

pub const REVIEWS: ResourceConfig = ResourceConfig {
    route: "/reviews",
    response_key: "reviews",
    filter: FilterDescriptor {
        form_name: "review_filter",
        table: "reviews",
        fields: &[
            FilterField {
                name: "body",
                column: "body",
                kind: FilterKind::Text,
            },
            FilterField {
                name: "rating",
                column: "rating",
                kind: FilterKind::Integer,
            },
            FilterField {
                name: "publicationDate",
                column: "publication_date",
                kind: FilterKind::DateRange,
            },
        ],
    },
    policy: Policy {
        create: Rule::Authenticated,
        update: Rule::Authenticated,
        delete: Rule::Authenticated,
    },
    groups: &["books", "movies"],
    default_groups: &[],
};

pub const USERS: ResourceConfig = ResourceConfig {
    route: "/users",
    response_key: "users",
    filter: FilterDescriptor {
        form_name: "user_filter",
        table: "users",
        fields: &[
            FilterField {
                name: "email",
                column: "email",
                kind: FilterKind::Text,
            },
            // users who watched a movie with exactly this title
            FilterField {
                name: "movies",
                column: "id",
                kind: FilterKind::InSubquery {
                    select: "SELECT um.user_id FROM user_movies um JOIN movies m ON m.id = um.movie_id WHERE m.title = ",
                },
            },
        ],
    },
    policy: Policy {
        create: Rule::Open,
        update: Rule::RolesOrSelf(MANAGERS),
        delete: Rule::RolesOrSelf(MANAGERS),
    },
    groups: &["books", "movies", "reviews"],
    default_groups: &[],
};
