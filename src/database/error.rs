use std::fmt::{self, Display};

use crate::error::{Error, HtmlError};

pub struct QueryError {
    code: u16,
    info: String,
    field: Option<String>,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            code: 500,
            info,
            field: None,
        }
    }
}

/// Maps the unique constraint names in `migrations/` to the payload field they guard.
const UNIQUE_FIELDS: &[(&str, &str, &str)] = &[
    ("users_email_key", "email", "A user with this email already exists."),
    ("users_username_key", "username", "A user with this username already exists."),
    ("tags_name_key", "name", "A tag with this name already exists."),
    ("tags_color_key", "color", "A tag with this color already exists."),
    ("tags_slug_key", "slug", "A tag with this slug already exists."),
    (
        "ingredients_name_unit_key",
        "name",
        "This ingredient already exists with the same measurement unit.",
    ),
];

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                if e.is_unique_violation() {
                    let constraint = e.constraint().unwrap_or_default();
                    return match UNIQUE_FIELDS.iter().find(|(name, ..)| *name == constraint) {
                        Some((_, field, info)) => Self {
                            code: 400,
                            info: info.to_string(),
                            field: Some(field.to_string()),
                        },
                        None => Self {
                            code: 400,
                            info: String::from("Object already exists"),
                            field: None,
                        },
                    };
                }
                if e.is_foreign_key_violation() {
                    return Self {
                        code: 400,
                        info: String::from("Object is referenced by other records"),
                        field: None,
                    };
                }
                if e.is_check_violation() {
                    return Self {
                        code: 400,
                        info: String::from("Value is out of range"),
                        field: None,
                    };
                }
                Self::new(format!("{e}"))
            }
            sqlx::Error::RowNotFound => Self {
                code: 404,
                info: String::from("Not found."),
                field: None,
            },
            sqlx::Error::PoolTimedOut => Self::new(String::from("Database pool timed out")),
            other => Self::new(other.to_string()),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        if value.code >= 500 {
            log::error!("Query failed: {}", value.info);
            return HtmlError::InternalServerError.default();
        }

        Error {
            code: value.code,
            info: Some(value.info),
            field: value.field,
        }
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        Error {
            code: 500,
            info: Some(value.info),
            field: None,
        }
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}
