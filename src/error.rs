use serde_json::{json, Value};
use warp::http::StatusCode;

/// Error carried through every action and filter; rendered as JSON by the api layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {}", self.info.as_deref().unwrap_or("-"))]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
    pub field: Option<String>,
}

impl Error {
    /// Validation error attached to a single payload field.
    pub fn field(field: &str, info: &str) -> Self {
        Self {
            code: 400,
            info: Some(info.to_string()),
            field: Some(field.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn body(&self) -> Value {
        let info = self
            .info
            .clone()
            .unwrap_or_else(|| HtmlError::from_code(self.code).message().to_string());

        match (&self.field, self.code) {
            (Some(field), _) => {
                let mut map = serde_json::Map::new();
                map.insert(field.to_owned(), json!([info]));
                Value::Object(map)
            }
            (None, 400) => json!({ "errors": info }),
            (None, _) => json!({ "detail": info }),
        }
    }
}

impl warp::reject::Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    InvalidSession,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl HtmlError {
    pub fn code(self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::InvalidSession | HtmlError::Unauthorized => 401,
            HtmlError::Forbidden => 403,
            HtmlError::NotFound => 404,
            HtmlError::MethodNotAllowed => 405,
            HtmlError::InternalServerError => 500,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            HtmlError::InvalidRequest => "Invalid request",
            HtmlError::InvalidSession => "Invalid token",
            HtmlError::Unauthorized => "Authentication credentials were not provided.",
            HtmlError::Forbidden => "You do not have permission to perform this action.",
            HtmlError::NotFound => "Not found.",
            HtmlError::MethodNotAllowed => "Method not allowed.",
            HtmlError::InternalServerError => "Internal server error",
        }
    }

    fn from_code(code: u16) -> Self {
        match code {
            400 => HtmlError::InvalidRequest,
            401 => HtmlError::Unauthorized,
            403 => HtmlError::Forbidden,
            404 => HtmlError::NotFound,
            405 => HtmlError::MethodNotAllowed,
            _ => HtmlError::InternalServerError,
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
            field: None,
        }
    }

    pub fn default(self) -> Error {
        Error {
            code: self.code(),
            info: None,
            field: None,
        }
    }
}
