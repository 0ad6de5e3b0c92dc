use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error as ThisError;
use warp::{http::StatusCode, reject::Reject};

pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_FOUND: &str = "Not found.";
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Error returned from every fallible operation of the service. Converts into a
/// `warp::Rejection` as any `Reject` type does and is rendered by
/// `api::reply::handle_rejection`.
#[derive(Debug, Clone, ThisError)]
#[error("{code} ({})", .info.as_deref().unwrap_or("no details"))]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
    pub fields: Option<FieldErrors>,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn body(&self) -> Value {
        match &self.fields {
            Some(fields) => json!(fields),
            None => json!({ "detail": self.info.as_deref().unwrap_or("") }),
        }
    }

    /// Single field error with status 400
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        errors.into()
    }
}

impl Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    Unauthorized,
    InvalidSession,
    Forbidden,
    NotFound,
    InternalServerError,
}

impl HtmlError {
    pub fn code(&self) -> u16 {
        match self {
            HtmlError::InvalidRequest => 400,
            HtmlError::Unauthorized => 401,
            HtmlError::InvalidSession => 401,
            HtmlError::Forbidden => 403,
            HtmlError::NotFound => 404,
            HtmlError::InternalServerError => 500,
        }
    }

    pub fn new(&self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
            fields: None,
        }
    }

    pub fn default(&self) -> Error {
        let info = match self {
            HtmlError::InvalidRequest => "Invalid request.",
            HtmlError::Unauthorized => "Authentication credentials were not provided.",
            HtmlError::InvalidSession => "Invalid token.",
            HtmlError::Forbidden => "You do not have permission to perform this action.",
            HtmlError::NotFound => NOT_FOUND,
            HtmlError::InternalServerError => "Internal server error.",
        };

        self.new(info)
    }
}

/// Field keyed validation messages, collected before failing a request.
#[derive(Debug, Default, Clone)]
pub struct ValidationErrors {
    inner: FieldErrors,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.inner
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.inner.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Records the error of `result` under `field` and returns the value on success
    pub fn check<T>(&mut self, field: &str, result: Result<T, TypeError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.add(field, &e.info);
                None
            }
        }
    }

    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        Err(self.into())
    }
}

impl From<ValidationErrors> for Error {
    fn from(value: ValidationErrors) -> Self {
        Error {
            code: 400,
            info: None,
            fields: Some(value.inner),
        }
    }
}

#[derive(Debug)]
pub struct QueryError {
    code: u16,
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { code: 500, info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) if e.is_unique_violation() => Self {
                code: 400,
                info: format!("Unique constraint violated: {}", e.constraint().unwrap_or("-")),
            },
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => Self {
                code: 400,
                info: format!("Referenced row does not exist: {}", e.constraint().unwrap_or("-")),
            },
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self {
                code: 404,
                info: NOT_FOUND.to_string(),
            },
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::AnyDriverError(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(String::from("Unknown error")),
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
            fields: None,
        }
    }
}

#[derive(Debug, ThisError)]
#[error("{info}")]
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

impl CacheError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        log::error!("Cache failed: {}", value.info);
        HtmlError::InternalServerError.default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("({info})")]
pub struct TypeError {
    pub info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }

    pub fn required() -> Self {
        Self::new(REQUIRED)
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_render_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("tags", REQUIRED);
        errors.add("tags", "Tags must be unique.");
        errors.add("name", REQUIRED);

        let error: Error = errors.into();
        assert_eq!(error.code, 400);
        assert_eq!(
            error.body(),
            json!({ "name": [REQUIRED], "tags": [REQUIRED, "Tags must be unique."] })
        );
    }

    #[test]
    fn empty_validation_passes() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn check_collects_type_errors() {
        let mut errors = ValidationErrors::new();
        let value: Option<i32> = errors.check("cooking_time", Err(TypeError::required()));

        assert!(value.is_none());
        assert!(errors.contains("cooking_time"));
    }

    #[test]
    fn html_errors_carry_detail() {
        let error = HtmlError::Forbidden.default();
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            error.body(),
            json!({ "detail": "You do not have permission to perform this action." })
        );
    }

    #[test]
    fn internal_query_errors_are_masked() {
        let error: Error = QueryError::new(String::from("connection refused")).into();
        assert_eq!(error.code, 500);
        assert_eq!(error.info.as_deref(), Some("Internal server error."));
    }

    #[test]
    fn errors_survive_rejection() {
        let rejection: warp::Rejection = HtmlError::NotFound.default().into();
        let error = rejection.find::<Error>().unwrap();

        assert_eq!(error.code, 404);
        assert_eq!(error.info.as_deref(), Some(NOT_FOUND));
    }
}
