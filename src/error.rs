use std;
use std::convert::From;
use std::fmt;
use std::io;

use diesel;
use diesel::result::DatabaseErrorKind;
use openssl::error::ErrorStack;
use rocket_contrib::templates::handlebars::RenderError;

pub type DashResult<T> = std::result::Result<T, DashError>;

#[derive(Debug)]
pub enum DashError {
    Reqwest(reqwest::Error),
    Io(io::Error),
    Serde(serde_json::error::Error),
    SerdePath(serde_path_to_error::Error<serde_json::error::Error>),
    R2d2(diesel::r2d2::PoolError),
    DieselError(diesel::result::Error),
    /// A uniqueness constraint refused the write.
    Conflict(String),
    Template(RenderError),
    Toml(toml::de::Error),
    Url(url::ParseError),
    OpenSsl(ErrorStack),
    Misc(Option<String>),
}

impl DashError {
    pub fn is_conflict(&self) -> bool {
        match self {
            DashError::Conflict(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashError::Reqwest(e) => write!(f, "http client: {}", e),
            DashError::Io(e) => write!(f, "io: {}", e),
            DashError::Serde(e) => write!(f, "json: {}", e),
            DashError::SerdePath(e) => write!(f, "json at {}: {}", e.path(), e.inner()),
            DashError::R2d2(e) => write!(f, "connection pool: {}", e),
            DashError::DieselError(e) => write!(f, "database: {}", e),
            DashError::Conflict(what) => write!(f, "conflict: {}", what),
            DashError::Template(e) => write!(f, "template: {}", e),
            DashError::Toml(e) => write!(f, "toml: {}", e),
            DashError::Url(e) => write!(f, "url: {}", e),
            DashError::OpenSsl(e) => write!(f, "openssl: {}", e),
            DashError::Misc(Some(why)) => f.write_str(why),
            DashError::Misc(None) => f.write_str("miscellaneous error"),
        }
    }
}

impl From<reqwest::Error> for DashError {
    fn from(e: reqwest::Error) -> Self {
        DashError::Reqwest(e)
    }
}

impl From<io::Error> for DashError {
    fn from(e: io::Error) -> Self {
        DashError::Io(e)
    }
}

impl From<serde_json::error::Error> for DashError {
    fn from(e: serde_json::error::Error) -> Self {
        DashError::Serde(e)
    }
}

impl From<serde_path_to_error::Error<serde_json::error::Error>> for DashError {
    fn from(e: serde_path_to_error::Error<serde_json::error::Error>) -> Self {
        DashError::SerdePath(e)
    }
}

impl From<diesel::r2d2::PoolError> for DashError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        DashError::R2d2(e)
    }
}

impl From<diesel::result::Error> for DashError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DashError::Conflict(info.message().to_string())
            }
            e => DashError::DieselError(e),
        }
    }
}

impl From<RenderError> for DashError {
    fn from(e: RenderError) -> Self {
        DashError::Template(e)
    }
}

impl From<toml::de::Error> for DashError {
    fn from(e: toml::de::Error) -> Self {
        DashError::Toml(e)
    }
}

impl From<url::ParseError> for DashError {
    fn from(e: url::ParseError) -> Self {
        DashError::Url(e)
    }
}

impl From<ErrorStack> for DashError {
    fn from(e: ErrorStack) -> Self {
        DashError::OpenSsl(e)
    }
}
