//! Database target models.
//!
//! A [`DatabaseTarget`] identifies where generated SQL runs. It is built per
//! request from caller input and never persisted.

use crate::error::{PipelineResult, QueryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Includes MariaDB
    MySql,
    #[serde(rename = "postgresql")]
    Postgres,
}

impl Dialect {
    /// Get the display name for this dialect, as used in prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
        }
    }

    /// URL scheme used when building connection strings.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Dialect {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgresql" | "postgres" => Ok(Self::Postgres),
            _ => Err(QueryError::unsupported_dialect(s.trim())),
        }
    }
}

/// Where to run SQL: dialect plus credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub dialect: Dialect,
    /// Host name, optionally with an explicit `:port`
    pub host: String,
    pub user: String,
    /// Sensitive - never log
    pub password: String,
    pub database_name: String,
}

impl DatabaseTarget {
    /// Create a new target, validating the fields that end up in the connection string.
    pub fn new(
        dialect: Dialect,
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database_name: impl Into<String>,
    ) -> PipelineResult<Self> {
        let target = Self {
            dialect,
            host: host.into().trim().to_string(),
            user: user.into(),
            password: password.into(),
            database_name: database_name.into().trim().to_string(),
        };

        if target.host.is_empty() {
            return Err(QueryError::invalid_input("Database host cannot be empty"));
        }
        if target
            .host
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '@' | '?' | '#'))
        {
            return Err(QueryError::invalid_input(format!(
                "Database host contains invalid characters: {}",
                target.host
            )));
        }
        if target.user.is_empty() {
            return Err(QueryError::invalid_input("Database user cannot be empty"));
        }
        if target.database_name.is_empty() {
            return Err(QueryError::invalid_input("Database name cannot be empty"));
        }

        Ok(target)
    }

    /// Parse a target from a full database URL.
    ///
    /// ```
    /// use nl2sql_server::models::{DatabaseTarget, Dialect};
    ///
    /// let target = DatabaseTarget::from_url("postgres://app:s3cret@db:5433/shop").unwrap();
    /// assert_eq!(target.dialect, Dialect::Postgres);
    /// assert_eq!(target.host, "db:5433");
    /// assert_eq!(target.database_name, "shop");
    /// ```
    pub fn from_url(url: &str) -> PipelineResult<Self> {
        let parsed =
            Url::parse(url).map_err(|e| QueryError::invalid_input(format!("Invalid URL: {e}")))?;
        let dialect: Dialect = parsed.scheme().parse()?;

        let host = parsed
            .host_str()
            .ok_or_else(|| QueryError::invalid_input("Database URL has no host"))?;
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let database = parsed.path().trim_start_matches('/');

        Self::new(
            dialect,
            host,
            decode_component(parsed.username(), "user")?,
            decode_component(parsed.password().unwrap_or_default(), "password")?,
            decode_component(database, "database name")?,
        )
    }

    /// Build the connection string for this target.
    ///
    /// User name, password and database name are percent-encoded.
    pub fn connection_string(&self) -> PipelineResult<String> {
        let mut url = Url::parse(&format!("{}://{}", self.dialect.scheme(), self.host))
            .map_err(|e| QueryError::invalid_input(format!("Invalid database host: {e}")))?;

        url.set_username(&self.user)
            .map_err(|_| QueryError::invalid_input("Invalid database user"))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| QueryError::invalid_input("Invalid database password"))?;
        }
        url.set_path(&self.database_name);

        Ok(url.to_string())
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        format!(
            "{}://{}:****@{}/{}",
            self.dialect.scheme(),
            self.user,
            self.host,
            self.database_name
        )
    }
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database_name", &self.database_name)
            .finish()
    }
}

/// Decode `%XX` escapes in one URL component.
fn decode_component(raw: &str, part: &str) -> PipelineResult<String> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| {
            QueryError::invalid_input(format!(
                "Database URL {part} is not valid UTF-8 after percent-decoding"
            ))
        })
}
