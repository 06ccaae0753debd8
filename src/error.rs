use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL (or DB_HOST/DB_PORT/DB_NAME/DB_USER/DB_PASSWORD) must be set unless --snapshot is used")]
    MissingDatabaseUrl,
    #[error("{name} must be an integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

/// Failures talking to the backing store. Fatal for the page being rendered.
#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("failed to connect to Postgres: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("query for {what} failed: {source}")]
    Query {
        what: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to read snapshot {path}: {source}")]
    SnapshotIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot {path} is not valid: {source}")]
    SnapshotFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Why an email could not be split into batch and branch codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEmail {
    #[error("email has no '@'")]
    MissingAt,
    #[error("local part has {0} characters, need at least 4")]
    ShortLocalPart(usize),
}

/// Anything that stops a page from rendering.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
    #[error("failed to shape rows for {section}: {source}")]
    Shape {
        section: String,
        #[source]
        source: serde_json::Error,
    },
}
