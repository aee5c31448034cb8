use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Construction refused: {0}")]
    ConstructionRefused(String),

    #[error("Step failed (code {code}): {message} [{sql}]")]
    Step {
        code: i32,
        message: String,
        sql: String,
    },

    #[error("Row is no longer valid (statement has been stepped or closed)")]
    InvalidRowAccess,

    #[error("Column index out of range: {index} (column count {column_count})")]
    ColumnIndexOutOfRange { index: usize, column_count: usize },

    #[error("Column name not found: {0}")]
    ColumnNameNotFound(String),

    #[error("This database connection is busy executing a query")]
    Busy,

    #[error("Bind error: {0}")]
    Bind(String),

    #[error("SQLite error (code {code}): {message}")]
    Engine { code: i32, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    pub fn refused(reason: impl Into<String>) -> Self {
        DbError::ConstructionRefused(reason.into())
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
