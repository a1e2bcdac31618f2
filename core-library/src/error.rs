use thiserror::Error;

/// SQLite primary result codes treated as transient.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl LibraryError {
    /// Connection-level failure worth one immediate retry.
    pub fn is_transient(&self) -> bool {
        let LibraryError::Database(err) = self else {
            return false;
        };

        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
            sqlx::Error::Database(db) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// A write referenced a row that does not exist.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            LibraryError::Database(err) => err
                .as_database_error()
                .map(|db| db.is_foreign_key_violation())
                .unwrap_or(false),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
