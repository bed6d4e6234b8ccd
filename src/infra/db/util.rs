use sqlx::error::DatabaseError;

use crate::application::repos::RepoError;

/// SQLSTATE classes the repositories distinguish.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const QUERY_CANCELED: &str = "57014";
const INTEGRITY_CLASS: &str = "23";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => map_database_error(db.as_ref()),
        other => RepoError::from_persistence(other),
    }
}

fn map_database_error(db: &dyn DatabaseError) -> RepoError {
    let code = db.code().unwrap_or_default();
    let message = db.message().to_string();

    match code.as_ref() {
        UNIQUE_VIOLATION => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        FOREIGN_KEY_VIOLATION | INVALID_TEXT_REPRESENTATION => {
            RepoError::InvalidInput { message }
        }
        QUERY_CANCELED => RepoError::Timeout,
        code if code.starts_with(INTEGRITY_CLASS) => RepoError::Integrity { message },
        _ => RepoError::Persistence(message),
    }
}
