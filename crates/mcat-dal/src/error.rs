use mcat_types::FieldErrors;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Edit conflict on record {id}, version {version} is no longer current")]
    EditConflict { id: i64, version: i64 },

    #[error("Validation failed: {0}")]
    ValidationFailed(FieldErrors),

    #[error("Database connection check timed out")]
    ConnectionTimeout,
}

impl From<FieldErrors> for Error {
    fn from(errors: FieldErrors) -> Self {
        Error::ValidationFailed(errors)
    }
}
