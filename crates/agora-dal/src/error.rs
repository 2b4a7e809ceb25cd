use sqlx::error::ErrorKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("User password error: {0}")]
    UserPasswordError(#[from] argon2::password_hash::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid order by field: {0}")]
    InvalidOrderByField(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("{0}")]
    InvalidOperation(String),
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Error::RecordNotFound("Record".to_string()),
            sqlx::Error::Database(ref db_error) => match db_error.kind() {
                ErrorKind::UniqueViolation => {
                    Error::AlreadyExists(format!("Record already exists: {}", db_error.message()))
                }
                ErrorKind::ForeignKeyViolation => {
                    Error::InvalidReference("Referenced record does not exist".to_string())
                }
                _ => Error::DatabaseError(value),
            },
            other => Error::DatabaseError(other),
        }
    }
}

impl Error {
    /// Replaces message of uniqueness violation with domain specific one
    pub(crate) fn on_conflict(self, msg: &str) -> Self {
        match self {
            Error::AlreadyExists(_) => Error::AlreadyExists(msg.to_string()),
            other => other,
        }
    }
}
