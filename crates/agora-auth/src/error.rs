use jsonwebtoken::errors::{Error as JwtError, ErrorKind};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),

    #[error("Token subject {0} is not a user id")]
    InvalidSubject(String),
}

impl Error {
    pub fn is_expired(&self) -> bool {
        match self {
            Error::JwtError(e) => matches!(e.kind(), ErrorKind::ExpiredSignature),
            Error::InvalidSubject(_) => false,
        }
    }
}
