/// Error type for the reversio crate.
///
/// Misuse of the engine (malformed shape names, unknown logical names, an
/// accessor used outside the run's transaction) panics rather than returning
/// a variant here; the migration driver traps those panics and converts them
/// into [`Error::Generic`] after rolling back.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[error("{0}")]
    Generic(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Self::Generic(value.to_string())
    }
}
