use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed cache key '{encoded}' at byte {position}: {reason}")]
    MalformedKey {
        encoded:  String,
        position: usize,
        reason:   &'static str,
    },

    #[error("Truncated cache key '{encoded}': segment needs {expected} bytes, {available} left")]
    TruncatedKey {
        encoded:   String,
        expected:  usize,
        available: usize,
    },
}
