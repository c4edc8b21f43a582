use thiserror::Error;

/// The crate-wide error type. Every fallible operation in the workspace
/// that can't be handled locally bottoms out here, so the CLI has exactly
/// one place to map errors onto exit codes (see `Self::exit_code`).
#[derive(Debug, Error)]
pub enum EsiosError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error("cache is corrupt at {path}: {message}")]
    CacheCorruption { path: String, message: String },

    #[error("only part of the requested range could be retrieved: {message}")]
    PartialRange { message: String },

    #[error("invalid input: {0}")]
    UserInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EsiosError {
    pub fn transport(message: impl Into<String>, retryable: bool) -> Self {
        Self::Transport {
            message: message.into(),
            retryable,
        }
    }

    pub fn cache_corruption(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CacheCorruption {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { retryable: true, .. })
    }

    /// Process exit code for the CLI binary: `0` never reaches here (it's
    /// the success path), `1` is a generic failure, `2` marks input the
    /// user can fix without touching the cache or network.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UserInput(_) => 2,
            _ => 1,
        }
    }
}
