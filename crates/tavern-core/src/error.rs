use thiserror::Error;

/// A convenience `Result` alias using [`TavernError`].
pub type TavernResult<T> = Result<T, TavernError>;

/// Top-level error type shared by every Tavern crate.
///
/// Soft model failures (the backend ran but reported an error) are not
/// represented here: they are turned into displayable text by the
/// generation client.
#[derive(Error, Debug)]
pub enum TavernError {
    /// An unknown character or persona id, or an absent delete target.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity label, e.g. `"character"`.
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A persisted JSON file exists but could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// File read/write failure other than "does not exist".
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure or malformed response from the generation backend.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Caller-supplied input that cannot be used as-is (empty ids, path
    /// separators in a session key, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration parsing or validation failed.
    #[error("Config error: {0}")]
    Config(String),

    /// Serializing an in-memory value to JSON failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TavernError {
    /// Builds a [`TavernError::NotFound`] for the given entity kind.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns true for [`TavernError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
