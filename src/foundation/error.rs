/// Result alias for the crate's fallible entry points.
pub type TesseraResult<T> = Result<T, TesseraError>;

/// Errors surfaced by the non-render entry points (construction, loading, export).
///
/// The render path itself never returns these to callers; they are logged and folded into
/// "nothing delivered" for the affected tile or pass.
#[derive(thiserror::Error, Debug)]
pub enum TesseraError {
    /// Invalid options or input description.
    #[error("validation error: {0}")]
    Validation(String),

    /// A drawable failed while drawing onto a tile.
    #[error("draw error: {0}")]
    Draw(String),

    /// The assembly stage could not produce an output raster.
    #[error("assembly error: {0}")]
    Assembly(String),

    /// Filesystem or encoder failure.
    #[error("io error: {0}")]
    Io(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Anything else, with its source chain preserved.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TesseraError {
    /// Build a [`TesseraError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TesseraError::Draw`].
    pub fn draw(msg: impl Into<String>) -> Self {
        Self::Draw(msg.into())
    }

    /// Build a [`TesseraError::Assembly`].
    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly(msg.into())
    }

    /// Build a [`TesseraError::Io`].
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Build a [`TesseraError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
