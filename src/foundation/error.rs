pub type CardResult<T> = Result<T, CardError>;

/// Failure taxonomy shared by every pipeline stage.
///
/// `Fetch` and `Decode` are per-item failures: the lineup pipeline recovers from them by treating
/// the key as absent, while the glow pipeline has no fallback source and surfaces them.
#[derive(thiserror::Error, Debug)]
pub enum CardError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("asset missing: {0}")]
    AssetMissing(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CardError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn asset_missing(msg: impl Into<String>) -> Self {
        Self::AssetMissing(msg.into())
    }

    /// Whether the lineup pipeline may drop the affected key and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Decode(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
