/// Result alias used across the crate.
pub type ReelResult<T> = Result<T, ReelError>;

/// Error type for configuration, media, rendering and access-endpoint failures.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid configuration or argument.
    #[error("validation error: {0}")]
    Validation(String),

    /// Image or video could not be loaded, probed or decoded.
    #[error("media error: {0}")]
    Media(String),

    /// Canvas/overlay rasterization failed.
    #[error("render error: {0}")]
    Render(String),

    /// The remote access endpoint could not be reached or answered unexpectedly.
    #[error("access error: {0}")]
    Access(String),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Context-wrapped error from IO or a dependency.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::Media`].
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Build a [`ReelError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`ReelError::Access`].
    pub fn access(msg: impl Into<String>) -> Self {
        Self::Access(msg.into())
    }

    /// Build a [`ReelError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for ReelError {
    fn from(e: serde_json::Error) -> Self {
        Self::serde(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ReelError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(ReelError::media("x").to_string().contains("media error:"));
        assert!(ReelError::render("x").to_string().contains("render error:"));
        assert!(ReelError::access("x").to_string().contains("access error:"));
        assert!(
            ReelError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ReelError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn json_errors_map_to_serde() {
        let err: ReelError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ReelError::Serde(_)));
    }
}
