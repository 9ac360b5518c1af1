use thiserror::Error;

/// Failures that can happen while building a session: loading config,
/// loading a timeline or importing a melody. The per-frame path never errors.
#[derive(Debug, Error)]
pub enum KaraokeError {
    #[error("Invalid engine config: {0}")]
    Config(#[source] serde_json::Error),

    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("Invalid timeline data: {0}")]
    Timeline(#[source] serde_json::Error),

    #[error("MusicXML import failed: {0}")]
    MusicXml(String),

    #[error("Timeline has no scoreable notes")]
    EmptyTimeline,
}

pub type Result<T> = std::result::Result<T, KaraokeError>;
