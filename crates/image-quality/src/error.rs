//! Error taxonomy for quality assessment

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing or running an assessment.
///
/// Degenerate metrics (a NaN edge ratio on a flat image, for instance) are not
/// errors: they are clamped to a neutral score where they are produced.
#[derive(Debug, Error)]
pub enum QualityError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Invalid quality settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to load image {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QualityError>;
