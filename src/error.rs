//! Error handling and custom error types
//!
//! Infrastructure failures share one crate-level [`Error`]. The ingestion
//! pipeline reports through its own taxonomy: [`ValidationError`] for rule
//! checks, [`PublishError`] for the content store, and the two severities the
//! controller surfaces, fatal [`IngestError`] and degraded [`IngestWarning`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Media tool error: {0}")]
    Media(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Rule violations detected by the validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unsupported MIME type: {mime_type}")]
    UnsupportedFormat { mime_type: String },

    #[error("file is {size_bytes} bytes, limit is {limit_bytes}")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("video runs {actual_secs:.1}s, limit is {max_secs}s")]
    DurationExceeded { actual_secs: f64, max_secs: f64 },
}

/// Failures talking to the content-addressed store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("store returned no content identifier: {0}")]
    EmptyResponse(String),
}

/// Fatal errors: the cycle is unwound and the caller is told once.
///
/// `Display` is the user-facing message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("Invalid file format.")]
    UnsupportedFormat { mime_type: String },

    #[error("Images must be less than 15MB")]
    TooLarge { size_bytes: u64 },

    #[error("Videos must be less than {max_secs} seconds")]
    DurationExceeded { actual_secs: f64, max_secs: f64 },

    #[error("Invalid video. Please select a video file.")]
    InvalidVideo(String),

    #[error("Error uploading to IPFS")]
    PublishFailed(PublishError),

    #[error("an unknown error occurred. Please try again later")]
    Unexpected(String),
}

impl IngestError {
    /// Internal detail for logs, beyond the user-facing message.
    pub fn detail(&self) -> String {
        match self {
            IngestError::NoFileSelected => "no file supplied".to_string(),
            IngestError::UnsupportedFormat { mime_type } => {
                format!("mime type {} not accepted", mime_type)
            }
            IngestError::TooLarge { size_bytes } => format!("{} bytes", size_bytes),
            IngestError::DurationExceeded {
                actual_secs,
                max_secs,
            } => format!("{:.1}s > {}s", actual_secs, max_secs),
            IngestError::InvalidVideo(reason) | IngestError::Unexpected(reason) => reason.clone(),
            IngestError::PublishFailed(e) => e.to_string(),
        }
    }
}

impl From<ValidationError> for IngestError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnsupportedFormat { mime_type } => {
                IngestError::UnsupportedFormat { mime_type }
            }
            ValidationError::TooLarge { size_bytes, .. } => IngestError::TooLarge { size_bytes },
            ValidationError::DurationExceeded {
                actual_secs,
                max_secs,
            } => IngestError::DurationExceeded {
                actual_secs,
                max_secs,
            },
        }
    }
}

/// Non-fatal problems: recovered locally, the cycle carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestWarning {
    #[error("Thumbnail upload failed")]
    ThumbnailPublishFailed(PublishError),
}
