//! File validation rules
//!
//! Validation runs in two phases. [`validate`] performs the cheap checks
//! (format, image size) the moment a file arrives. A video's duration is only
//! known once it can be decoded, so [`check_duration`] runs later, after the
//! controller holds a local preview of it.

use crate::error::ValidationError;
use crate::models::{normalize_mime, MediaFile, MediaKind};
use std::collections::HashSet;

/// Upper bound for non-video files.
pub const MAX_IMAGE_BYTES: u64 = 15_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFile {
    pub mime_type: String,
    pub size_bytes: u64,
    pub kind: MediaKind,
}

pub fn validate(
    file: &MediaFile,
    accepted_mime_types: &HashSet<String>,
) -> Result<ValidatedFile, ValidationError> {
    let mime_type = normalize_mime(&file.mime_type);
    if !accepted_mime_types.contains(&mime_type) {
        return Err(ValidationError::UnsupportedFormat {
            mime_type: file.mime_type.clone(),
        });
    }

    let kind = MediaKind::from_mime(&mime_type);
    let size_bytes = file.size_bytes();
    if kind != MediaKind::Video && size_bytes > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge {
            size_bytes,
            limit_bytes: MAX_IMAGE_BYTES,
        });
    }

    Ok(ValidatedFile {
        mime_type,
        size_bytes,
        kind,
    })
}

pub fn check_duration(
    duration_secs: f64,
    max_duration_secs: Option<f64>,
) -> Result<(), ValidationError> {
    match max_duration_secs {
        Some(max_secs) if duration_secs > max_secs => Err(ValidationError::DurationExceeded {
            actual_secs: duration_secs,
            max_secs,
        }),
        _ => Ok(()),
    }
}
