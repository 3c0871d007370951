//! Data models and structures
//!
//! Defines the media file handed to the pipeline, the content references it
//! produces, and the environment-driven configuration.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

pub const DEFAULT_PINATA_ENDPOINT: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";
pub const DEFAULT_GATEWAY_URL: &str = "https://ipfs.cork.wtf/ipfs";

const DEFAULT_ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "video/mp4",
    "video/quicktime",
    "video/webm",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// MIME types compare case-insensitively; both sides go through here.
pub fn normalize_mime(mime_type: &str) -> String {
    mime_type.trim().to_ascii_lowercase()
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.contains("video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// A user-selected file. The MIME type is whatever the file reports about
/// itself; nothing here inspects the bytes.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub async fn from_path(path: &Path, mime_type: &str) -> crate::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(name, mime_type, data))
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A binary payload headed for the content store.
#[derive(Debug, Clone)]
pub struct Blob {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl Blob {
    pub fn from_file(file: &MediaFile) -> Self {
        Self {
            file_name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            data: file.data.clone(),
        }
    }
}

/// Dereferenceable reference to published content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub cid: String,
    pub uri: String,
}

impl ContentRef {
    pub fn new(gateway_base_url: &str, cid: &str) -> Self {
        Self {
            cid: cid.to_string(),
            uri: format!("{}/{}", gateway_base_url.trim_end_matches('/'), cid),
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Rules fixed for the lifetime of a controller.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub accepted_mime_types: HashSet<String>,
    pub max_duration_secs: Option<f64>,
}

impl IngestConfig {
    pub fn new<I, S>(accepted_mime_types: I, max_duration_secs: Option<f64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted_mime_types: accepted_mime_types
                .into_iter()
                .map(|mime_type| {
                    let mime_type: String = mime_type.into();
                    normalize_mime(&mime_type)
                })
                .collect(),
            max_duration_secs,
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub pinata_jwt: Option<String>,
    pub pinata_endpoint: String,
    pub gateway_url: String,
    pub accepted_mime_types: Vec<String>,
    pub max_duration_secs: Option<f64>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub publish_timeout_secs: u64,
    pub dry_run: bool,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let dry_run = std::env::var("DRY_RUN")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let pinata_jwt = std::env::var("PINATA_JWT")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if pinata_jwt.is_none() && !dry_run {
            return Err(crate::Error::Config("PINATA_JWT not set".to_string()));
        }

        let accepted_mime_types = std::env::var("ACCEPTED_MIME_TYPES")
            .map(|v| parse_mime_list(&v))
            .unwrap_or_else(|_| default_mime_types());

        let max_duration_secs = match std::env::var("MAX_VIDEO_DURATION_SECS") {
            Ok(v) => parse_max_duration(&v)?,
            Err(_) => None,
        };

        let publish_timeout_secs = match std::env::var("PUBLISH_TIMEOUT_SECS") {
            Ok(v) => v.trim().parse().map_err(|_| {
                crate::Error::Config(format!("Invalid PUBLISH_TIMEOUT_SECS: {}", v))
            })?,
            Err(_) => 60,
        };

        Ok(Self {
            pinata_jwt,
            pinata_endpoint: std::env::var("PINATA_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_PINATA_ENDPOINT.to_string()),
            gateway_url: std::env::var("IPFS_GATEWAY_URL")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string()),
            accepted_mime_types,
            max_duration_secs,
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            publish_timeout_secs,
            dry_run,
        })
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig::new(self.accepted_mime_types.clone(), self.max_duration_secs)
    }
}

fn default_mime_types() -> Vec<String> {
    DEFAULT_ACCEPTED_MIME_TYPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_mime_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(normalize_mime)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Empty or zero means no limit.
fn parse_max_duration(value: &str) -> crate::Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let secs: f64 = value
        .parse()
        .map_err(|_| crate::Error::Config(format!("Invalid MAX_VIDEO_DURATION_SECS: {}", value)))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(crate::Error::Config(format!(
            "Invalid MAX_VIDEO_DURATION_SECS: {}",
            value
        )));
    }
    Ok((secs > 0.0).then_some(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("video/quicktime"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime(""), MediaKind::Image);
    }

    #[test]
    fn test_content_ref_joins_gateway() {
        let r = ContentRef::new("https://ipfs.cork.wtf/ipfs/", "QmHash");
        assert_eq!(r.uri, "https://ipfs.cork.wtf/ipfs/QmHash");
        assert_eq!(r.to_string(), r.uri);
        assert_eq!(r.cid, "QmHash");
    }

    #[test]
    fn test_ingest_config_normalizes_accepted_types() {
        let config = IngestConfig::new([" Image/PNG ", "video/mp4"], None);
        assert!(config.accepted_mime_types.contains("image/png"));
        assert!(config.accepted_mime_types.contains("video/mp4"));
        assert_eq!(config.accepted_mime_types.len(), 2);
    }

    #[test]
    fn test_media_kind_serialization() {
        let json = serde_json::to_string(&MediaKind::Video).unwrap();
        assert_eq!(json, "\"video\"");
    }

    #[test]
    fn test_parse_mime_list() {
        assert_eq!(
            parse_mime_list(" image/PNG, video/mp4 ,,"),
            vec!["image/png".to_string(), "video/mp4".to_string()]
        );
    }

    #[test]
    fn test_parse_max_duration() {
        assert_eq!(parse_max_duration("30").unwrap(), Some(30.0));
        assert_eq!(parse_max_duration("0").unwrap(), None);
        assert_eq!(parse_max_duration("  ").unwrap(), None);
        assert!(parse_max_duration("-5").is_err());
        assert!(parse_max_duration("soon").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_ingest_config_from_config() {
        let config = Config {
            pinata_jwt: None,
            pinata_endpoint: DEFAULT_PINATA_ENDPOINT.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            accepted_mime_types: vec!["image/png".to_string()],
            max_duration_secs: Some(30.0),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            publish_timeout_secs: 60,
            dry_run: true,
        };

        let ingest = config.ingest_config();
        assert!(ingest.accepted_mime_types.contains("image/png"));
        assert_eq!(ingest.accepted_mime_types.len(), 1);
        assert_eq!(ingest.max_duration_secs, Some(30.0));
    }
}
