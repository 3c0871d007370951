//! Video inspection: duration probing and thumbnail frame extraction
//!
//! Both are collaborators of the ingestion controller. The ffmpeg-backed
//! implementation shells out to `ffprobe`/`ffmpeg`; the mock serves canned
//! frames and durations for tests.

pub mod ffmpeg;
pub mod mock;

pub use ffmpeg::FfmpegTools;
pub use mock::MockMediaTools;

use crate::models::MediaFile;
use crate::Result;
use async_trait::async_trait;
use image::ImageFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    Jpeg,
    Png,
    WebP,
}

impl ThumbnailFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "image/jpeg",
            ThumbnailFormat::Png => "image/png",
            ThumbnailFormat::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "jpeg",
            ThumbnailFormat::Png => "png",
            ThumbnailFormat::WebP => "webp",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            ThumbnailFormat::Jpeg => ImageFormat::Jpeg,
            ThumbnailFormat::Png => ImageFormat::Png,
            ThumbnailFormat::WebP => ImageFormat::WebP,
        }
    }
}

#[async_trait]
pub trait ThumbnailExtractor: Send + Sync {
    /// Encoded candidate frames in timeline order.
    async fn extract(
        &self,
        file: &MediaFile,
        count: usize,
        format: ThumbnailFormat,
    ) -> Result<Vec<Vec<u8>>>;
}

#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe_duration(&self, file: &MediaFile) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_format_metadata() {
        assert_eq!(ThumbnailFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(ThumbnailFormat::Jpeg.extension(), "jpeg");
        assert_eq!(ThumbnailFormat::WebP.image_format(), ImageFormat::WebP);
    }
}
