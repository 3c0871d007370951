use super::{DurationProbe, ThumbnailExtractor, ThumbnailFormat};
use crate::models::MediaFile;
use crate::{Error, Result};
use async_trait::async_trait;
use image::ImageFormat;
use serde::Deserialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;

/// Probes and samples video through the `ffprobe`/`ffmpeg` binaries.
///
/// Input bytes are staged into a scratch directory that is removed when the
/// call returns.
pub struct FfmpegTools {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FfmpegTools {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    async fn stage(file: &MediaFile) -> Result<(TempDir, PathBuf)> {
        let dir = TempDir::new()?;
        let extension = Path::new(&file.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin");
        let path = dir.path().join(format!("input.{}", extension));
        tokio::fs::write(&path, &file.data).await?;
        Ok((dir, path))
    }

    fn tool_error(tool: &Path, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Media(format!("{} not found", tool.display()))
        } else {
            Error::Io(e)
        }
    }

    fn parse_probe_output(output: &str) -> Result<f64> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output)
            .map_err(|e| Error::Media(format!("Failed to parse ffprobe output: {}", e)))?;

        let duration = probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| Error::Media("ffprobe reported no usable duration".to_string()))?;

        Ok(duration)
    }

    async fn probe_path(&self, path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .await
            .map_err(|e| Self::tool_error(&self.ffprobe_path, e))?;

        if !output.status.success() {
            return Err(Error::Media(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Self::parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn frame_timestamps(duration_secs: f64, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| duration_secs * i as f64 / count as f64)
            .collect()
    }

    async fn grab_frame(&self, input: &Path, at_secs: f64) -> Result<Vec<u8>> {
        let output = Command::new(&self.ffmpeg_path)
            .args(["-v", "error", "-ss"])
            .arg(format!("{:.3}", at_secs))
            .arg("-i")
            .arg(input)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"])
            .output()
            .await
            .map_err(|e| Self::tool_error(&self.ffmpeg_path, e))?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(Error::Media(format!(
                "ffmpeg produced no frame at {:.3}s: {}",
                at_secs,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(output.stdout)
    }

    fn reencode_sync(png: Vec<u8>, format: ThumbnailFormat) -> Result<Vec<u8>> {
        let frame = image::load_from_memory_with_format(&png, ImageFormat::Png)?;
        // JPEG has no alpha channel
        let frame = match format {
            ThumbnailFormat::Jpeg => image::DynamicImage::ImageRgb8(frame.to_rgb8()),
            _ => frame,
        };
        let mut encoded = Vec::new();
        frame.write_to(&mut Cursor::new(&mut encoded), format.image_format())?;
        Ok(encoded)
    }

    async fn reencode(png: Vec<u8>, format: ThumbnailFormat) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || Self::reencode_sync(png, format))
            .await
            .map_err(|e| Error::Invariant(format!("Frame encoding task join error: {}", e)))?
    }
}

#[async_trait]
impl DurationProbe for FfmpegTools {
    async fn probe_duration(&self, file: &MediaFile) -> Result<f64> {
        let (_dir, path) = Self::stage(file).await?;
        self.probe_path(&path).await
    }
}

#[async_trait]
impl ThumbnailExtractor for FfmpegTools {
    async fn extract(
        &self,
        file: &MediaFile,
        count: usize,
        format: ThumbnailFormat,
    ) -> Result<Vec<Vec<u8>>> {
        let (_dir, path) = Self::stage(file).await?;
        let duration = self.probe_path(&path).await?;

        let mut frames = Vec::with_capacity(count);
        for at_secs in Self::frame_timestamps(duration, count) {
            let png = self.grab_frame(&path, at_secs).await?;
            frames.push(Self::reencode(png, format).await?);
        }

        tracing::debug!(
            "Extracted {} {} thumbnails from {}",
            frames.len(),
            format.extension(),
            file.name
        );
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_frame() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([0, 128, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "format": {
                "filename": "clip.mp4",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "45.120000",
                "size": "1048576"
            }
        }"#;

        let duration = FfmpegTools::parse_probe_output(json).unwrap();
        assert!((duration - 45.12).abs() < 0.001);
    }

    #[test]
    fn test_parse_probe_output_without_duration() {
        let json = r#"{ "format": { "filename": "still.png", "duration": "N/A" } }"#;
        let err = FfmpegTools::parse_probe_output(json).unwrap_err();
        assert!(matches!(err, Error::Media(_)));
    }

    #[test]
    fn test_parse_probe_output_garbage() {
        assert!(FfmpegTools::parse_probe_output("not json").is_err());
    }

    #[test]
    fn test_frame_timestamps_are_evenly_spaced() {
        let stamps = FfmpegTools::frame_timestamps(30.0, 3);
        assert_eq!(stamps, vec![0.0, 10.0, 20.0]);
        assert!(FfmpegTools::frame_timestamps(30.0, 0).is_empty());
    }

    #[tokio::test]
    async fn test_reencode_to_jpeg() {
        let jpeg = FfmpegTools::reencode(png_frame(), ThumbnailFormat::Jpeg)
            .await
            .unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 8);
    }

    #[tokio::test]
    async fn test_reencode_rejects_non_png_input() {
        let result = FfmpegTools::reencode(vec![1, 2, 3], ThumbnailFormat::Png).await;
        assert!(matches!(result, Err(Error::Image(_))));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_media_error() {
        let tools = FfmpegTools::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let file = MediaFile::new("clip.mp4", "video/mp4", vec![0u8; 16]);

        let err = tools.probe_duration(&file).await.unwrap_err();
        assert!(matches!(err, Error::Media(ref msg) if msg.contains("not found")));
    }
}
