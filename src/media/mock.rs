use super::{DurationProbe, ThumbnailExtractor, ThumbnailFormat};
use crate::models::MediaFile;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockMediaTools {
    duration_secs: Arc<Mutex<f64>>,
    frames: Arc<Mutex<Option<Vec<Vec<u8>>>>>,
    extract_fails: Arc<Mutex<bool>>,
    probe_fails: Arc<Mutex<bool>>,
    extract_count: Arc<Mutex<usize>>,
    probe_count: Arc<Mutex<usize>>,
}

impl MockMediaTools {
    pub fn new() -> Self {
        Self {
            duration_secs: Arc::new(Mutex::new(10.0)),
            frames: Arc::new(Mutex::new(None)),
            extract_fails: Arc::new(Mutex::new(false)),
            probe_fails: Arc::new(Mutex::new(false)),
            extract_count: Arc::new(Mutex::new(0)),
            probe_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_duration(self, secs: f64) -> Self {
        *self.duration_secs.lock().unwrap() = secs;
        self
    }

    /// Serve these frames instead of generating `count` distinct ones.
    pub fn with_frames(self, frames: Vec<Vec<u8>>) -> Self {
        *self.frames.lock().unwrap() = Some(frames);
        self
    }

    pub fn with_extract_failure(self, should_fail: bool) -> Self {
        *self.extract_fails.lock().unwrap() = should_fail;
        self
    }

    pub fn with_probe_failure(self, should_fail: bool) -> Self {
        *self.probe_fails.lock().unwrap() = should_fail;
        self
    }

    pub fn get_extract_count(&self) -> usize {
        *self.extract_count.lock().unwrap()
    }

    pub fn get_probe_count(&self) -> usize {
        *self.probe_count.lock().unwrap()
    }

    /// The frame generated for `index` when no frames were configured.
    pub fn frame_for(index: usize, format: ThumbnailFormat) -> Vec<u8> {
        format!("{}-frame-{}", format.extension(), index).into_bytes()
    }
}

impl Default for MockMediaTools {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThumbnailExtractor for MockMediaTools {
    async fn extract(
        &self,
        _file: &MediaFile,
        count: usize,
        format: ThumbnailFormat,
    ) -> Result<Vec<Vec<u8>>> {
        *self.extract_count.lock().unwrap() += 1;

        if *self.extract_fails.lock().unwrap() {
            return Err(Error::Media("Mock extraction failure".to_string()));
        }

        match self.frames.lock().unwrap().clone() {
            Some(frames) => Ok(frames),
            None => Ok((0..count).map(|i| Self::frame_for(i, format)).collect()),
        }
    }
}

#[async_trait]
impl DurationProbe for MockMediaTools {
    async fn probe_duration(&self, _file: &MediaFile) -> Result<f64> {
        *self.probe_count.lock().unwrap() += 1;

        if *self.probe_fails.lock().unwrap() {
            return Err(Error::Media("Mock probe failure".to_string()));
        }
        Ok(*self.duration_secs.lock().unwrap())
    }
}
