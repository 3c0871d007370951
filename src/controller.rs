//! Ingestion controller
//!
//! Drives one file at a time from selection to published references:
//! validation, thumbnail candidates for video, duration limits, and the
//! uploads themselves. State is an explicit [`IngestState`] plus a
//! [`MediaAsset`] side table, guarded by a mutex that is never held across an
//! await point.
//!
//! Each `submit` opens a numbered cycle. Work that resumes after a suspension
//! first checks that its cycle is still current; a `reset` or a newer cycle
//! makes late results fall on the floor instead of mutating fresh state.

use crate::error::{IngestError, IngestWarning, ValidationError};
use crate::media::{DurationProbe, FfmpegTools, ThumbnailExtractor, ThumbnailFormat};
use crate::models::{Blob, Config, ContentRef, IngestConfig, MediaFile, MediaKind};
use crate::notify::{LogNotifier, Notice, Notifier};
use crate::preview::{PreviewHandle, PreviewTable};
use crate::publisher::{ContentPublisher, MockPublisher, PinataPublisher};
use crate::validator;
use crate::{Error, Result};
use bytes::Bytes;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const THUMBNAIL_COUNT: usize = 3;
pub const THUMBNAIL_FORMAT: ThumbnailFormat = ThumbnailFormat::Jpeg;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum IngestState {
    #[default]
    Idle,
    Validating,
    Extracting,
    Uploading,
    Complete,
    Failed(IngestError),
}

impl IngestState {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            IngestState::Validating | IngestState::Extracting | IngestState::Uploading
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            IngestState::Idle => "idle",
            IngestState::Validating => "validating",
            IngestState::Extracting => "extracting",
            IngestState::Uploading => "uploading",
            IngestState::Complete => "complete",
            IngestState::Failed(_) => "failed",
        }
    }
}

/// Everything derived from the file of the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaAsset {
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub kind: Option<MediaKind>,
    pub local_preview: Option<PreviewHandle>,
    pub thumbnail_candidates: Vec<PreviewHandle>,
    pub selected_thumbnail: Option<usize>,
    pub thumbnail_ref: Option<ContentRef>,
    pub primary_ref: Option<ContentRef>,
}

impl MediaAsset {
    pub fn is_video(&self) -> bool {
        self.kind == Some(MediaKind::Video)
    }

    pub fn image_preview(&self) -> Option<&PreviewHandle> {
        self.local_preview.as_ref().filter(|_| !self.is_video())
    }

    pub fn animation_preview(&self) -> Option<&PreviewHandle> {
        self.local_preview.as_ref().filter(|_| self.is_video())
    }

    /// The still image to display: the chosen thumbnail for a video, the
    /// asset itself for an image.
    pub fn image_ref(&self) -> Option<&ContentRef> {
        match self.kind {
            Some(MediaKind::Video) => self.thumbnail_ref.as_ref(),
            Some(MediaKind::Image) => self.primary_ref.as_ref(),
            None => None,
        }
    }

    pub fn animation_ref(&self) -> Option<&ContentRef> {
        self.primary_ref.as_ref().filter(|_| self.is_video())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Complete,
    Failed(IngestError),
    /// A reset or newer cycle superseded this one; its results were dropped.
    Discarded,
    /// Another cycle was already in flight; nothing was changed.
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSnapshot {
    pub state: &'static str,
    pub error: Option<String>,
    pub is_uploading: bool,
    pub is_thumbnail_uploading: bool,
    pub outstanding_previews: usize,
    pub image_ref: Option<ContentRef>,
    pub animation_ref: Option<ContentRef>,
    pub asset: MediaAsset,
}

/// Injectable collaborators used to construct [`IngestionController`].
pub struct ControllerServices {
    pub publisher: Box<dyn ContentPublisher>,
    pub extractor: Box<dyn ThumbnailExtractor>,
    pub probe: Box<dyn DurationProbe>,
    pub notifier: Box<dyn Notifier>,
}

impl ControllerServices {
    /// Production wiring: Pinata (or the in-memory store on dry runs), ffmpeg,
    /// and log notifications.
    pub fn from_config(config: &Config) -> Result<Self> {
        let publisher: Box<dyn ContentPublisher> = if config.dry_run {
            info!("DRY_RUN enabled, publishing to the in-memory store");
            Box::new(MockPublisher::new().with_base_url(config.gateway_url.clone()))
        } else {
            let jwt = config
                .pinata_jwt
                .clone()
                .ok_or_else(|| Error::Config("PINATA_JWT not set".to_string()))?;
            Box::new(
                PinataPublisher::new(jwt, Duration::from_secs(config.publish_timeout_secs))?
                    .with_endpoint(config.pinata_endpoint.clone())
                    .with_gateway_url(config.gateway_url.clone()),
            )
        };

        Ok(Self {
            publisher,
            extractor: Box::new(FfmpegTools::new(&config.ffmpeg_path, &config.ffprobe_path)),
            probe: Box::new(FfmpegTools::new(&config.ffmpeg_path, &config.ffprobe_path)),
            notifier: Box::new(LogNotifier),
        })
    }
}

enum CycleError {
    Superseded,
    Failed(IngestError),
}

impl From<IngestError> for CycleError {
    fn from(err: IngestError) -> Self {
        CycleError::Failed(err)
    }
}

impl From<ValidationError> for CycleError {
    fn from(err: ValidationError) -> Self {
        CycleError::Failed(err.into())
    }
}

#[derive(Default)]
struct Inner {
    cycle: u64,
    state: IngestState,
    asset: MediaAsset,
    previews: PreviewTable,
    thumbnail_uploading: bool,
    thumbnail_epoch: u64,
}

impl Inner {
    /// Drop every handle and derived field; returns the number released.
    fn clear(&mut self) -> usize {
        let released = self.previews.release_all();
        self.asset = MediaAsset::default();
        self.thumbnail_uploading = false;
        released
    }
}

/// Releases an unfinished cycle if its future is dropped mid-flight.
struct CycleGuard<'a> {
    controller: &'a IngestionController,
    cycle: u64,
    armed: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.abandon(self.cycle);
        }
    }
}

/// Clears the thumbnail upload flag if a choice is dropped mid-publish.
struct ThumbnailGuard<'a> {
    controller: &'a IngestionController,
    cycle: u64,
    epoch: u64,
    armed: bool,
}

impl Drop for ThumbnailGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.controller.lock();
        if inner.cycle == self.cycle && inner.thumbnail_epoch == self.epoch {
            inner.thumbnail_uploading = false;
            warn!("Thumbnail choice dropped before its publish finished");
        }
    }
}

fn thumbnail_blob(data: Bytes) -> Blob {
    Blob {
        file_name: format!("thumbnail.{}", THUMBNAIL_FORMAT.extension()),
        mime_type: THUMBNAIL_FORMAT.mime_type().to_string(),
        data,
    }
}

pub struct IngestionController {
    config: IngestConfig,
    publisher: Box<dyn ContentPublisher>,
    extractor: Box<dyn ThumbnailExtractor>,
    probe: Box<dyn DurationProbe>,
    notifier: Box<dyn Notifier>,
    inner: Mutex<Inner>,
}

impl IngestionController {
    pub fn with_services(config: IngestConfig, services: ControllerServices) -> Self {
        Self {
            config,
            publisher: services.publisher,
            extractor: services.extractor,
            probe: services.probe,
            notifier: services.notifier,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::with_services(
            config.ingest_config(),
            ControllerServices::from_config(config)?,
        ))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the state only if `cycle` is still the live one.
    fn with_cycle<T>(
        &self,
        cycle: u64,
        f: impl FnOnce(&mut Inner) -> T,
    ) -> std::result::Result<T, CycleError> {
        let mut inner = self.lock();
        if inner.cycle != cycle {
            return Err(CycleError::Superseded);
        }
        Ok(f(&mut inner))
    }

    /// Ingest `file`. Never panics or returns an error: failures are
    /// reported through the notifier and reflected in the outcome.
    pub async fn submit(&self, file: Option<MediaFile>) -> CycleOutcome {
        let Some(cycle) = self.begin_cycle() else {
            warn!("Submit ignored: an ingestion cycle is already in flight");
            return CycleOutcome::Rejected;
        };

        let mut guard = CycleGuard {
            controller: self,
            cycle,
            armed: true,
        };
        let result = self.run_cycle(cycle, file).await;
        guard.armed = false;

        match result {
            Ok(()) => CycleOutcome::Complete,
            Err(CycleError::Superseded) => {
                debug!("Cycle {} was superseded; discarding its results", cycle);
                CycleOutcome::Discarded
            }
            Err(CycleError::Failed(err)) => {
                if self.fail(cycle, &err) {
                    self.notifier.notify(&Notice::Failed(err.clone()));
                    CycleOutcome::Failed(err)
                } else {
                    debug!("Cycle {} failed after being superseded: {}", cycle, err);
                    CycleOutcome::Discarded
                }
            }
        }
    }

    fn begin_cycle(&self) -> Option<u64> {
        let mut inner = self.lock();
        if inner.state.is_in_flight() {
            return None;
        }

        let released = inner.clear();
        inner.cycle += 1;
        inner.thumbnail_epoch += 1;
        inner.state = IngestState::Validating;
        if released > 0 {
            debug!("Released {} preview handles from the previous cycle", released);
        }
        Some(inner.cycle)
    }

    async fn run_cycle(
        &self,
        cycle: u64,
        file: Option<MediaFile>,
    ) -> std::result::Result<(), CycleError> {
        let file = file.ok_or(IngestError::NoFileSelected)?;
        let validated = validator::validate(&file, &self.config.accepted_mime_types)?;

        info!(
            "[cycle {}] Accepted {} ({}, {} bytes)",
            cycle, file.name, validated.mime_type, validated.size_bytes
        );
        self.with_cycle(cycle, |inner| {
            inner.asset.mime_type = Some(validated.mime_type.clone());
            inner.asset.size_bytes = Some(validated.size_bytes);
            inner.asset.kind = Some(validated.kind);
        })?;

        let is_video = validated.kind == MediaKind::Video;
        if is_video {
            self.prepare_thumbnails(cycle, &file).await?;
        }

        self.with_cycle(cycle, |inner| {
            let handle = inner.previews.acquire(cycle, file.data.clone());
            inner.asset.local_preview = Some(handle);
        })?;

        if is_video {
            let duration = self
                .probe
                .probe_duration(&file)
                .await
                .map_err(|e| IngestError::InvalidVideo(e.to_string()))?;
            self.with_cycle(cycle, |_| ())?;
            debug!("[cycle {}] Video runs {:.2}s", cycle, duration);
            validator::check_duration(duration, self.config.max_duration_secs)?;
        }

        self.with_cycle(cycle, |inner| inner.state = IngestState::Uploading)?;
        let reference = self
            .publisher
            .publish(Blob::from_file(&file))
            .await
            .map_err(IngestError::PublishFailed)?;

        self.with_cycle(cycle, |inner| {
            inner.asset.primary_ref = Some(reference.clone());
            inner.state = IngestState::Complete;
        })?;
        info!("[cycle {}] Published {} as {}", cycle, file.name, reference);
        Ok(())
    }

    async fn prepare_thumbnails(
        &self,
        cycle: u64,
        file: &MediaFile,
    ) -> std::result::Result<(), CycleError> {
        self.with_cycle(cycle, |inner| {
            inner.state = IngestState::Extracting;
            inner.thumbnail_uploading = true;
        })?;

        let frames: Vec<Bytes> = self
            .extractor
            .extract(file, THUMBNAIL_COUNT, THUMBNAIL_FORMAT)
            .await
            .map_err(|e| IngestError::InvalidVideo(e.to_string()))?
            .into_iter()
            .map(Bytes::from)
            .collect();
        let first = frames.first().cloned().ok_or_else(|| {
            IngestError::InvalidVideo("no thumbnail frames could be extracted".to_string())
        })?;

        self.with_cycle(cycle, |inner| {
            let candidates: Vec<PreviewHandle> = frames
                .into_iter()
                .map(|frame| inner.previews.acquire(cycle, frame))
                .collect();
            inner.asset.thumbnail_candidates = candidates;
            inner.asset.selected_thumbnail = Some(0);
        })?;
        debug!("[cycle {}] Extracted thumbnail candidates", cycle);

        let published = self.publisher.publish(thumbnail_blob(first)).await;

        let warning = self.with_cycle(cycle, |inner| {
            inner.thumbnail_uploading = false;
            inner.state = IngestState::Validating;
            match published {
                Ok(reference) => {
                    inner.asset.thumbnail_ref = Some(reference);
                    None
                }
                Err(e) => {
                    inner.asset.thumbnail_ref = None;
                    Some(IngestWarning::ThumbnailPublishFailed(e))
                }
            }
        })?;

        if let Some(warning) = warning {
            warn!(
                "[cycle {}] Thumbnail publish failed; continuing without an image reference",
                cycle
            );
            self.notifier.notify(&Notice::Degraded(warning));
        }
        Ok(())
    }

    fn fail(&self, cycle: u64, err: &IngestError) -> bool {
        let mut inner = self.lock();
        if inner.cycle != cycle {
            return false;
        }
        let released = inner.clear();
        inner.state = IngestState::Failed(err.clone());
        warn!(
            "[cycle {}] Ingestion failed: {} ({}); released {} preview handles",
            cycle,
            err,
            err.detail(),
            released
        );
        true
    }

    fn abandon(&self, cycle: u64) {
        let mut inner = self.lock();
        if inner.cycle == cycle {
            let released = inner.clear();
            inner.state = IngestState::Idle;
            warn!(
                "[cycle {}] Dropped before completion; released {} preview handles",
                cycle, released
            );
        } else {
            inner.previews.release_cycle(cycle);
        }
    }

    /// Publish candidate `index` as the thumbnail.
    ///
    /// Returns the new reference, or `None` when the publish failed (reported
    /// as a degraded notice), was superseded, or a cycle is still in flight.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a valid candidate index.
    pub async fn choose_thumbnail(&self, index: usize) -> Option<ContentRef> {
        let (cycle, epoch, data) = {
            let mut inner = self.lock();
            if inner.state.is_in_flight() {
                warn!("Thumbnail choice ignored: an ingestion cycle is in flight");
                return None;
            }

            let count = inner.asset.thumbnail_candidates.len();
            let Some(handle) = inner.asset.thumbnail_candidates.get(index).cloned() else {
                drop(inner);
                panic!(
                    "thumbnail index {} out of range ({} candidates)",
                    index, count
                );
            };
            let Some(data) = inner.previews.get(&handle) else {
                drop(inner);
                error!("Thumbnail candidate {} has no live preview", handle);
                self.notifier.notify(&Notice::Failed(IngestError::Unexpected(format!(
                    "preview {} missing for candidate {}",
                    handle, index
                ))));
                return None;
            };

            inner.thumbnail_epoch += 1;
            inner.thumbnail_uploading = true;
            inner.asset.selected_thumbnail = Some(index);
            (inner.cycle, inner.thumbnail_epoch, data)
        };

        let mut guard = ThumbnailGuard {
            controller: self,
            cycle,
            epoch,
            armed: true,
        };
        let published = self.publisher.publish(thumbnail_blob(data)).await;
        guard.armed = false;

        let warning = {
            let mut inner = self.lock();
            if inner.cycle != cycle || inner.thumbnail_epoch != epoch {
                debug!("Thumbnail choice {} superseded; discarding result", index);
                return None;
            }
            inner.thumbnail_uploading = false;
            match published {
                Ok(reference) => {
                    inner.asset.thumbnail_ref = Some(reference.clone());
                    info!("Thumbnail {} published as {}", index, reference);
                    return Some(reference);
                }
                Err(e) => {
                    inner.asset.thumbnail_ref = None;
                    IngestWarning::ThumbnailPublishFailed(e)
                }
            }
        };

        warn!("Thumbnail {} publish failed", index);
        self.notifier.notify(&Notice::Degraded(warning));
        None
    }

    /// Release every preview handle and return to `Idle`. Any cycle or
    /// thumbnail publish still in flight is invalidated.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let released = inner.clear();
        inner.cycle += 1;
        inner.thumbnail_epoch += 1;
        inner.state = IngestState::Idle;
        debug!("Reset; released {} preview handles", released);
    }

    pub fn state(&self) -> IngestState {
        self.lock().state.clone()
    }

    pub fn asset(&self) -> MediaAsset {
        self.lock().asset.clone()
    }

    pub fn is_uploading(&self) -> bool {
        let inner = self.lock();
        inner.state.is_in_flight() || inner.thumbnail_uploading
    }

    pub fn is_thumbnail_uploading(&self) -> bool {
        self.lock().thumbnail_uploading
    }

    pub fn is_video(&self) -> bool {
        self.lock().asset.is_video()
    }

    pub fn outstanding_previews(&self) -> usize {
        self.lock().previews.outstanding()
    }

    pub fn preview_bytes(&self, handle: &PreviewHandle) -> Option<Bytes> {
        self.lock().previews.get(handle)
    }

    pub fn snapshot(&self) -> IngestSnapshot {
        let inner = self.lock();
        IngestSnapshot {
            state: inner.state.label(),
            error: match &inner.state {
                IngestState::Failed(e) => Some(e.to_string()),
                _ => None,
            },
            is_uploading: inner.state.is_in_flight() || inner.thumbnail_uploading,
            is_thumbnail_uploading: inner.thumbnail_uploading,
            outstanding_previews: inner.previews.outstanding(),
            image_ref: inner.asset.image_ref().cloned(),
            animation_ref: inner.asset.animation_ref().cloned(),
            asset: inner.asset.clone(),
        }
    }
}
