//! Publishing to content-addressed storage
//!
//! Pushes a blob to a pinning service and hands back a gateway URI derived
//! from the content identifier the service returns.

pub mod client;
pub mod mock;

pub use client::PinataPublisher;
pub use mock::MockPublisher;

use crate::error::PublishError;
use crate::models::{Blob, ContentRef};
use async_trait::async_trait;

/// One round-trip per call, never retried. Implementations hold no per-call
/// state and may be shared across concurrent publishes.
#[async_trait]
pub trait ContentPublisher: Send + Sync {
    async fn publish(&self, blob: Blob) -> Result<ContentRef, PublishError>;
}
