use super::ContentPublisher;
use crate::error::PublishError;
use crate::models::{Blob, ContentRef};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// In-memory store: the identifier is the SHA-256 of the content, so equal
/// bytes always map to the same reference.
#[derive(Clone)]
pub struct MockPublisher {
    base_url: String,
    published: Arc<Mutex<Vec<Blob>>>,
    scripted: Arc<Mutex<VecDeque<Option<PublishError>>>>,
    publish_count: Arc<Mutex<usize>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            base_url: "https://mock-gateway.example.com/ipfs".to_string(),
            published: Arc::new(Mutex::new(Vec::new())),
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            publish_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Queue a failure for the next unscripted call.
    pub fn with_failure(self, error: PublishError) -> Self {
        self.scripted.lock().unwrap().push_back(Some(error));
        self
    }

    /// Queue a success, used to place a failure after it.
    pub fn with_success(self) -> Self {
        self.scripted.lock().unwrap().push_back(None);
        self
    }

    pub fn get_publish_count(&self) -> usize {
        *self.publish_count.lock().unwrap()
    }

    pub fn get_published(&self) -> Vec<Blob> {
        self.published.lock().unwrap().clone()
    }

    /// The reference this publisher hands out for `data`.
    pub fn reference_for(&self, data: &[u8]) -> ContentRef {
        let cid = format!("{:x}", Sha256::digest(data));
        ContentRef::new(&self.base_url, &cid)
    }
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentPublisher for MockPublisher {
    async fn publish(&self, blob: Blob) -> Result<ContentRef, PublishError> {
        *self.publish_count.lock().unwrap() += 1;

        if let Some(Some(error)) = self.scripted.lock().unwrap().pop_front() {
            return Err(error);
        }

        let reference = self.reference_for(&blob.data);
        self.published.lock().unwrap().push(blob);
        Ok(reference)
    }
}
