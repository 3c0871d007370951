//! The single user-facing notification channel
//!
//! Every fatal error and every degraded outcome of an ingestion cycle is
//! reported here exactly once.

use crate::error::{IngestError, IngestWarning};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Failed(IngestError),
    Degraded(IngestWarning),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::Failed(e) => e.to_string(),
            Notice::Degraded(w) => w.to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Notice::Failed(_))
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Routes notices into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::Failed(e) => tracing::error!("{} ({})", e, e.detail()),
            Notice::Degraded(IngestWarning::ThumbnailPublishFailed(cause)) => {
                tracing::warn!("{} ({})", notice.message(), cause)
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MockNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn get_messages(&self) -> Vec<String> {
        self.get_notices().iter().map(Notice::message).collect()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}
