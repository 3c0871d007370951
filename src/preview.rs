//! Local preview handles
//!
//! A preview handle is a process-local reference to raw bytes that a
//! presentation layer can render before the content reaches remote storage.
//! Handles pin memory, so they live in a [`PreviewTable`] arena keyed by the
//! ingestion cycle that created them and are released explicitly.

use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewHandle {
    id: Uuid,
    cycle: u64,
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:media-ingest/{}", self.id)
    }
}

impl Serialize for PreviewHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Default)]
pub struct PreviewTable {
    entries: HashMap<PreviewHandle, Bytes>,
}

impl PreviewTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, cycle: u64, data: Bytes) -> PreviewHandle {
        let handle = PreviewHandle {
            id: Uuid::new_v4(),
            cycle,
        };
        self.entries.insert(handle.clone(), data);
        handle
    }

    pub fn get(&self, handle: &PreviewHandle) -> Option<Bytes> {
        self.entries.get(handle).cloned()
    }

    pub fn release_cycle(&mut self, cycle: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|handle, _| handle.cycle != cycle);
        before - self.entries.len()
    }

    pub fn release_all(&mut self) -> usize {
        let released = self.entries.len();
        self.entries.clear();
        released
    }

    pub fn outstanding(&self) -> usize {
        self.entries.len()
    }
}
