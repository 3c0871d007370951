//! Media ingestion pipeline - validates user-selected images and videos,
//! derives thumbnail candidates for video, and publishes everything to
//! content-addressed storage behind an observable state machine.

pub mod controller;
pub mod error;
pub mod media;
pub mod mime;
pub mod models;
pub mod notify;
pub mod preview;
pub mod publisher;
pub mod validator;

pub use error::{Error, Result};
