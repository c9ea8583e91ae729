//! S3 artifact storage.
//!
//! This crate provides:
//! - Public-read uploads of finished variations and input images
//! - Public URL construction for stored objects
//! - Key layout helpers shared by the pipeline and the HTTP surface

pub mod client;
pub mod error;
pub mod keys;

pub use client::{ArtifactStore, S3Config, S3Store};
pub use error::{StorageError, StorageResult};
pub use keys::{image_content_type, input_image_key, variation_key, VIDEO_CONTENT_TYPE};
