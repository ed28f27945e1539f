//! Remote project store access and workspace activation.
//!
//! The synchronizer reconciles the ephemeral local project record with
//! the authoritative remote store when a workspace is entered, and
//! forwards the handful of edits the remote cares about (name, slide
//! image). Everything else is local-first and fire-and-forget.

mod config;
mod remote;
mod synchronizer;

pub use config::{ApiConfig, DEFAULT_BASE_URL};
pub use remote::{
    encode_image_data_url, RemoteGeneration, RemoteProjectDetail, RemoteProjectSummary,
    RemoteStore, SyncError,
};
pub use synchronizer::{activate, delete, rename, sync_slide_image};
