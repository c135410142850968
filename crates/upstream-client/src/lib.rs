//! Upstream Client Library
//!
//! This library provides the web-core transfer client: configuration and
//! the [`Streamer`](streamer::Streamer) that uploads and downloads shards.

pub mod config;
pub mod streamer;

pub use config::{Config, TransferConfig, UploadEncoding};
pub use streamer::Streamer;
