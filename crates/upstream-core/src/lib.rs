//! Upstream Core - shard windows, descriptors and size arithmetic
//!
//! This crate provides the network-free building blocks of the upstream
//! client for the web-core storage API: bounded readers over file shards,
//! the descriptors returned for uploaded shards, and the arithmetic used to
//! split a file into shards.

pub mod descriptor;
pub mod error;
pub mod shard;
pub mod size;
pub mod window;

pub use descriptor::ShardDescriptor;
pub use error::{Error, Result};
pub use shard::calculate_shards;
pub use size::{parse_shard_size, ParsedSize, SizeHelpers};
pub use window::{ProgressCallback, ShardWindow, WindowOptions};

/// Default shard size: 250 MiB
pub const DEFAULT_SHARD_SIZE: u64 = 250 * 1024 * 1024;

/// Default slice width when streaming a shard: 1 KiB
pub const DEFAULT_READ_SIZE: usize = 1024;
