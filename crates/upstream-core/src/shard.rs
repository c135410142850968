//! Shard boundary arithmetic

use crate::error::{Error, Result};

/// Split `file_size` bytes into consecutive `(start, end)` ranges of
/// `shard_size` bytes, starting at 0.
///
/// The final `end` is not clamped to `file_size`; readers clamp it through
/// [`ShardWindow::max_seek`](crate::window::ShardWindow::max_seek). An empty
/// file yields no shards. The final `end` saturates at `u64::MAX`.
pub fn calculate_shards(file_size: u64, shard_size: u64) -> Result<Vec<(u64, u64)>> {
    if shard_size == 0 {
        return Err(Error::InvalidSize("shard size must be greater than zero".to_string()));
    }

    let count = file_size.div_ceil(shard_size);
    Ok((0..count)
        .map(|i| {
            let start = i * shard_size;
            (start, start.saturating_add(shard_size))
        })
        .collect())
}
