//! Bounded shard windows over on-disk files
//!
//! A [`ShardWindow`] presents one contiguous byte range of a file, from its
//! start position up to [`max_seek`](ShardWindow::max_seek), as a bounded
//! reader and as a lazy sequence of `read_size` slices. This lets a large
//! file be streamed out shard by shard without loading it into memory:
//!
//! ```no_run
//! use upstream_core::window::{ShardWindow, WindowOptions};
//!
//! let options = WindowOptions { shard_size: 65536, ..Default::default() };
//! let window = ShardWindow::with_options("/path/to/file", options)?;
//! for slice in window {
//!     let slice = slice?;
//!     // send `slice` somewhere
//! }
//! # Ok::<(), upstream_core::Error>(())
//! ```
//!
//! The file handle is owned by the window and released when it is dropped,
//! whether iteration ran to the end, stopped early, or unwound.

use crate::error::{Error, Result};
use crate::{DEFAULT_READ_SIZE, DEFAULT_SHARD_SIZE};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::iter::FusedIterator;
use std::path::Path;

/// Progress callback invoked with `(current_position, total_read_bytes)`
pub type ProgressCallback = Box<dyn FnMut(u64, u64) + Send + 'static>;

/// Placement and slicing of a shard window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOptions {
    /// Width of the window in bytes
    pub shard_size: u64,
    /// Absolute offset where the window starts
    pub start_pos: u64,
    /// Width of each slice produced when iterating
    pub read_size: usize,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            shard_size: DEFAULT_SHARD_SIZE,
            start_pos: 0,
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

/// A bounded, seekable, iterable view of one shard of a file
pub struct ShardWindow {
    file: File,
    pos: u64,
    start_pos: u64,
    shard_size: u64,
    read_size: usize,
    filesize: u64,
    max_seek: u64,
    total_read_bytes: u64,
    exhausted: bool,
    callback: Option<ProgressCallback>,
}

impl ShardWindow {
    /// Open a window over the whole file (up to the default shard size)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(path, WindowOptions::default())
    }

    /// Open a window at `options.start_pos` spanning `options.shard_size` bytes
    pub fn with_options(path: impl AsRef<Path>, options: WindowOptions) -> Result<Self> {
        if options.read_size == 0 {
            return Err(Error::InvalidSize("read size must be greater than zero".to_string()));
        }

        let mut file = File::open(path.as_ref())?;
        let filesize = file.metadata()?.len();

        if options.start_pos > filesize {
            return Err(Error::InvalidSize(format!(
                "start position {} is past the end of {} ({} bytes)",
                options.start_pos,
                path.as_ref().display(),
                filesize
            )));
        }
        if options.start_pos > 0 {
            file.seek(SeekFrom::Start(options.start_pos))?;
        }

        let max_seek = options.start_pos.saturating_add(options.shard_size).min(filesize);

        Ok(Self {
            file,
            pos: options.start_pos,
            start_pos: options.start_pos,
            shard_size: options.shard_size,
            read_size: options.read_size,
            filesize,
            max_seek,
            total_read_bytes: max_seek - options.start_pos,
            exhausted: false,
            callback: None,
        })
    }

    /// Attach a progress callback, called before every read
    pub fn with_callback(mut self, callback: impl FnMut(u64, u64) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Attach an optional boxed progress callback
    pub fn set_callback(&mut self, callback: Option<ProgressCallback>) {
        self.callback = callback;
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    pub fn shard_size(&self) -> u64 {
        self.shard_size
    }

    pub fn read_size(&self) -> usize {
        self.read_size
    }

    /// Size of the underlying file on disk
    pub fn filesize(&self) -> u64 {
        self.filesize
    }

    /// Absolute offset where this window ends
    pub fn max_seek(&self) -> u64 {
        self.max_seek
    }

    /// Width of the window as opened: `max_seek - start_pos`
    pub fn total_read_bytes(&self) -> u64 {
        self.total_read_bytes
    }

    /// Current absolute position in the file
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Bytes left before `max_seek`
    pub fn remaining(&self) -> u64 {
        self.max_seek.saturating_sub(self.pos)
    }

    /// Read up to `size` bytes, or the rest of the window when `size` is
    /// `None`. Never reads past `max_seek`; at the end of the window this
    /// returns an empty buffer.
    pub fn read_slice(&mut self, size: Option<usize>) -> io::Result<Vec<u8>> {
        let want = match size {
            Some(size) => (size as u64).min(self.remaining()),
            None => self.remaining(),
        };
        self.report();
        self.read_exact_len(want)
    }

    /// Release the file handle
    pub fn close(self) {
        drop(self);
    }

    fn report(&mut self) {
        if let Some(callback) = self.callback.as_mut() {
            callback(self.pos, self.total_read_bytes);
        }
    }

    fn read_exact_len(&mut self, len: u64) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len as usize);
        if len > 0 {
            (&mut self.file).take(len).read_to_end(&mut buf)?;
            self.pos += buf.len() as u64;
        }
        Ok(buf)
    }
}

impl Read for ShardWindow {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if want == 0 {
            return Ok(0);
        }
        self.report();
        let n = self.file.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// Seeking is not bounded by the window; only reads are.
impl Seek for ShardWindow {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.file.seek(pos)?;
        Ok(self.pos)
    }
}

impl Iterator for ShardWindow {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted || self.pos >= self.max_seek {
            self.exhausted = true;
            return None;
        }

        self.report();
        let want = (self.read_size as u64).min(self.remaining());
        match self.read_exact_len(want) {
            Ok(slice) if slice.is_empty() => {
                self.exhausted = true;
                Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended at {} before window end {}", self.pos, self.max_seek),
                )))
            }
            Ok(slice) => Some(Ok(slice)),
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for ShardWindow {}

impl fmt::Debug for ShardWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardWindow")
            .field("pos", &self.pos)
            .field("start_pos", &self.start_pos)
            .field("max_seek", &self.max_seek)
            .field("read_size", &self.read_size)
            .field("filesize", &self.filesize)
            .finish_non_exhaustive()
    }
}
