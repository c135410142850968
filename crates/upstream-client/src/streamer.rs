//! Streamer module
//!
//! Uploads file shards to a web-core server and downloads them back.
//! Shards are transferred one at a time: each upload streams a
//! [`ShardWindow`] as a multipart body, and each download is appended to the
//! destination file in descriptor order.

use crate::config::{expand_path, Config, UploadEncoding};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use upstream_core::{
    calculate_shards, Error, ProgressCallback, Result, ShardDescriptor, ShardWindow,
    WindowOptions, DEFAULT_SHARD_SIZE,
};

/// Timeout of the connectivity probe made when a streamer is created
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Slices buffered between the disk reader and the request body
const SLICE_BUFFER: usize = 16;

/// Client for the web-core upload and download API
#[derive(Debug, Clone)]
pub struct Streamer {
    server: String,
    http: reqwest::Client,
    encoding: UploadEncoding,
}

impl Streamer {
    /// Create a streamer for `server`, failing if the server cannot be reached
    pub async fn new(server: &str) -> Result<Self> {
        Self::connect(server, CONNECT_TIMEOUT, UploadEncoding::Multipart).await
    }

    /// Create a streamer from the client configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.transfer.connect_timeout_secs);
        Self::connect(&config.server, timeout, config.transfer.encoding).await
    }

    async fn connect(server: &str, timeout: Duration, encoding: UploadEncoding) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("upstream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(http_error)?;

        let streamer = Self {
            server: server.trim_end_matches('/').to_string(),
            http,
            encoding,
        };
        streamer.check_connectivity(timeout).await?;
        Ok(streamer)
    }

    /// Base URL of the server
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Probe the server. Any HTTP response counts as reachable.
    pub async fn check_connectivity(&self, timeout: Duration) -> Result<()> {
        tracing::debug!("Checking connectivity to {}", self.server);
        self.http
            .get(&self.server)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Connect(format!("{}: {}", self.server, e)))?;
        Ok(())
    }

    /// Expand `~` and verify the path names an existing regular file
    pub fn check_path(filepath: impl AsRef<Path>) -> Result<PathBuf> {
        let expanded = expand_path(&filepath);
        if !expanded.is_file() {
            return Err(Error::File(format!(
                "{} not a file or not found",
                filepath.as_ref().display()
            )));
        }
        Ok(expanded)
    }

    /// Upload one shard of `filepath` to `/api/upload`.
    ///
    /// The shard spans `options.shard_size` bytes from `options.start_pos`;
    /// a shard size of 0 means the default of 250 MiB. The progress
    /// callback, if any, is invoked before every slice read from disk.
    pub async fn upload(
        &self,
        filepath: impl AsRef<Path>,
        mut options: WindowOptions,
        callback: Option<ProgressCallback>,
    ) -> Result<ShardDescriptor> {
        if self.encoding == UploadEncoding::Chunked {
            return Err(Error::NotImplemented("chunked transfer encoding uploads"));
        }

        let path = Self::check_path(filepath)?;
        if options.shard_size == 0 {
            options.shard_size = DEFAULT_SHARD_SIZE;
        }

        let mut window = ShardWindow::with_options(&path, options)?;
        window.set_callback(callback);
        let length = window.total_read_bytes();

        let part = Part::stream_with_length(window_body(window), length).file_name("file");
        let form = Form::new().part("file", part);

        let url = format!("{}/api/upload", self.server);
        tracing::debug!(
            "Uploading {} bytes of {} from offset {} to {}",
            length,
            path.display(),
            options.start_pos,
            url
        );

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        tracing::debug!("Upload returned {}", status);
        if let Some(err) = upload_status_error(status) {
            return Err(err);
        }

        let body = response.text().await.map_err(http_error)?;
        let mut shard = ShardDescriptor::from_json(&body)?;
        if let Some(name) = path.file_name() {
            shard.set_filename(name.to_string_lossy());
        }
        shard.set_filepath(&path);

        Ok(shard)
    }

    /// Upload a whole file as consecutive shards of `shard_size` bytes.
    ///
    /// `progress` is called with `(shard_index, shard_count)` before each
    /// shard and may return a callback for that shard's window. Returns the
    /// descriptors in file order. An empty file is uploaded as a single
    /// empty shard.
    pub async fn upload_file<F>(
        &self,
        filepath: impl AsRef<Path>,
        shard_size: u64,
        read_size: usize,
        mut progress: F,
    ) -> Result<Vec<ShardDescriptor>>
    where
        F: FnMut(usize, usize) -> Option<ProgressCallback>,
    {
        let path = Self::check_path(filepath)?;
        let shard_size = if shard_size == 0 { DEFAULT_SHARD_SIZE } else { shard_size };
        let file_size = tokio::fs::metadata(&path).await?.len();

        let mut bounds = calculate_shards(file_size, shard_size)?;
        if bounds.is_empty() {
            bounds.push((0, shard_size));
        }
        tracing::debug!("{} will be uploaded in {} piece(s)", path.display(), bounds.len());

        let mut shards = Vec::with_capacity(bounds.len());
        for (index, (start, end)) in bounds.iter().enumerate() {
            tracing::trace!("Shard {} - start: {}, end: {}", index, start, end);
            let options = WindowOptions {
                shard_size,
                start_pos: *start,
                read_size,
            };
            let callback = progress(index, bounds.len());
            shards.push(self.upload(&path, options, callback).await?);
        }

        Ok(shards)
    }

    /// Issue the GET for one shard, failing on any non-success status
    pub async fn fetch(&self, shard: &ShardDescriptor) -> Result<reqwest::Response> {
        let url = format!("{}/api/download/{}", self.server, shard.uri()?);
        tracing::debug!("Downloading {}", url);

        let response = self.http.get(&url).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Response {
                status: status.as_u16(),
                message: format!(
                    "{} {} for url {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown"),
                    url
                ),
            });
        }

        Ok(response)
    }

    /// Download `shards` in order and concatenate them into one file.
    ///
    /// `dest` must not exist and its parent directory must. Without a
    /// destination the file is named after the first shard's filehash in
    /// the current directory. Bytes are written in `chunk_size` pieces. If
    /// any shard fails, the partially written file is removed.
    pub async fn download(
        &self,
        shards: &[ShardDescriptor],
        dest: Option<&Path>,
        chunk_size: usize,
    ) -> Result<PathBuf> {
        let first = shards
            .first()
            .ok_or_else(|| Error::Descriptor("no shards to download".to_string()))?;
        for shard in shards {
            shard.get_hashes()?;
        }
        if chunk_size == 0 {
            return Err(Error::InvalidSize("chunk size must be greater than zero".to_string()));
        }

        let path = match dest {
            Some(dest) => check_dest(dest)?,
            None => check_dest(Path::new(first.get_hashes()?.0))?,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    Error::File(format!("{} already exists", path.display()))
                }
                _ => Error::Io(e),
            })?;

        if let Err(e) = self.write_shards(shards, &mut file, chunk_size).await {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                tracing::debug!("Failed to remove {}: {}", path.display(), cleanup);
            }
            return Err(e);
        }

        Ok(path)
    }

    async fn write_shards(
        &self,
        shards: &[ShardDescriptor],
        file: &mut tokio::fs::File,
        chunk_size: usize,
    ) -> Result<()> {
        for (index, shard) in shards.iter().enumerate() {
            let written = self.append_shard(shard, file, chunk_size).await?;
            tracing::debug!("Shard {} complete ({} bytes)", index, written);
        }
        file.flush().await?;
        Ok(())
    }

    async fn append_shard(
        &self,
        shard: &ShardDescriptor,
        file: &mut tokio::fs::File,
        chunk_size: usize,
    ) -> Result<u64> {
        let mut response = self.fetch(shard).await?;
        let mut written = 0u64;

        while let Some(bytes) = response.chunk().await.map_err(http_error)? {
            for piece in bytes.chunks(chunk_size) {
                file.write_all(piece).await?;
                written += piece.len() as u64;
            }
        }

        Ok(written)
    }
}

/// Map an upload response status to its error, `None` for 201 Created
pub fn upload_status_error(status: StatusCode) -> Option<Error> {
    let message = match status.as_u16() {
        201 => return None,
        404 => "API call not found".to_string(),
        402 => "Payment required".to_string(),
        500 => "Server error".to_string(),
        code => format!(
            "Received status code {} {}",
            code,
            status.canonical_reason().unwrap_or("Unknown")
        ),
    };
    Some(Error::Response {
        status: status.as_u16(),
        message,
    })
}

/// Validate a download destination: it must not exist, its parent must
fn check_dest(dest: &Path) -> Result<PathBuf> {
    let path = expand_path(dest);
    if path.exists() {
        return Err(Error::File(format!("{} already exists", dest.display())));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(Error::File(format!(
                "{} directory does not exist",
                parent.display()
            )));
        }
    }
    Ok(path)
}

/// Stream a window's slices as a request body.
///
/// The window is read on a blocking thread and its slices are forwarded
/// through a bounded channel. When the request is dropped the receiver goes
/// away, the reader stops, and the window's file handle is released.
fn window_body(window: ShardWindow) -> Body {
    let (tx, rx) = mpsc::channel::<io::Result<Vec<u8>>>(SLICE_BUFFER);

    tokio::task::spawn_blocking(move || {
        for slice in window {
            if tx.blocking_send(slice).is_err() {
                break;
            }
        }
    });

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|slice| (slice, rx))
    });
    Body::wrap_stream(stream)
}

fn http_error(e: reqwest::Error) -> Error {
    Error::Http(e.to_string())
}
