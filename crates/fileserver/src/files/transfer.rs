//! Streaming file download and upload.
//!
//! Both directions copy through a fixed 1 MiB buffer so a single request
//! never holds more than that in memory, whatever the file size. File
//! handles are owned by the copy and closed when it finishes or fails.

use std::io;
use std::path::Path;

use axum::body::Body;
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;

/// Size of the intermediate copy buffer (1 MiB).
pub const BUFFER_SIZE: usize = 1024 * 1024;

/// Errors that can occur while storing an upload.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The parent directories of the target could not be created.
    #[error("can't create parent directory: {0}")]
    CreateParent(#[source] io::Error),

    /// The target file could not be created.
    #[error("can't create file: {0}")]
    Create(#[source] io::Error),

    /// Reading the request body or writing the file failed mid-stream.
    #[error("can't write file: {0}")]
    Write(#[source] io::Error),
}

/// Stream an opened file as a response body.
pub fn download_body(file: File) -> Body {
    Body::from_stream(ReaderStream::with_capacity(file, BUFFER_SIZE))
}

/// Store `body` at `target`, creating missing parent directories first.
///
/// The target is truncated if it already exists. Returns the number of bytes
/// written. A failure part way through leaves whatever was written so far in
/// place.
pub async fn upload<S, E>(target: &Path, body: S) -> Result<u64, TransferError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(TransferError::CreateParent)?;
    }

    let mut file = File::create(target).await.map_err(TransferError::Create)?;
    let mut reader = StreamReader::new(body.map_err(io::Error::other));

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total_bytes_written = 0u64;

    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .map_err(TransferError::Write)?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .await
            .map_err(TransferError::Write)?;
        total_bytes_written += n as u64;
    }

    // tokio's File finishes the last write in the background; flush waits
    // for it so errors surface here.
    file.flush().await.map_err(TransferError::Write)?;

    debug!(
        "Upload stored at {} ({} bytes)",
        target.display(),
        total_bytes_written
    );

    Ok(total_bytes_written)
}
