//! Resumable HTTP downloads on top of `reqwest`.

use bridge_traits::{
    error::{BridgeError, Result},
    storage::{DownloadResult, ProgressCallback, TransferProgress},
};
use futures_util::StreamExt;
use reqwest::{header, Client, StatusCode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

const PARTIAL_SUFFIX: &str = ".part";

struct Transfer {
    written: u64,
    expected: Option<u64>,
    status: StatusCode,
}

/// Streams a URL to disk through `<name>.part` sibling files.
///
/// Each transfer writes its own working file and renames it into place when
/// complete; with concurrent downloads of one destination the last to finish
/// wins. A partial file left behind by an interrupted transfer is resumed
/// with an HTTP `Range` request. Servers that ignore the range get a full
/// rewrite.
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Location of the in-progress file for `destination`.
    pub fn partial_path(destination: &Path) -> Result<PathBuf> {
        let name = destination.file_name().ok_or_else(|| {
            BridgeError::OperationFailed(format!(
                "download destination has no file name: {}",
                destination.display()
            ))
        })?;
        let mut partial = OsString::from(name);
        partial.push(PARTIAL_SUFFIX);
        Ok(destination.with_file_name(partial))
    }

    /// Private file a single transfer writes to before it is renamed into
    /// place, so concurrent downloads of one destination never share bytes.
    fn working_path(destination: &Path) -> Result<PathBuf> {
        let mut working = Self::partial_path(destination)?.into_os_string();
        working.push(format!(".{}", Uuid::new_v4().simple()));
        Ok(PathBuf::from(working))
    }

    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Option<DownloadResult>> {
        let partial = Self::partial_path(destination)?;
        let working = Self::working_path(destination)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Claiming the partial file is a rename, so at most one transfer resumes it.
        let offset = match fs::rename(&partial, &working).await {
            Ok(()) => fs::metadata(&working).await.map(|meta| meta.len()).unwrap_or(0),
            Err(_) => 0,
        };

        let transfer = match self.transfer(url, &working, offset, on_progress).await {
            Ok(transfer) => transfer,
            Err(e) => {
                Self::park(&working, &partial).await;
                return Err(e);
            }
        };

        if transfer
            .expected
            .is_some_and(|expected| transfer.written < expected)
        {
            warn!(
                written = transfer.written,
                expected = ?transfer.expected,
                "Download ended early, keeping partial file"
            );
            Self::park(&working, &partial).await;
            return Ok(None);
        }

        if let Err(e) = fs::rename(&working, destination).await {
            let _ = fs::remove_file(&working).await;
            return Err(e.into());
        }
        debug!(bytes = transfer.written, "Download finished");

        Ok(Some(DownloadResult {
            path: destination.to_path_buf(),
            bytes: transfer.written,
            status: Some(transfer.status.as_u16()),
        }))
    }

    /// Keep an unfinished transfer where the next download can resume it.
    async fn park(working: &Path, partial: &Path) {
        if fs::metadata(working).await.is_err() {
            return;
        }
        if let Err(e) = fs::rename(working, partial).await {
            debug!(error = %e, "Dropping unfinished transfer");
            let _ = fs::remove_file(working).await;
        }
    }

    async fn transfer(
        &self,
        url: &str,
        working: &Path,
        mut offset: u64,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Transfer> {
        let mut response = self.request(url, offset).await?;
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
            warn!(offset, "Server rejected resume offset, restarting download");
            fs::remove_file(working).await?;
            offset = 0;
            response = self.request(url, 0).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "download failed with HTTP {status}"
            )));
        }

        let resumed = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        if !resumed {
            offset = 0;
        }
        let expected = response.content_length().map(|len| len + offset);

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(resumed)
            .truncate(!resumed)
            .open(working)
            .await?;

        debug!(resumed, offset, ?expected, "Download started");

        let mut written = offset;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(callback) = &on_progress {
                callback(TransferProgress {
                    bytes_written: written,
                    bytes_expected: expected,
                });
            }
        }
        file.flush().await?;

        Ok(Transfer {
            written,
            expected,
            status,
        })
    }

    async fn request(&self, url: &str, offset: u64) -> Result<reqwest::Response> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(header::RANGE, format!("bytes={offset}-"));
        }
        request
            .send()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_appends_suffix() {
        let partial = HttpDownloader::partial_path(Path::new("/cache/sounds/rain.mp3")).unwrap();
        assert_eq!(partial, PathBuf::from("/cache/sounds/rain.mp3.part"));
    }

    #[test]
    fn working_paths_are_distinct_per_transfer() {
        let destination = Path::new("/cache/sounds/rain.mp3");
        let a = HttpDownloader::working_path(destination).unwrap();
        let b = HttpDownloader::working_path(destination).unwrap();

        assert_ne!(a, b);
        assert_ne!(a, HttpDownloader::partial_path(destination).unwrap());
        assert!(a.to_string_lossy().starts_with("/cache/sounds/rain.mp3.part."));
    }

    #[test]
    fn partial_path_requires_file_name() {
        assert!(HttpDownloader::partial_path(Path::new("/")).is_err());
    }
}
