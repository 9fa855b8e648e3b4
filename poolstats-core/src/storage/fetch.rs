//! Streaming downloads to local files.

use super::StorageError;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const CHUNK_SIZE: usize = 64 * 1024;

/// Progress callback for byte transfers.
pub trait TransferProgress {
    /// Called once the response headers are in. `total` is the advertised length, if any.
    fn on_start(&self, label: &str, total: Option<u64>);

    /// Called after each chunk is written.
    fn on_bytes(&self, written: u64);

    /// Called when the file is in place.
    fn on_finish(&self, label: &str, total_written: u64);
}

/// Progress sink that reports nothing.
pub struct SilentProgress;

impl TransferProgress for SilentProgress {
    fn on_start(&self, _label: &str, _total: Option<u64>) {}

    fn on_bytes(&self, _written: u64) {}

    fn on_finish(&self, _label: &str, _total_written: u64) {}
}

/// Downloads a URL into a file.
pub trait Fetcher {
    /// Fetch `url` into `dest`, returning the number of bytes written.
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        label: &str,
        progress: &dyn TransferProgress,
    ) -> Result<u64, StorageError>;
}

/// Blocking HTTP fetcher.
///
/// Writes to `<dest>.part` and renames into place once the body is complete,
/// so an interrupted download never leaves a plausible-looking archive.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self, StorageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        label: &str,
        progress: &dyn TransferProgress,
    ) -> Result<u64, StorageError> {
        info!(url, dest = %dest.display(), "downloading {label}");
        let mut resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        progress.on_start(label, resp.content_length());

        let part = partial_path(dest);
        let mut file = File::create(&part).map_err(io_err(&part))?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let n = resp
                .read(&mut buf)
                .map_err(|e| StorageError::Transport(format!("reading body of {url}: {e}")))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).map_err(io_err(&part))?;
            written += n as u64;
            progress.on_bytes(n as u64);
        }
        file.flush().map_err(io_err(&part))?;
        drop(file);

        fs::rename(&part, dest).map_err(|e| {
            let _ = fs::remove_file(&part);
            StorageError::Io {
                path: dest.to_path_buf(),
                source: e,
            }
        })?;

        progress.on_finish(label, written);
        Ok(written)
    }
}
