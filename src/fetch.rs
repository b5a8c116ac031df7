use crate::error::DownloadError;
use log::debug;
use reqwest::blocking::Client;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Bytes copied from the response body per write.
pub const DOWNLOAD_BUFFER_SIZE: usize = 8192;

/// Retrieves a remote resource into a local file.
pub trait Fetcher {
    /// Downloads `url` to `destination`, returning the number of bytes written.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, DownloadError>;
}

/// Single-attempt HTTP(S) fetcher.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    /// Streams the response body to `destination` in fixed-size pieces.
    ///
    /// The destination is created or truncated. Transport failures and
    /// non-2xx responses are returned without retrying; a failed body read
    /// may leave a partially written file behind.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        let request_error = |source| DownloadError::Request {
            url: url.to_string(),
            source,
        };
        let io_error = |source| DownloadError::Io {
            path: destination.to_path_buf(),
            source,
        };

        let mut response = self.client.get(url).send().map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status,
            });
        }

        let mut file = File::create(destination).map_err(io_error)?;
        let mut buffer = [0u8; DOWNLOAD_BUFFER_SIZE];
        let mut written = 0u64;
        loop {
            let read = match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_error(e)),
            };
            file.write_all(&buffer[..read]).map_err(io_error)?;
            written += read as u64;
        }
        file.flush().map_err(io_error)?;

        debug!("Wrote {} bytes to {}", written, destination.display());
        Ok(written)
    }
}
