//! Outbound calls to the download backend.
//!
//! Every call resolves to a `Result<_, SessionError>`; transport failures,
//! non-2xx statuses and `{"status":"error"}` payloads all end up as an `Err`
//! with a readable message.

pub mod http;
pub mod models;

use crate::error::SessionError;
use models::{DownloadReceipt, DownloadRequest, Track};
use std::future::Future;

pub use http::HttpGateway;

const STREAM_PREFIX: &str = "stream";
const FILE_PREFIX: &str = "download_file";
const DOWNLOAD_ROUTE: &str = "download";
const LIBRARY_ROUTE: &str = "api/library";

pub trait Gateway: Clone + Send + Sync + 'static {
    fn routes(&self) -> &Routes;

    fn submit_download(
        &self,
        req: &DownloadRequest,
    ) -> impl Future<Output = Result<DownloadReceipt, SessionError>> + Send;

    fn fetch_library(&self) -> impl Future<Output = Result<Vec<Track>, SessionError>> + Send;
}

/// URL builder for the backend's routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    base: String,
}

impl Routes {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn download_endpoint(&self) -> String {
        format!("{}/{DOWNLOAD_ROUTE}", self.base)
    }

    pub fn library_endpoint(&self) -> String {
        format!("{}/{LIBRARY_ROUTE}", self.base)
    }

    pub fn stream_url(&self, path: &str) -> String {
        format!("{}/{STREAM_PREFIX}/{}", self.base, encode_path(path))
    }

    pub fn download_url(&self, path: &str) -> String {
        format!("{}/{FILE_PREFIX}/{}", self.base, encode_path(path))
    }
}

/// Percent-encode each `/`-separated segment on its own. The separators stay
/// literal.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
