use super::models::{DownloadReceipt, DownloadReply, DownloadRequest, LibraryReply, Track};
use super::{Gateway, Routes};
use crate::error::SessionError;
use anyhow::Context;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    routes: Routes,
}

/// reqwest-backed client for the download backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    inner: Arc<Inner>,
}

impl HttpGateway {
    const USER_AGENT: &'static str = concat!("hammerdeck/", env!("CARGO_PKG_VERSION"));

    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(Self::USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("build reqwest client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                routes: Routes::new(base_url),
            }),
        })
    }

    /// The underlying client, shared with the file saver.
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }
}

impl Gateway for HttpGateway {
    fn routes(&self) -> &Routes {
        &self.inner.routes
    }

    async fn submit_download(&self, req: &DownloadRequest) -> Result<DownloadReceipt, SessionError> {
        let url = self.inner.routes.download_endpoint();
        tracing::debug!(query = %req.query, format = %req.format, no_cover = req.no_cover, "POST {url}");

        let response = self.inner.http.post(&url).json(req).send().await?;
        match decode_reply::<DownloadReply>(response).await? {
            DownloadReply::Success { title, is_playlist } => {
                Ok(DownloadReceipt { title, is_playlist })
            }
            DownloadReply::Error { message } => Err(SessionError::Server(message)),
        }
    }

    async fn fetch_library(&self) -> Result<Vec<Track>, SessionError> {
        let url = self.inner.routes.library_endpoint();
        tracing::debug!("GET {url}");

        let response = self.inner.http.get(&url).send().await?;
        match decode_reply::<LibraryReply>(response).await? {
            LibraryReply::Success { tracks, .. } => Ok(tracks),
            LibraryReply::Error { message } => Err(SessionError::Server(message)),
        }
    }
}

/// The backend answers errors with a JSON envelope even on 4xx/5xx, so the
/// body is decoded before the status is judged.
async fn decode_reply<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SessionError> {
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<T>(&body) {
        Ok(reply) => Ok(reply),
        Err(e) if status.is_success() => {
            Err(SessionError::Server(format!("malformed response: {e}")))
        }
        Err(_) => Err(status_error(status)),
    }
}

fn status_error(status: StatusCode) -> SessionError {
    SessionError::Server(format!("server returned {status}"))
}
