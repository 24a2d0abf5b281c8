use crate::session_log::{LogSink, Severity};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Starts a file download for a URL without touching playback.
pub trait FileSaver: Send + Sync {
    fn save(&self, url: &str, file_name: &str);
}

/// Streams attachments from the backend into a local directory on a
/// background task.
#[derive(Clone)]
pub struct HttpFileSaver {
    http: reqwest::Client,
    dir: PathBuf,
    log: Arc<dyn LogSink>,
}

impl HttpFileSaver {
    pub fn new(http: reqwest::Client, dir: PathBuf, log: Arc<dyn LogSink>) -> Self {
        Self { http, dir, log }
    }

    /// Downloads `url` into the save directory and returns the written path.
    pub async fn fetch(&self, url: &str, file_name: &str) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create dir {}", self.dir.display()))?;
        let name = sanitize_file_name(file_name);
        let target = self.dir.join(&name);
        let partial = self.dir.join(format!("{name}.part"));

        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .context("download http status")?;

        let written: anyhow::Result<()> = async {
            write_body(response, &partial).await?;
            tokio::fs::rename(&partial, &target)
                .await
                .with_context(|| format!("rename to {}", target.display()))
        }
        .await;
        if let Err(e) = written {
            tokio::fs::remove_file(&partial).await.ok();
            return Err(e);
        }
        Ok(target)
    }
}

async fn write_body(mut response: reqwest::Response, partial: &Path) -> anyhow::Result<()> {
    let mut file = tokio::fs::File::create(partial)
        .await
        .with_context(|| format!("create {}", partial.display()))?;
    while let Some(chunk) = response.chunk().await.context("read download body")? {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("write {}", partial.display()))?;
    }
    file.flush().await.context("flush download")?;
    Ok(())
}

impl FileSaver for HttpFileSaver {
    fn save(&self, url: &str, file_name: &str) {
        let this = self.clone();
        let url = url.to_string();
        let file_name = file_name.to_string();
        tokio::spawn(async move {
            match this.fetch(&url, &file_name).await {
                Ok(path) => {
                    tracing::info!(path = %path.display(), "file saved");
                    this.log
                        .append(&format!("saved: {}", path.display()), Severity::Success);
                }
                Err(e) => {
                    this.log
                        .append(&format!("save failed: {e:#}"), Severity::Error);
                }
            }
        });
    }
}

/// Keeps only the last path component and drops characters no filesystem
/// accepts.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "download".to_string(),
        s => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingLog;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Answers one GET with `body`, advertising `content_length` bytes, then
    /// closes the connection.
    async fn file_server(content_length: usize, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut raw = Vec::new();
            while !String::from_utf8_lossy(&raw).contains("\r\n\r\n") {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: {content_length}\r\nConnection: close\r\n\r\n"
            );
            sock.write_all(head.as_bytes()).await.unwrap();
            sock.write_all(body).await.unwrap();
            sock.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    fn saver(dir: &Path) -> HttpFileSaver {
        HttpFileSaver::new(
            reqwest::Client::new(),
            dir.to_path_buf(),
            Arc::new(RecordingLog::default()),
        )
    }

    #[tokio::test]
    async fn test_fetch_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = file_server(5, b"hello").await;

        let path = saver(dir.path())
            .fetch(&format!("{base}/download_file/x/b.mp3"), "b.mp3")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("b.mp3"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert!(!dir.path().join("b.mp3.part").exists());
    }

    #[tokio::test]
    async fn test_truncated_body_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = file_server(1000, b"only a few bytes").await;

        let result = saver(dir.path())
            .fetch(&format!("{base}/download_file/x/b.mp3"), "b.mp3")
            .await;
        assert!(result.is_err());
        assert!(!dir.path().join("b.mp3.part").exists());
        assert!(!dir.path().join("b.mp3").exists());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("x/b.mp3"), "b.mp3");
        assert_eq!(sanitize_file_name("..\\evil?.mp3"), "evil_.mp3");
        assert_eq!(sanitize_file_name(".."), "download");
        assert_eq!(sanitize_file_name("Song #1.flac"), "Song #1.flac");
    }
}
