use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One audio file in the backend's download folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub folder: String,
    /// Relative `/`-separated path under the download folder.
    pub path: String,
}

impl Track {
    /// Files at the top of the download folder are grouped as "Singles" and
    /// shown without a folder label.
    pub fn folder_label(&self) -> Option<&str> {
        if self.folder == SINGLES_FOLDER || self.folder.is_empty() {
            None
        } else {
            Some(&self.folder)
        }
    }

    /// Last path segment, used as the saved file name.
    pub fn file_name(&self) -> &str {
        file_name_of(&self.path)
    }
}

pub const SINGLES_FOLDER: &str = "Singles";

pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Flac,
    Mp3,
    M4a,
    Wav,
}

impl AudioFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Flac => "flac",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flac" => Ok(AudioFormat::Flac),
            "mp3" => Ok(AudioFormat::Mp3),
            "m4a" => Ok(AudioFormat::M4a),
            "wav" => Ok(AudioFormat::Wav),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

/// A validated submission. Only exists for one submit cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub query: String,
    pub no_cover: bool,
    pub format: AudioFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReceipt {
    pub title: String,
    pub is_playlist: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum DownloadReply {
    Success {
        #[serde(default)]
        title: String,
        #[serde(default)]
        is_playlist: bool,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum LibraryReply {
    Success {
        #[serde(default)]
        tracks: Vec<Track>,
        #[allow(dead_code)]
        #[serde(default)]
        root: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}
