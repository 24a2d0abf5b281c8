use crate::gateway::models::AudioFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit a query. Unset options fall back to the configured defaults.
    Download {
        query: String,
        format: Option<AudioFormat>,
        no_cover: Option<bool>,
    },
    /// Open the library view; fetches on first use only.
    Library,
    Refresh,
    /// Zero-based playlist index.
    Play(usize),
    TogglePause,
    Next,
    Prev,
    /// Zero-based playlist index.
    Save(usize),
    Status,
    Log,
    Help,
    Quit,
    Invalid(String),
}
