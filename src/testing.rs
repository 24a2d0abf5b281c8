//! Collaborator doubles shared by the unit tests.

use crate::download::diversion::Decor;
use crate::download::form::{Control, FormState, FormView};
use crate::error::SessionError;
use crate::gateway::models::{DownloadReceipt, DownloadRequest, Track};
use crate::gateway::{Gateway, Routes};
use crate::player::AudioOutput;
use crate::saver::FileSaver;
use crate::session_log::{LogSink, Severity};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Disabled(Control, bool),
    Label(String),
    ClearQuery,
    FocusQuery,
    DownloadRequest(DownloadRequest),
    LibraryFetch,
}

/// Ordered record of everything the form and gateway doubles saw.
#[derive(Debug, Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<Step>>>);

impl Timeline {
    pub fn push(&self, step: Step) {
        self.0.lock().unwrap().push(step);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub struct RecordingForm {
    state: FormState,
    timeline: Timeline,
}

impl RecordingForm {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            state: FormState::default(),
            timeline,
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }
}

impl FormView for RecordingForm {
    fn set_disabled(&mut self, control: Control, disabled: bool) {
        self.timeline.push(Step::Disabled(control, disabled));
        self.state.set_disabled(control, disabled);
    }

    fn set_submit_label(&mut self, label: &str) {
        self.timeline.push(Step::Label(label.to_string()));
        self.state.set_submit_label(label);
    }

    fn clear_query(&mut self) {
        self.timeline.push(Step::ClearQuery);
        self.state.clear_query();
    }

    fn focus_query(&mut self) {
        self.timeline.push(Step::FocusQuery);
        self.state.focus_query();
    }
}

#[derive(Clone)]
pub struct MockGateway {
    routes: Routes,
    timeline: Timeline,
    download: Arc<Mutex<Result<DownloadReceipt, SessionError>>>,
    library: Arc<Mutex<VecDeque<Result<Vec<Track>, SessionError>>>>,
    panic_on_download: bool,
}

impl MockGateway {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            routes: Routes::new("http://127.0.0.1:5000"),
            timeline,
            download: Arc::new(Mutex::new(Ok(DownloadReceipt {
                title: "Untitled".into(),
                is_playlist: false,
            }))),
            library: Arc::new(Mutex::new(VecDeque::new())),
            panic_on_download: false,
        }
    }

    pub fn with_download(self, result: Result<&str, SessionError>) -> Self {
        *self.download.lock().unwrap() = result.map(|title| DownloadReceipt {
            title: title.to_string(),
            is_playlist: false,
        });
        self
    }

    /// Queued; each fetch takes the next one.
    pub fn with_library(self, result: Result<Vec<Track>, SessionError>) -> Self {
        self.library.lock().unwrap().push_back(result);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_download = true;
        self
    }
}

impl Gateway for MockGateway {
    fn routes(&self) -> &Routes {
        &self.routes
    }

    async fn submit_download(&self, req: &DownloadRequest) -> Result<DownloadReceipt, SessionError> {
        self.timeline.push(Step::DownloadRequest(req.clone()));
        if self.panic_on_download {
            panic!("gateway blew up");
        }
        self.download.lock().unwrap().clone()
    }

    async fn fetch_library(&self) -> Result<Vec<Track>, SessionError> {
        self.timeline.push(Step::LibraryFetch);
        self.library
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Debug, Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<(String, Severity)>>,
}

impl RecordingLog {
    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|(m, _)| m.contains(needle))
    }

    pub fn contains_with(&self, needle: &str, severity: Severity) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|(m, s)| m.contains(needle) && *s == severity)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl LogSink for RecordingLog {
    fn append(&self, message: &str, severity: Severity) {
        self.entries
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }
}

#[derive(Debug, Default)]
pub struct CountingDecor(AtomicUsize);

impl CountingDecor {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Decor for CountingDecor {
    fn strike(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    SetSource(String),
    Play,
    Pause,
}

#[derive(Debug)]
pub struct MockAudio {
    calls: Vec<AudioCall>,
    source: Option<String>,
    paused: bool,
    refuse_play: bool,
}

impl Default for MockAudio {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            source: None,
            paused: true,
            refuse_play: false,
        }
    }
}

impl MockAudio {
    /// Rejects every `play`, like a browser blocking autoplay.
    pub fn refusing() -> Self {
        Self {
            refuse_play: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.clone()
    }

    pub fn source(&self) -> Option<String> {
        self.source.clone()
    }

    /// The current file played to its end.
    pub fn finish(&mut self) {
        self.paused = true;
    }
}

impl AudioOutput for MockAudio {
    async fn set_source(&mut self, url: &str) -> Result<(), SessionError> {
        self.calls.push(AudioCall::SetSource(url.to_string()));
        self.source = Some(url.to_string());
        self.paused = true;
        Ok(())
    }

    async fn play(&mut self) -> Result<(), SessionError> {
        self.calls.push(AudioCall::Play);
        if self.refuse_play {
            return Err(SessionError::Playback("autoplay blocked".into()));
        }
        self.paused = false;
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), SessionError> {
        self.calls.push(AudioCall::Pause);
        self.paused = true;
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

#[derive(Debug, Default)]
pub struct RecordingSaver {
    saved: Mutex<Vec<(String, String)>>,
}

impl RecordingSaver {
    pub fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().unwrap().clone()
    }
}

impl FileSaver for RecordingSaver {
    fn save(&self, url: &str, file_name: &str) {
        self.saved
            .lock()
            .unwrap()
            .push((url.to_string(), file_name.to_string()));
    }
}
