pub mod mpv;

use crate::error::SessionError;
use crate::gateway::Routes;
use crate::gateway::models::Track;
use crate::saver::FileSaver;
use crate::session_log::{LogSink, Severity};
use std::sync::Arc;

/// The single audio element. Only `PlaybackController` drives it.
#[allow(async_fn_in_trait)]
pub trait AudioOutput {
    async fn set_source(&mut self, url: &str) -> Result<(), SessionError>;
    async fn play(&mut self) -> Result<(), SessionError>;
    async fn pause(&mut self) -> Result<(), SessionError>;
    fn is_paused(&self) -> bool;
}

/// A missing backend refuses to play.
impl<A: AudioOutput> AudioOutput for Option<A> {
    async fn set_source(&mut self, url: &str) -> Result<(), SessionError> {
        match self {
            Some(a) => a.set_source(url).await,
            None => Err(SessionError::Playback("no audio output".into())),
        }
    }

    async fn play(&mut self) -> Result<(), SessionError> {
        match self {
            Some(a) => a.play().await,
            None => Err(SessionError::Playback("no audio output".into())),
        }
    }

    async fn pause(&mut self) -> Result<(), SessionError> {
        match self {
            Some(a) => a.pause().await,
            None => Ok(()),
        }
    }

    fn is_paused(&self) -> bool {
        self.as_ref().is_none_or(|a| a.is_paused())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub current_index: Option<usize>,
    pub is_playing: bool,
    /// Position within the current track, 0.0..=1.0.
    pub progress: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_index: None,
            is_playing: false,
            progress: 0.0,
        }
    }
}

pub struct PlaybackController<A> {
    audio: A,
    routes: Routes,
    playlist: Arc<[Track]>,
    state: PlaybackState,
    /// Length of the loaded source in seconds; 0 until the output reports it.
    duration: f64,
    log: Arc<dyn LogSink>,
    saver: Arc<dyn FileSaver>,
}

impl<A: AudioOutput> PlaybackController<A> {
    pub fn new(audio: A, routes: Routes, log: Arc<dyn LogSink>, saver: Arc<dyn FileSaver>) -> Self {
        Self {
            audio,
            routes,
            playlist: Arc::from(Vec::new()),
            state: PlaybackState::default(),
            duration: 0.0,
            log,
            saver,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn playlist(&self) -> &[Track] {
        &self.playlist
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.state.current_index.and_then(|i| self.playlist.get(i))
    }

    /// The list row marked as active. Always the current index.
    pub fn highlighted(&self) -> Option<usize> {
        self.state.current_index
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Swap in a new library snapshot. The current track is followed by path;
    /// if it is gone the selection is cleared and the output paused.
    pub async fn set_playlist(&mut self, tracks: Arc<[Track]>) {
        let current_path = self.current_track().map(|t| t.path.clone());
        self.playlist = tracks;
        let Some(path) = current_path else {
            return;
        };
        self.state.current_index = self.playlist.iter().position(|t| t.path == path);
        if self.state.current_index.is_some() {
            return;
        }

        tracing::info!(path = %path, "current track left the library");
        if !self.audio.is_paused()
            && let Err(e) = self.audio.pause().await
        {
            self.log.append(&e.to_string(), Severity::Error);
        }
        self.state.is_playing = false;
        self.state.progress = 0.0;
        self.duration = 0.0;
    }

    /// Out-of-range indices are ignored. Returns whether a track was selected.
    pub async fn play(&mut self, index: usize) -> bool {
        let Some(track) = self.playlist.get(index) else {
            tracing::debug!(index, len = self.playlist.len(), "play index out of range");
            return false;
        };
        let url = self.routes.stream_url(&track.path);
        let title = track.title.clone();

        self.state.current_index = Some(index);
        self.state.progress = 0.0;
        self.duration = 0.0;

        match self.start(&url).await {
            Ok(()) => {
                tracing::info!(index, title = %title, "playing");
                self.state.is_playing = true;
            }
            Err(e) => {
                self.log.append(&e.to_string(), Severity::Error);
                self.state.is_playing = false;
            }
        }
        true
    }

    async fn start(&mut self, url: &str) -> Result<(), SessionError> {
        self.audio.set_source(url).await?;
        self.audio.play().await
    }

    pub async fn toggle_pause(&mut self) {
        if self.state.current_index.is_none() {
            return;
        }
        if self.audio.is_paused() {
            match self.audio.play().await {
                Ok(()) => self.state.is_playing = true,
                Err(e) => {
                    self.log.append(&e.to_string(), Severity::Error);
                    self.state.is_playing = false;
                }
            }
        } else {
            match self.audio.pause().await {
                Ok(()) => self.state.is_playing = false,
                Err(e) => self.log.append(&e.to_string(), Severity::Error),
            }
        }
    }

    /// With nothing selected this starts at the first track.
    pub async fn next(&mut self) -> bool {
        let index = self.state.current_index.map_or(0, |i| i + 1);
        self.play(index).await
    }

    pub async fn previous(&mut self) -> bool {
        match self.state.current_index.and_then(|i| i.checked_sub(1)) {
            Some(index) => self.play(index).await,
            None => false,
        }
    }

    /// Auto-advance. At the end of the list playback just stops, and so does
    /// a track that is no longer in the list.
    pub async fn on_track_ended(&mut self) {
        if self.state.current_index.is_none() {
            self.state.is_playing = false;
            return;
        }
        if !self.next().await {
            self.state.is_playing = !self.audio.is_paused();
            tracing::debug!("end of playlist");
        }
    }

    /// Pause state reported by the output itself.
    pub fn on_paused_changed(&mut self, paused: bool) {
        if self.state.current_index.is_some() {
            self.state.is_playing = !paused;
        }
    }

    /// The output learned the length of the loaded source.
    pub fn on_duration(&mut self, seconds: f64) {
        self.duration = seconds;
    }

    /// Ignored until the duration is known.
    pub fn on_progress(&mut self, current_time: f64, duration: f64) -> Option<f64> {
        if !duration.is_finite() || duration <= 0.0 || !current_time.is_finite() {
            return None;
        }
        self.state.progress = (current_time / duration).clamp(0.0, 1.0);
        Some(self.state.progress)
    }

    pub fn save_to_device(&self, path: &str) {
        let url = self.routes.download_url(path);
        let file_name = crate::gateway::models::file_name_of(path);
        self.saver.save(&url, file_name);
        self.log
            .append(&format!("download started: {path}"), Severity::Success);
    }
}
