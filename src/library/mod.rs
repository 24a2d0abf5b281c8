//! The track list fetched from the backend.
//!
//! Every fetch is tagged with a generation number and only the newest
//! generation is applied, so a slow response can never overwrite a newer one.
//! The playlist is an immutable snapshot, swapped whole.

use crate::error::SessionError;
use crate::gateway::Gateway;
use crate::gateway::models::Track;
use crate::session_log::{LogSink, Severity};
use std::sync::Arc;

/// Handed out when a fetch starts, given back with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Applied(Arc<[Track]>),
    Failed(SessionError),
    /// A newer fetch was started after this one; result dropped.
    Stale,
}

pub struct LibraryStore {
    tracks: Arc<[Track]>,
    loaded: bool,
    generation: u64,
    in_flight: Option<u64>,
    log: Arc<dyn LogSink>,
}

impl LibraryStore {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self {
            tracks: Arc::from(Vec::new()),
            loaded: false,
            generation: 0,
            in_flight: None,
            log,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn tracks(&self) -> Arc<[Track]> {
        Arc::clone(&self.tracks)
    }

    /// `None` when already loaded or a fetch is already running.
    pub fn begin_load(&mut self) -> Option<FetchTicket> {
        if self.loaded || self.in_flight.is_some() {
            return None;
        }
        Some(self.next_ticket())
    }

    /// Always starts a new fetch, superseding any that is running.
    pub fn begin_refresh(&mut self) -> FetchTicket {
        if let Some(old) = self.in_flight {
            tracing::debug!(superseded = old, "library refresh supersedes running fetch");
        }
        self.next_ticket()
    }

    fn next_ticket(&mut self) -> FetchTicket {
        self.generation += 1;
        self.in_flight = Some(self.generation);
        FetchTicket {
            generation: self.generation,
        }
    }

    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Track>, SessionError>,
    ) -> Completion {
        if ticket.generation != self.generation {
            tracing::debug!(
                generation = ticket.generation,
                latest = self.generation,
                "discarding stale library response"
            );
            return Completion::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(tracks) => {
                tracing::info!(count = tracks.len(), "library loaded");
                self.tracks = Arc::from(tracks);
                self.loaded = true;
                Completion::Applied(self.tracks())
            }
            Err(e) => {
                self.log.append(&format!("library: {e}"), Severity::Error);
                Completion::Failed(e)
            }
        }
    }

    /// Fetches unless a previous load succeeded.
    pub async fn load<G: Gateway>(&mut self, gateway: &G) -> Result<Arc<[Track]>, SessionError> {
        match self.begin_load() {
            Some(ticket) => self.run(gateway, ticket).await,
            None => Ok(self.tracks()),
        }
    }

    pub async fn refresh<G: Gateway>(&mut self, gateway: &G) -> Result<Arc<[Track]>, SessionError> {
        let ticket = self.begin_refresh();
        self.run(gateway, ticket).await
    }

    async fn run<G: Gateway>(
        &mut self,
        gateway: &G,
        ticket: FetchTicket,
    ) -> Result<Arc<[Track]>, SessionError> {
        let result = gateway.fetch_library().await;
        match self.complete(ticket, result) {
            Completion::Applied(tracks) => Ok(tracks),
            Completion::Failed(e) => Err(e),
            Completion::Stale => Ok(self.tracks()),
        }
    }
}
