use super::actions::Command;
use crate::error::SessionError;
use crate::gateway::models::{DownloadReceipt, Track};
use crate::library::FetchTicket;

#[derive(Debug, Clone)]
pub enum Event {
    Input(Command),
    Player(PlayerEvent),
    Network(NetworkEvent),
}

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Paused(bool),
    Position { seconds: f64 },
    Duration { seconds: f64 },
    Ended,
    Error(String),
}

#[derive(Debug, Clone)]
pub enum NetworkEvent {
    DownloadFinished(Result<DownloadReceipt, SessionError>),
    LibraryFetched {
        ticket: FetchTicket,
        result: Result<Vec<Track>, SessionError>,
    },
}
