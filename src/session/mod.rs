pub mod actions;
pub mod events;

use crate::config::Config;
use crate::console::{self, ConsoleForm};
use crate::download::diversion::{Decor, Diversion};
use crate::download::{self, DownloadController, Submission};
use crate::error::SessionError;
use crate::gateway::Gateway;
use crate::gateway::models::AudioFormat;
use crate::input;
use crate::library::{Completion, FetchTicket, LibraryStore};
use crate::player::{AudioOutput, PlaybackController};
use crate::saver::FileSaver;
use crate::session_log::{LogSink, SessionLog, Severity};
use actions::Command;
use events::{Event, NetworkEvent, PlayerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

const STATUS_WIDTH: usize = 40;
const LOG_LINES: usize = 20;

/// Owns the three controllers and feeds them events from one loop.
pub struct Session<G, A> {
    gateway: G,
    log: Arc<SessionLog>,
    download: DownloadController<ConsoleForm>,
    library: LibraryStore,
    player: PlaybackController<A>,
    default_format: AudioFormat,
    default_no_cover: bool,
    log_shown: usize,
    should_quit: bool,
}

impl<G: Gateway, A: AudioOutput> Session<G, A> {
    pub fn new(
        cfg: &Config,
        gateway: G,
        audio: A,
        log: Arc<SessionLog>,
        saver: Arc<dyn FileSaver>,
        decor: Arc<dyn Decor>,
    ) -> Self {
        let sink: Arc<dyn LogSink> = log.clone();
        let diversion = Diversion::new(
            decor,
            sink.clone(),
            cfg.diversion.duration(),
            cfg.diversion.period(),
        );
        let download = DownloadController::new(
            ConsoleForm::new(),
            sink.clone(),
            diversion,
            &cfg.download.sentinel,
        );
        let library = LibraryStore::new(sink.clone());
        let player = PlaybackController::new(audio, gateway.routes().clone(), sink, saver);

        Self {
            gateway,
            log,
            download,
            library,
            player,
            default_format: cfg.download.format,
            default_no_cover: cfg.download.no_cover,
            log_shown: 0,
            should_quit: false,
        }
    }

    pub async fn run(
        &mut self,
        tx: mpsc::Sender<Event>,
        mut rx: mpsc::Receiver<Event>,
    ) -> anyhow::Result<()> {
        input::spawn_input_task(tx.clone());
        println!("{}", input::HELP);

        while let Some(ev) = rx.recv().await {
            self.handle_event(ev, &tx).await;
            self.print_new_log_entries();
            if self.should_quit {
                break;
            }
        }
        tracing::info!("session closed");
        Ok(())
    }

    pub async fn handle_event(&mut self, ev: Event, tx: &mpsc::Sender<Event>) {
        match ev {
            Event::Input(cmd) => self.handle_command(cmd, tx).await,
            Event::Player(pe) => self.handle_player(pe).await,
            Event::Network(ne) => self.handle_network(ne).await,
        }
    }

    async fn handle_command(&mut self, cmd: Command, tx: &mpsc::Sender<Event>) {
        match cmd {
            Command::Download {
                query,
                format,
                no_cover,
            } => {
                // A locked form cannot be submitted.
                if self.download.form().state().any_disabled() {
                    println!("a download is already running");
                    return;
                }
                let format = format.unwrap_or(self.default_format);
                let no_cover = no_cover.unwrap_or(self.default_no_cover);
                if let Submission::Started(req) = self.download.begin(&query, format, no_cover) {
                    let gateway = self.gateway.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let result = download::send_request(gateway, req).await;
                        let _ = tx
                            .send(Event::Network(NetworkEvent::DownloadFinished(result)))
                            .await;
                    });
                }
            }
            Command::Library => {
                if self.library.is_loaded() {
                    self.print_library();
                } else if self.library.is_fetching() {
                    println!("library is loading");
                } else if let Some(ticket) = self.library.begin_load() {
                    println!("loading library...");
                    self.spawn_fetch(ticket, tx);
                }
            }
            Command::Refresh => {
                println!("loading library...");
                let ticket = self.library.begin_refresh();
                self.spawn_fetch(ticket, tx);
            }
            Command::Play(index) => {
                if !self.player.play(index).await {
                    println!("no track {}", index + 1);
                }
            }
            Command::TogglePause => self.player.toggle_pause().await,
            Command::Next => {
                self.player.next().await;
            }
            Command::Prev => {
                self.player.previous().await;
            }
            Command::Save(index) => match self.player.playlist().get(index) {
                Some(track) => {
                    let path = track.path.clone();
                    self.player.save_to_device(&path);
                }
                None => println!("no track {}", index + 1),
            },
            Command::Status => {
                let state = self.player.state();
                println!(
                    "{}",
                    console::render_status(&state, self.player.current_track(), STATUS_WIDTH)
                );
            }
            Command::Log => {
                if self.log.is_empty() {
                    println!("log is empty");
                } else {
                    println!("{}", console::render_log(&self.log.entries(), LOG_LINES));
                }
            }
            Command::Help => println!("{}", input::HELP),
            Command::Quit => self.should_quit = true,
            Command::Invalid(msg) => println!("{msg}"),
        }
    }

    fn spawn_fetch(&self, ticket: FetchTicket, tx: &mpsc::Sender<Event>) {
        let gateway = self.gateway.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let fetch = tokio::spawn(async move { gateway.fetch_library().await });
            let result = match fetch.await {
                Ok(result) => result,
                Err(e) => Err(SessionError::Network(format!("request aborted: {e}"))),
            };
            let _ = tx
                .send(Event::Network(NetworkEvent::LibraryFetched { ticket, result }))
                .await;
        });
    }

    async fn handle_network(&mut self, ne: NetworkEvent) {
        match ne {
            NetworkEvent::DownloadFinished(result) => {
                let _ = self.download.finish(result);
            }
            NetworkEvent::LibraryFetched { ticket, result } => {
                match self.library.complete(ticket, result) {
                    Completion::Applied(tracks) => {
                        self.player.set_playlist(tracks).await;
                        self.print_library();
                    }
                    Completion::Failed(e) => println!("library unavailable: {e}"),
                    Completion::Stale => {}
                }
            }
        }
    }

    async fn handle_player(&mut self, pe: PlayerEvent) {
        match pe {
            PlayerEvent::Paused(paused) => self.player.on_paused_changed(paused),
            PlayerEvent::Duration { seconds } => self.player.on_duration(seconds),
            PlayerEvent::Position { seconds } => {
                let duration = self.player.duration();
                self.player.on_progress(seconds, duration);
            }
            PlayerEvent::Ended => self.player.on_track_ended().await,
            PlayerEvent::Error(e) => {
                self.log.append(&e, Severity::Error);
                let paused = self.player.audio().is_paused();
                self.player.on_paused_changed(paused);
            }
        }
    }

    fn print_library(&self) {
        println!(
            "{}",
            console::render_library(self.player.playlist(), self.player.highlighted())
        );
    }

    /// Prints entries added since the last call, oldest first.
    fn print_new_log_entries(&mut self) {
        let entries = self.log.entries();
        let fresh = entries.len().saturating_sub(self.log_shown);
        for entry in entries[..fresh].iter().rev() {
            println!("{}", entry.display());
        }
        self.log_shown = entries.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DownloadPhase;
    use crate::gateway::models::Track;
    use crate::testing::{CountingDecor, MockAudio, MockGateway, RecordingSaver, Step, Timeline};

    fn session(gw: MockGateway) -> Session<MockGateway, MockAudio> {
        Session::new(
            &Config::default(),
            gw,
            MockAudio::default(),
            Arc::new(SessionLog::new()),
            Arc::new(RecordingSaver::default()),
            Arc::new(CountingDecor::default()),
        )
    }

    fn two_tracks() -> Vec<Track> {
        vec![
            Track {
                title: "A".into(),
                folder: "Singles".into(),
                path: "a.mp3".into(),
            },
            Track {
                title: "B".into(),
                folder: "Album X".into(),
                path: "x/b.mp3".into(),
            },
        ]
    }

    async fn pump(
        s: &mut Session<MockGateway, MockAudio>,
        rx: &mut mpsc::Receiver<Event>,
        tx: &mpsc::Sender<Event>,
    ) {
        let ev = rx.recv().await.expect("event");
        s.handle_event(ev, tx).await;
    }

    #[tokio::test]
    async fn test_download_round_trip() {
        let timeline = Timeline::default();
        let gw = MockGateway::new(timeline.clone()).with_download(Ok("Test Song"));
        let mut s = session(gw);
        let (tx, mut rx) = mpsc::channel(16);

        s.handle_event(
            Event::Input(Command::Download {
                query: "test song".into(),
                format: Some(AudioFormat::Mp3),
                no_cover: Some(false),
            }),
            &tx,
        )
        .await;
        assert_eq!(s.download.phase(), DownloadPhase::Submitting);
        assert!(s.download.form().state().any_disabled());

        pump(&mut s, &mut rx, &tx).await;

        assert_eq!(s.download.phase(), DownloadPhase::Idle);
        let form = s.download.form().state();
        assert!(!form.any_disabled());
        assert!(form.query.is_empty());
        let entries = s.log.entries();
        assert!(
            entries
                .iter()
                .any(|e| e.severity == Severity::Success && e.message.contains("Test Song"))
        );
    }

    #[tokio::test]
    async fn test_library_then_play() {
        let timeline = Timeline::default();
        let gw = MockGateway::new(timeline.clone()).with_library(Ok(two_tracks()));
        let mut s = session(gw);
        let (tx, mut rx) = mpsc::channel(16);

        s.handle_event(Event::Input(Command::Library), &tx).await;
        pump(&mut s, &mut rx, &tx).await;
        assert!(s.library.is_loaded());

        // Second visit uses the stored list.
        s.handle_event(Event::Input(Command::Library), &tx).await;
        let fetches = timeline
            .steps()
            .iter()
            .filter(|st| **st == Step::LibraryFetch)
            .count();
        assert_eq!(fetches, 1);

        s.handle_event(Event::Input(Command::Play(1)), &tx).await;
        assert_eq!(s.player.state().current_index, Some(1));
        assert_eq!(
            s.player.audio().source().as_deref(),
            Some("http://127.0.0.1:5000/stream/x/b.mp3")
        );

        // Auto-advance stops at the end of the list.
        s.handle_event(Event::Player(PlayerEvent::Paused(true)), &tx)
            .await;
        s.handle_event(Event::Player(PlayerEvent::Ended), &tx).await;
        assert_eq!(s.player.state().current_index, Some(1));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_playlist() {
        let timeline = Timeline::default();
        let gw = MockGateway::new(timeline.clone())
            .with_library(Ok(two_tracks()))
            .with_library(Err(SessionError::Server("scan failed".into())));
        let mut s = session(gw);
        let (tx, mut rx) = mpsc::channel(16);

        s.handle_event(Event::Input(Command::Library), &tx).await;
        pump(&mut s, &mut rx, &tx).await;
        s.handle_event(Event::Input(Command::Refresh), &tx).await;
        pump(&mut s, &mut rx, &tx).await;

        assert_eq!(s.player.playlist().len(), 2);
        assert_eq!(s.library.tracks().len(), 2);
        assert!(
            s.log
                .entries()
                .iter()
                .any(|e| e.severity == Severity::Error && e.message.contains("scan failed"))
        );
    }

    #[tokio::test]
    async fn test_progress_waits_for_duration() {
        let gw = MockGateway::new(Timeline::default()).with_library(Ok(two_tracks()));
        let mut s = session(gw);
        let (tx, mut rx) = mpsc::channel(16);
        s.handle_event(Event::Input(Command::Library), &tx).await;
        pump(&mut s, &mut rx, &tx).await;
        s.handle_event(Event::Input(Command::Play(0)), &tx).await;

        s.handle_event(Event::Player(PlayerEvent::Position { seconds: 5.0 }), &tx)
            .await;
        assert_eq!(s.player.state().progress, 0.0);

        s.handle_event(Event::Player(PlayerEvent::Duration { seconds: 20.0 }), &tx)
            .await;
        s.handle_event(Event::Player(PlayerEvent::Position { seconds: 5.0 }), &tx)
            .await;
        assert_eq!(s.player.state().progress, 0.25);
    }

    #[tokio::test]
    async fn test_track_change_waits_for_new_duration() {
        let gw = MockGateway::new(Timeline::default()).with_library(Ok(two_tracks()));
        let mut s = session(gw);
        let (tx, mut rx) = mpsc::channel(16);
        s.handle_event(Event::Input(Command::Library), &tx).await;
        pump(&mut s, &mut rx, &tx).await;

        s.handle_event(Event::Input(Command::Play(0)), &tx).await;
        s.handle_event(Event::Player(PlayerEvent::Duration { seconds: 200.0 }), &tx)
            .await;
        s.handle_event(Event::Input(Command::Next), &tx).await;
        assert_eq!(s.player.state().current_index, Some(1));

        s.handle_event(Event::Player(PlayerEvent::Position { seconds: 50.0 }), &tx)
            .await;
        assert_eq!(s.player.state().progress, 0.0);

        s.handle_event(Event::Player(PlayerEvent::Duration { seconds: 100.0 }), &tx)
            .await;
        s.handle_event(Event::Player(PlayerEvent::Position { seconds: 50.0 }), &tx)
            .await;
        assert_eq!(s.player.state().progress, 0.5);
    }

    #[tokio::test]
    async fn test_refresh_dropping_current_track_stops_playback() {
        let gw = MockGateway::new(Timeline::default())
            .with_library(Ok(two_tracks()))
            .with_library(Ok(vec![two_tracks().remove(0)]));
        let mut s = session(gw);
        let (tx, mut rx) = mpsc::channel(16);
        s.handle_event(Event::Input(Command::Library), &tx).await;
        pump(&mut s, &mut rx, &tx).await;
        s.handle_event(Event::Input(Command::Play(1)), &tx).await;

        s.handle_event(Event::Input(Command::Refresh), &tx).await;
        pump(&mut s, &mut rx, &tx).await;
        assert_eq!(s.player.state().current_index, None);
        assert!(!s.player.state().is_playing);

        s.handle_event(Event::Player(PlayerEvent::Ended), &tx).await;
        assert_eq!(s.player.state().current_index, None);
        assert_eq!(
            s.player.audio().source().as_deref(),
            Some("http://127.0.0.1:5000/stream/x/b.mp3")
        );
    }

    #[tokio::test]
    async fn test_blank_download_sends_nothing() {
        let timeline = Timeline::default();
        let mut s = session(MockGateway::new(timeline.clone()));
        let (tx, mut rx) = mpsc::channel(16);

        s.handle_event(
            Event::Input(Command::Download {
                query: "   ".into(),
                format: None,
                no_cover: None,
            }),
            &tx,
        )
        .await;
        assert_eq!(s.download.phase(), DownloadPhase::Idle);
        assert!(rx.try_recv().is_err());
        assert!(timeline.steps().is_empty());
        assert!(s.log.is_empty());
    }
}
