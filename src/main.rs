mod config;
mod console;
mod download;
mod error;
mod gateway;
mod input;
mod library;
mod player;
mod saver;
mod session;
mod session_log;
#[cfg(test)]
mod testing;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{ConsoleDecor, ConsoleForm};
use download::diversion::{Decor, Diversion};
use download::{DownloadController, SubmitOutcome};
use gateway::http::HttpGateway;
use gateway::models::AudioFormat;
use gateway::{Gateway, Routes};
use player::mpv::MpvHandle;
use saver::HttpFileSaver;
use session_log::{LogSink, SessionLog};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "hammerdeck", version, about = "Client for a self-hosted music download server")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the interactive shell (default).
    Shell,
    /// Ask the server to fetch a track or playlist (headless).
    Download {
        query: String,
        #[arg(short, long, value_enum)]
        format: Option<AudioFormat>,
        /// Skip cover art; `--no-cover=false` overrides the config.
        #[arg(short, long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        no_cover: Option<bool>,
    },
    /// Print the server library (headless).
    Library {
        /// Keep re-fetching every N seconds and print the list when it changes.
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Print the stream and download URLs for a library path.
    Urls { path: String },
    /// Save a library file into the save folder (headless).
    Save { path: String },
    /// Point the config at another server.
    Server { url: String },

    /// Audio output device management (mpv).
    Audio {
        #[command(subcommand)]
        cmd: AudioCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AudioCommand {
    /// List mpv audio devices.
    List,
    /// Set mpv audio device (name as shown in list).
    Set { device: String },
    /// Clear mpv audio device override.
    Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            let gateway = HttpGateway::new(&cfg.server.base_url, cfg.server.timeout())?;
            let (tx, rx) = mpsc::channel(256);

            let audio = match MpvHandle::spawn(
                tx.clone(),
                cfg.player.audio_device.as_deref(),
                cfg.player.volume,
                Some(&cfg.paths.data_dir.join("mpv.log")),
            )
            .await
            {
                Ok(mpv) => Some(mpv),
                Err(e) => {
                    tracing::warn!(error = %format!("{e:#}"), "mpv unavailable, playback disabled");
                    None
                }
            };

            let log = Arc::new(SessionLog::new());
            let sink: Arc<dyn LogSink> = log.clone();
            let saver = Arc::new(HttpFileSaver::new(
                gateway.http().clone(),
                cfg.paths.save_dir.clone(),
                sink,
            ));
            let mut session = session::Session::new(
                &cfg,
                gateway,
                audio,
                log,
                saver,
                Arc::new(ConsoleDecor),
            );
            session.run(tx, rx).await?;
        }
        Command::Download {
            query,
            format,
            no_cover,
        } => {
            let gateway = HttpGateway::new(&cfg.server.base_url, cfg.server.timeout())?;
            let log = Arc::new(SessionLog::new());
            let sink: Arc<dyn LogSink> = log.clone();
            let decor: Arc<dyn Decor> = Arc::new(ConsoleDecor);
            let diversion = Diversion::new(
                decor,
                sink.clone(),
                cfg.diversion.duration(),
                cfg.diversion.period(),
            );
            let mut controller =
                DownloadController::new(ConsoleForm::new(), sink, diversion, &cfg.download.sentinel);

            let format = format.unwrap_or(cfg.download.format);
            let no_cover = no_cover.unwrap_or(cfg.download.no_cover);
            match controller.submit(&gateway, &query, format, no_cover).await {
                SubmitOutcome::Rejected => return Err(error::SessionError::Validation.into()),
                SubmitOutcome::Busy => {}
                SubmitOutcome::Diverted { .. } => {
                    while controller.diversion_active() {
                        tokio::time::sleep(cfg.diversion.period()).await;
                    }
                    println!();
                }
                SubmitOutcome::Finished(result) => {
                    let receipt = result?;
                    let kind = if receipt.is_playlist { "playlist" } else { "track" };
                    println!("{kind}: {}", receipt.title);
                }
            }
        }
        Command::Library { watch } => {
            let gateway = HttpGateway::new(&cfg.server.base_url, cfg.server.timeout())?;
            let mut store = library::LibraryStore::new(Arc::new(SessionLog::new()));
            let mut shown = store.load(&gateway).await?;
            println!("{}", console::render_library(&shown, None));

            if let Some(secs) = watch {
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(secs.max(1)));
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    // Failures are already in the log; the last list stays shown.
                    let Ok(tracks) = store.refresh(&gateway).await else {
                        continue;
                    };
                    if tracks != shown {
                        println!("\n{}", console::render_library(&tracks, None));
                        shown = tracks;
                    }
                }
            }
        }
        Command::Urls { path } => {
            let routes = Routes::new(&cfg.server.base_url);
            println!("stream:   {}", routes.stream_url(&path));
            println!("download: {}", routes.download_url(&path));
        }
        Command::Save { path } => {
            let gateway = HttpGateway::new(&cfg.server.base_url, cfg.server.timeout())?;
            let saver = HttpFileSaver::new(
                gateway.http().clone(),
                cfg.paths.save_dir.clone(),
                Arc::new(SessionLog::new()),
            );
            let url = gateway.routes().download_url(&path);
            let target = saver
                .fetch(&url, gateway::models::file_name_of(&path))
                .await?;
            println!("saved: {}", target.display());
        }
        Command::Server { url } => {
            let mut cfg = cfg;
            cfg.server.base_url = url;
            config::save(&cfg, cli.config.as_deref()).context("save config")?;
            println!("Updated server address in config.");
        }
        Command::Audio { cmd } => match cmd {
            AudioCommand::List => {
                let out = tokio::process::Command::new("mpv")
                    .args(["--audio-device=help", "--no-video", "--idle=no"])
                    .output()
                    .await
                    .context("run mpv --audio-device=help")?;
                // mpv prints help to stdout.
                print!("{}", String::from_utf8_lossy(&out.stdout));
                eprint!("{}", String::from_utf8_lossy(&out.stderr));
            }
            AudioCommand::Set { device } => {
                let mut cfg = cfg;
                cfg.player.audio_device = Some(device);
                config::save(&cfg, cli.config.as_deref()).context("save config")?;
                println!("Updated audio device in config.");
            }
            AudioCommand::Clear => {
                let mut cfg = cfg;
                cfg.player.audio_device = None;
                config::save(&cfg, cli.config.as_deref()).context("save config")?;
                println!("Cleared audio device override.");
            }
        },
    }

    Ok(())
}
