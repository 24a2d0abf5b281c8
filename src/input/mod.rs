use crate::gateway::models::AudioFormat;
use crate::session::actions::Command;
use crate::session::events::Event;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  get [-f flac|mp3|m4a|wav] [-n] <query>   download (-n: skip cover art)
  lib                                      show the library (fetched once)
  refresh                                  re-fetch the library
  play <n>                                 play track n
  pause                                    pause / resume
  next | prev                              skip
  save <n>                                 save track n to the save folder
  status                                   now playing
  log                                      recent log entries
  help | quit";

/// Reads stdin line by line and forwards parsed commands. EOF quits.
pub fn spawn_input_task(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let cmd = match lines.next_line().await {
                Ok(Some(line)) => match parse_line(&line) {
                    Some(cmd) => cmd,
                    None => continue,
                },
                Ok(None) => Command::Quit,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    Command::Quit
                }
            };
            let quit = cmd == Command::Quit;
            if tx.send(Event::Input(cmd)).await.is_err() || quit {
                break;
            }
        }
    });
}

pub fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "get" | "dl" | "download" => parse_download(rest),
        "lib" | "library" => Command::Library,
        "refresh" | "r" => Command::Refresh,
        "play" | "p" => match parse_track_number(rest) {
            Ok(i) => Command::Play(i),
            Err(e) => Command::Invalid(e),
        },
        "save" | "s" => match parse_track_number(rest) {
            Ok(i) => Command::Save(i),
            Err(e) => Command::Invalid(e),
        },
        "pause" => Command::TogglePause,
        "next" | "n" => Command::Next,
        "prev" | "previous" => Command::Prev,
        "status" | "st" => Command::Status,
        "log" => Command::Log,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command: {other}")),
    };
    Some(cmd)
}

fn parse_download(rest: &str) -> Command {
    let mut format = None;
    let mut no_cover = None;
    let mut rest = rest.trim();

    loop {
        let (word, tail) = split_word(rest);
        match word {
            "-n" | "--no-cover" => {
                no_cover = Some(true);
                rest = tail;
            }
            "-f" | "--format" => {
                let (value, tail) = split_word(tail);
                if value.is_empty() {
                    return Command::Invalid("missing format".into());
                }
                match value.parse::<AudioFormat>() {
                    Ok(f) => format = Some(f),
                    Err(e) => return Command::Invalid(e),
                }
                rest = tail;
            }
            _ => break,
        }
    }

    // The query itself is kept as typed, inner spacing included.
    Command::Download {
        query: rest.to_string(),
        format,
        no_cover,
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, tail)) => (word, tail.trim_start()),
        None => (s, ""),
    }
}

/// Tracks are numbered from 1 on screen.
fn parse_track_number(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("not a track number: {s:?}"))?;
    n.checked_sub(1)
        .ok_or_else(|| "track numbers start at 1".to_string())
}
