//! Terminal front end: the download form, the decorative effect and plain
//! text rendering of the library, player and log.

use crate::download::diversion::Decor;
use crate::download::form::{Control, FormState, FormView};
use crate::gateway::models::Track;
use crate::player::PlaybackState;
use crate::session_log::{LogEntry, Severity};
use std::io::Write;

const PROGRESS_FULL: &str = "━";
const PROGRESS_EMPTY: &str = "─";
const PROGRESS_HEAD: &str = "●";

/// Download form drawn as status lines on stdout.
#[derive(Debug, Default)]
pub struct ConsoleForm {
    state: FormState,
}

impl ConsoleForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }
}

impl FormView for ConsoleForm {
    fn set_disabled(&mut self, control: Control, disabled: bool) {
        self.state.set_disabled(control, disabled);
    }

    fn set_submit_label(&mut self, label: &str) {
        if self.state.submit_label != label {
            println!("[{label}]");
        }
        self.state.set_submit_label(label);
    }

    fn clear_query(&mut self) {
        self.state.clear_query();
    }

    fn focus_query(&mut self) {
        self.state.focus_query();
    }
}

/// Prints a lightning bolt per strike.
#[derive(Debug, Default)]
pub struct ConsoleDecor;

impl Decor for ConsoleDecor {
    fn strike(&self) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "⚡");
        let _ = out.flush();
    }
}

pub fn render_library(tracks: &[Track], highlighted: Option<usize>) -> String {
    if tracks.is_empty() {
        return "no tracks found".to_string();
    }
    let mut out = String::new();
    for (i, t) in tracks.iter().enumerate() {
        let marker = if highlighted == Some(i) { "▶" } else { " " };
        let folder = t
            .folder_label()
            .map(|f| format!("  [{f}]"))
            .unwrap_or_default();
        out.push_str(&format!("{marker} {:02}. {}{folder}\n", i + 1, t.title));
    }
    out.pop();
    out
}

pub fn render_status(state: &PlaybackState, track: Option<&Track>, width: usize) -> String {
    let Some(track) = track else {
        return "not playing".to_string();
    };
    let icon = if state.is_playing { "⏸" } else { "▶" };
    let folder = track.folder_label().unwrap_or("");
    let bar = render_progress_bar(width, state.progress);
    let pct = (state.progress * 100.0).round() as u32;
    format!(
        "{icon} {}  {folder}\n{bar} {pct:>3}%",
        truncate_str(&track.title, width)
    )
}

pub fn render_log(entries: &[LogEntry], limit: usize) -> String {
    entries
        .iter()
        .take(limit)
        .map(|e| {
            let tag = match e.severity {
                Severity::Info => " ",
                Severity::Success => "+",
                Severity::Warning => "!",
                Severity::Error => "x",
            };
            format!("{tag} {}", e.display())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_progress_bar(width: usize, ratio: f64) -> String {
    if width < 3 {
        return String::new();
    }

    let filled = ((width - 1) as f64 * ratio.clamp(0.0, 1.0)).round() as usize;
    let empty = width.saturating_sub(filled + 1);

    let mut bar = String::with_capacity(width * 3);
    for _ in 0..filled {
        bar.push_str(PROGRESS_FULL);
    }
    bar.push_str(PROGRESS_HEAD);
    for _ in 0..empty {
        bar.push_str(PROGRESS_EMPTY);
    }
    bar
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }

    let char_count: usize = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        s.chars().take(max_len).collect()
    }
}
