use std::collections::VecDeque;
use std::sync::Mutex;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: OffsetDateTime,
    pub message: String,
    pub severity: Severity,
}

impl LogEntry {
    /// `[HH:MM:SS] message`
    pub fn display(&self) -> String {
        format!(
            "[{:02}:{:02}:{:02}] {}",
            self.timestamp.hour(),
            self.timestamp.minute(),
            self.timestamp.second(),
            self.message
        )
    }
}

/// Where controllers report what happened. Append-only.
pub trait LogSink: Send + Sync {
    fn append(&self, message: &str, severity: Severity);
}

/// In-memory session log, newest entry first.
#[derive(Debug, Default)]
pub struct SessionLog {
    entries: Mutex<VecDeque<LogEntry>>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for SessionLog {
    fn append(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => {
                tracing::info!(severity = severity.label(), "{message}")
            }
            Severity::Warning => tracing::warn!("{message}"),
            Severity::Error => tracing::error!("{message}"),
        }

        let timestamp =
            OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let entry = LogEntry {
            timestamp,
            message: message.to_string(),
            severity,
        };
        let mut entries = match self.entries.lock() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push_front(entry);
    }
}
