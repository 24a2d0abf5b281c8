//! Download submission lifecycle.
//!
//! `Idle -> Submitting -> Done -> Idle`, with one request in flight at most.
//! The form controls are disabled for the whole cycle and always restored,
//! whichever way the request ends.

pub mod diversion;
pub mod form;

use crate::error::SessionError;
use crate::gateway::Gateway;
use crate::gateway::models::{AudioFormat, DownloadReceipt, DownloadRequest};
use crate::session_log::{LogSink, Severity};
use diversion::Diversion;
use form::{Control, FormView, SUBMIT_LABEL, WORKING_LABEL};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Submitting,
    Done,
}

/// What `begin` decided to do with a submitted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Query was blank; nothing happened.
    Rejected,
    /// Another request is still in flight.
    Busy,
    /// Sentinel query. `started` is false when a run was already active.
    Diverted { started: bool },
    /// Controls are disabled; the caller must send this request and report
    /// back through `finish`.
    Started(DownloadRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Rejected,
    Busy,
    Diverted { started: bool },
    Finished(Result<DownloadReceipt, SessionError>),
}

pub struct DownloadController<F> {
    form: F,
    log: Arc<dyn LogSink>,
    diversion: Diversion,
    sentinel: String,
    phase: DownloadPhase,
}

impl<F: FormView> DownloadController<F> {
    pub fn new(form: F, log: Arc<dyn LogSink>, diversion: Diversion, sentinel: &str) -> Self {
        Self {
            form,
            log,
            diversion,
            sentinel: sentinel.trim().to_lowercase(),
            phase: DownloadPhase::Idle,
        }
    }

    pub fn phase(&self) -> DownloadPhase {
        self.phase
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn diversion_active(&self) -> bool {
        self.diversion.is_active()
    }

    fn is_sentinel(&self, query: &str) -> bool {
        !self.sentinel.is_empty() && query.to_lowercase() == self.sentinel
    }

    pub fn begin(&mut self, query: &str, format: AudioFormat, no_cover: bool) -> Submission {
        let query = query.trim();
        if query.is_empty() {
            tracing::debug!("blank query ignored");
            return Submission::Rejected;
        }
        if self.phase != DownloadPhase::Idle {
            self.log
                .append("a download is already running", Severity::Warning);
            return Submission::Busy;
        }

        if self.is_sentinel(query) {
            let started = self.diversion.trigger();
            if started {
                self.log.append("diversion engaged", Severity::Warning);
            } else {
                self.log.append("diversion already running", Severity::Info);
            }
            self.form.clear_query();
            return Submission::Diverted { started };
        }

        self.phase = DownloadPhase::Submitting;
        for control in Control::ALL {
            self.form.set_disabled(control, true);
        }
        self.form.set_submit_label(WORKING_LABEL);
        self.log.append(
            &format!(
                "starting: {query} [light mode: {}]",
                if no_cover { "yes" } else { "no" }
            ),
            Severity::Info,
        );

        Submission::Started(DownloadRequest {
            query: query.to_string(),
            no_cover,
            format,
        })
    }

    /// Records the result of the request handed out by `begin` and restores
    /// the form. Safe to call in any phase.
    pub fn finish(
        &mut self,
        result: Result<DownloadReceipt, SessionError>,
    ) -> Result<DownloadReceipt, SessionError> {
        if self.phase != DownloadPhase::Submitting {
            tracing::warn!(phase = ?self.phase, "download result arrived outside a submission");
        }
        self.phase = DownloadPhase::Done;

        match &result {
            Ok(receipt) => {
                let suffix = if receipt.is_playlist { " (playlist)" } else { "" };
                self.log
                    .append(&format!("done: {}{suffix}", receipt.title), Severity::Success);
            }
            Err(e) => self.log.append(&format!("failed: {e}"), Severity::Error),
        }

        for control in Control::ALL {
            self.form.set_disabled(control, false);
        }
        self.form.set_submit_label(SUBMIT_LABEL);
        self.form.clear_query();
        self.form.focus_query();
        self.phase = DownloadPhase::Idle;

        result
    }

    /// One full cycle: `begin`, the gateway call, `finish`.
    pub async fn submit<G: Gateway>(
        &mut self,
        gateway: &G,
        query: &str,
        format: AudioFormat,
        no_cover: bool,
    ) -> SubmitOutcome {
        match self.begin(query, format, no_cover) {
            Submission::Rejected => SubmitOutcome::Rejected,
            Submission::Busy => SubmitOutcome::Busy,
            Submission::Diverted { started } => SubmitOutcome::Diverted { started },
            Submission::Started(req) => {
                let result = send_request(gateway.clone(), req).await;
                SubmitOutcome::Finished(self.finish(result))
            }
        }
    }
}

/// Runs the gateway call on its own task so that a panic inside it comes back
/// as an `Err` instead of unwinding through the controller.
pub async fn send_request<G: Gateway>(
    gateway: G,
    req: DownloadRequest,
) -> Result<DownloadReceipt, SessionError> {
    match tokio::spawn(async move { gateway.submit_download(&req).await }).await {
        Ok(result) => result,
        Err(e) => Err(SessionError::Network(format!("request aborted: {e}"))),
    }
}
