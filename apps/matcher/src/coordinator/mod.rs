//! Analysis-session coordinator: drives one CV batch from file selection to a
//! terminal session status.
//!
//! ```text
//! Idle ─submit─▶ UploadingCvs ─▶ StartingAnalysis ─▶ Polling ─▶ Terminal(status)
//!                     │                 │               │
//!                     └────────────▶ ErrorAtStep(step) ◀┘
//! ```
//!
//! Every run owns a child of the coordinator's cancellation token. A new file
//! selection, an external cancel or dropping the coordinator cancels it; after
//! that no callback of the old run touches the published snapshot.
//!
//! Observers follow progress through a `watch` channel of [`AnalysisSnapshot`].

pub mod scheduler;

use std::collections::BTreeMap;
use std::mem;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::analysis::{SessionStatus, StatusResponse};
use crate::models::uploads::describe_file_errors;
use crate::models::{CvEntryId, JdId, SessionId};
use crate::progress::UploadProgressTracker;
use crate::router::Location;
use crate::transport::{MatcherApi, TransportError, UploadFile, CV_EXTENSIONS};

use self::scheduler::{PollExit, PollScheduler};

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Upload,
    Start,
    Poll,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Upload => "upload",
            Step::Start => "start",
            Step::Poll => "poll",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum CoordinatorState {
    #[default]
    Idle,
    UploadingCvs,
    StartingAnalysis,
    Polling {
        session_id: SessionId,
        status: SessionStatus,
    },
    Terminal {
        session_id: SessionId,
        status: SessionStatus,
    },
    /// Absorbing until the next submit (upload/start) or file selection.
    /// A poll failure keeps the session id so results can still be checked.
    ErrorAtStep {
        step: Step,
        message: String,
        session_id: Option<SessionId>,
    },
}

impl CoordinatorState {
    pub fn name(&self) -> &'static str {
        match self {
            CoordinatorState::Idle => "idle",
            CoordinatorState::UploadingCvs => "uploading_cvs",
            CoordinatorState::StartingAnalysis => "starting_analysis",
            CoordinatorState::Polling { .. } => "polling",
            CoordinatorState::Terminal { .. } => "terminal",
            CoordinatorState::ErrorAtStep { .. } => "error",
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            CoordinatorState::Polling { session_id, .. }
            | CoordinatorState::Terminal { session_id, .. } => Some(*session_id),
            CoordinatorState::ErrorAtStep { session_id, .. } => *session_id,
            _ => None,
        }
    }
}

/// Everything an observer needs to render the upload/analysis page.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSnapshot {
    pub state: CoordinatorState,
    pub selected_files: Vec<String>,
    /// `None` until the first determinate sample; render as indeterminate.
    pub upload_percent: Option<u8>,
    pub analysis_percent: u8,
    pub status_line: Option<String>,
    /// Per-file upload failures, shown without blocking the run.
    pub file_errors: BTreeMap<String, String>,
    pub processed_cv_ids: Vec<CvEntryId>,
    pub stalled: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    /// Consecutive unchanged polls before a run is flagged as stalled; 0 disables.
    pub stall_polls: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            stall_polls: 3,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Coordinator
// ────────────────────────────────────────────────────────────────────────────

pub struct AnalysisCoordinator {
    api: Arc<dyn MatcherApi>,
    jd_id: JdId,
    settings: PollSettings,
    selection: Vec<UploadFile>,
    /// Lives as long as the coordinator; cancelled on teardown.
    scope: CancellationToken,
    /// Child of `scope`, replaced whenever a run is superseded.
    run_token: CancellationToken,
    snapshot: Arc<watch::Sender<AnalysisSnapshot>>,
    last_observed: Option<(SessionStatus, u32)>,
    unchanged_polls: u32,
}

impl AnalysisCoordinator {
    pub fn new(api: Arc<dyn MatcherApi>, jd_id: JdId, settings: PollSettings) -> Self {
        let scope = CancellationToken::new();
        let run_token = scope.child_token();
        let (snapshot, _) = watch::channel(AnalysisSnapshot::default());

        Self {
            api,
            jd_id,
            settings,
            selection: Vec::new(),
            scope,
            run_token,
            snapshot: Arc::new(snapshot),
            last_observed: None,
            unchanged_polls: 0,
        }
    }

    pub fn jd_id(&self) -> JdId {
        self.jd_id
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> AnalysisSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> CoordinatorState {
        self.snapshot.borrow().state.clone()
    }

    /// Cancelling this tears the coordinator down: the active poll stops at
    /// once and no later run can start.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.scope.clone()
    }

    /// Where the current session's results can be viewed, once there is one.
    pub fn results_location(&self) -> Option<Location> {
        self.state().session_id().map(Location::results)
    }

    /// Replaces the file selection. Any run in progress is superseded and its
    /// session identifiers are cleared.
    pub fn select_files(&mut self, files: Vec<UploadFile>) {
        self.supersede();
        self.selection = files;
        let names = self.selection.iter().map(|f| f.file_name.clone()).collect();
        self.snapshot.send_modify(|s| s.selected_files = names);
    }

    /// Uploads the selection and starts the analysis. Returns the new session
    /// id; the coordinator is then in `Polling`.
    pub async fn submit(&mut self) -> Result<SessionId, AppError> {
        if self.scope.is_cancelled() {
            return Err(AppError::Superseded);
        }

        match self.state() {
            CoordinatorState::Idle => {}
            CoordinatorState::Polling { session_id, .. } => {
                return Err(AppError::validation(format!(
                    "Analysis session {session_id} is already running"
                )));
            }
            CoordinatorState::Terminal { .. }
            | CoordinatorState::ErrorAtStep { step: Step::Poll, .. } => {
                return Err(AppError::validation(
                    "This analysis run has finished. Select CV files again to start a new run.",
                ));
            }
            // Failed upload or start, or a run abandoned mid-flight: retry fresh.
            _ => self.supersede(),
        }

        if self.selection.is_empty() {
            return Err(AppError::validation(
                "Please upload at least one CV file or a ZIP archive.",
            ));
        }
        for file in &self.selection {
            file.ensure_extension(CV_EXTENSIONS)
                .map_err(AppError::Validation)?;
        }

        let cv_ids = self.upload().await?;
        self.start(cv_ids).await
    }

    async fn upload(&mut self) -> Result<Vec<CvEntryId>, AppError> {
        self.transition(CoordinatorState::UploadingCvs);
        self.snapshot.send_modify(|s| {
            s.upload_percent = None;
            s.file_errors.clear();
            s.message = Some("Step 1/2: Uploading CVs...".to_string());
        });

        let tracker = Arc::new(self.upload_tracker());
        let files = self.selection.clone();
        info!(jd_id = self.jd_id, files = files.len(), "Uploading CVs");

        // An in-flight upload is never cancelled; a superseded result is discarded.
        let outcome = self.api.submit_cvs(files, tracker.clone()).await;
        if self.run_token.is_cancelled() {
            debug!("Discarding CV upload result of a superseded run");
            return Err(AppError::Superseded);
        }

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                if let Some(details) = e.details() {
                    let details = details.clone();
                    self.snapshot.send_modify(|s| s.file_errors = details);
                }
                return Err(self.fail(Step::Upload, e, None));
            }
        };
        tracker.finish();
        info!(
            processed = response.processed_cv_ids.len(),
            message = response.message.as_deref().unwrap_or_default(),
            "CV upload answered"
        );

        if !response.errors.is_empty() {
            warn!(
                failed = response.errors.len(),
                processed = response.processed_cv_ids.len(),
                "Some CVs failed to upload"
            );
            let errors = response.errors.clone();
            self.snapshot.send_modify(|s| s.file_errors = errors);
        }

        if response.processed_cv_ids.is_empty() {
            let message = if response.errors.is_empty() {
                "CVs upload failed to return any processed IDs.".to_string()
            } else {
                format!(
                    "CV upload failed for all files. Errors: {}",
                    describe_file_errors(&response.errors)
                )
            };
            self.mark_failed(Step::Upload, message.clone(), None);
            return Err(AppError::Workflow(message));
        }

        let ids = response.processed_cv_ids;
        let message = if response.errors.is_empty() {
            "CVs uploaded successfully.".to_string()
        } else {
            format!(
                "CVs uploaded. Some CVs had errors: {}",
                describe_file_errors(&response.errors)
            )
        };
        let processed = ids.clone();
        self.snapshot.send_modify(|s| {
            s.processed_cv_ids = processed;
            s.message = Some(message);
        });
        Ok(ids)
    }

    async fn start(&mut self, cv_ids: Vec<CvEntryId>) -> Result<SessionId, AppError> {
        self.transition(CoordinatorState::StartingAnalysis);
        let message = format!(
            "Step 2/2: CVs uploaded. Starting analysis for JD ID: {}",
            self.jd_id
        );
        self.snapshot.send_modify(|s| s.message = Some(message));

        let outcome = self.api.start_analysis(self.jd_id, &cv_ids).await;
        if self.run_token.is_cancelled() {
            debug!("Discarding analysis start of a superseded run");
            return Err(AppError::Superseded);
        }
        let response = outcome.map_err(|e| self.fail(Step::Start, e, None))?;

        let session_id = response.analysis_session_id;
        info!(
            session_id,
            status = %response.status,
            cvs = cv_ids.len(),
            message = response.message.as_deref().unwrap_or_default(),
            "Analysis session started"
        );
        let message = format!(
            "Analysis session {session_id} started. Status: {}. Polling for progress...",
            response.status
        );
        self.transition(CoordinatorState::Polling {
            session_id,
            status: response.status,
        });
        self.snapshot.send_modify(|s| {
            s.analysis_percent = 0;
            s.message = Some(message);
        });
        Ok(session_id)
    }

    /// Polls the session until it reaches a terminal status, a poll fails, or
    /// the run is cancelled.
    pub async fn poll_to_completion(&mut self) -> Result<SessionStatus, AppError> {
        let session_id = match self.state() {
            CoordinatorState::Polling { session_id, .. } => session_id,
            CoordinatorState::Terminal { status, .. } => return Ok(status),
            _ => {
                return Err(AppError::validation(
                    "No analysis session is running. Upload CVs first.",
                ))
            }
        };

        let scheduler = PollScheduler::new(self.settings.interval, self.run_token.clone());
        let api = Arc::clone(&self.api);
        let mut outcome = None;

        let exit = scheduler
            .run(
                move || {
                    let api = Arc::clone(&api);
                    async move { api.fetch_status(session_id).await }
                },
                |result| match result {
                    Ok(status) => match self.observe_status(session_id, status) {
                        Some(terminal) => {
                            outcome = Some(Ok(terminal));
                            ControlFlow::Break(())
                        }
                        None => ControlFlow::Continue(()),
                    },
                    Err(e) => {
                        outcome = Some(Err(self.fail(Step::Poll, e, Some(session_id))));
                        ControlFlow::Break(())
                    }
                },
            )
            .await;

        match exit {
            PollExit::Finished => outcome.unwrap_or(Err(AppError::Superseded)),
            PollExit::Cancelled => {
                info!(session_id, "Polling cancelled");
                self.supersede();
                Err(AppError::Superseded)
            }
        }
    }

    /// Applies one status observation. Returns the status once it is terminal.
    fn observe_status(
        &mut self,
        session_id: SessionId,
        response: StatusResponse,
    ) -> Option<SessionStatus> {
        if response.analysis_session_id.is_some_and(|id| id != session_id) {
            warn!(
                session_id,
                served_session_id = ?response.analysis_session_id,
                "Status response names a different session"
            );
        }
        let percent = response.progress_percent();
        let status = response.status;
        let analyzed = response.cvs_analyzed_count;
        let total = response.total_cvs_to_analyze;
        debug!(session_id, %status, analyzed, total, "Polled analysis status");

        let observation = (status.clone(), analyzed);
        if self.last_observed.as_ref() == Some(&observation) {
            self.unchanged_polls += 1;
        } else {
            self.unchanged_polls = 0;
            self.last_observed = Some(observation);
        }
        let stalled = self.settings.stall_polls > 0 && self.unchanged_polls >= self.settings.stall_polls;
        if stalled && self.unchanged_polls == self.settings.stall_polls {
            warn!(
                session_id,
                %status,
                analyzed,
                polls = self.unchanged_polls + 1,
                "Analysis progress has not changed"
            );
        }

        let status_line = format!("Analyzing: {analyzed} / {total} CVs processed. Status: {status}");
        self.snapshot.send_modify(|s| {
            s.analysis_percent = percent;
            s.status_line = Some(status_line);
            s.stalled = stalled;
        });

        if status.is_terminal() {
            info!(session_id, %status, "Analysis finished");
            self.run_token.cancel();
            let message =
                format!("Analysis finished. Session ID: {session_id}. Final Status: {status}.");
            self.transition(CoordinatorState::Terminal {
                session_id,
                status: status.clone(),
            });
            self.snapshot.send_modify(|s| s.message = Some(message));
            return Some(status);
        }

        self.transition(CoordinatorState::Polling { session_id, status });
        None
    }

    // ── helpers ─────────────────────────────────────────────────────────────

    /// Cancels the current run and starts over from `Idle`, keeping the selection.
    fn supersede(&mut self) {
        self.run_token.cancel();
        self.run_token = self.scope.child_token();
        self.last_observed = None;
        self.unchanged_polls = 0;

        let previous = self.state();
        if previous != CoordinatorState::Idle {
            info!(jd_id = self.jd_id, from = previous.name(), "Run superseded");
        }
        self.snapshot.send_modify(|s| {
            let selected_files = mem::take(&mut s.selected_files);
            *s = AnalysisSnapshot {
                selected_files,
                ..AnalysisSnapshot::default()
            };
        });
    }

    fn upload_tracker(&self) -> UploadProgressTracker {
        let token = self.run_token.clone();
        let snapshot = Arc::clone(&self.snapshot);
        UploadProgressTracker::new("cvs", move |percent| {
            if !token.is_cancelled() {
                snapshot.send_modify(|s| s.upload_percent = Some(percent));
            }
        })
    }

    fn transition(&self, next: CoordinatorState) {
        let from = self.snapshot.borrow().state.name();
        if from != next.name() {
            info!(jd_id = self.jd_id, from, to = next.name(), "Coordinator transition");
        }
        self.snapshot.send_modify(|s| s.state = next);
    }

    /// Marks `step` failed with a transport error and returns it as an [`AppError`].
    fn fail(&mut self, step: Step, error: TransportError, session_id: Option<SessionId>) -> AppError {
        let message = match step {
            Step::Poll => format!("Error polling analysis status: {error}"),
            Step::Upload | Step::Start => format!("Error during CV upload or analysis: {error}"),
        };
        warn!(
            step = step.as_str(),
            operation = %error.operation(),
            error = %error,
            "Workflow step failed"
        );
        self.mark_failed(step, message, session_id);
        AppError::Transport(error)
    }

    fn mark_failed(&mut self, step: Step, message: String, session_id: Option<SessionId>) {
        self.run_token.cancel();
        self.transition(CoordinatorState::ErrorAtStep {
            step,
            message: message.clone(),
            session_id,
        });
        self.snapshot.send_modify(|s| s.message = Some(message));
    }
}

impl Drop for AnalysisCoordinator {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{self, Call, MockApi};
    use tokio::time::Instant;

    const JD: JdId = 7;

    fn cv(name: &str) -> UploadFile {
        UploadFile::new(name, vec![0u8; 1024])
    }

    fn coordinator(api: &Arc<MockApi>) -> AnalysisCoordinator {
        let mut coordinator = AnalysisCoordinator::new(api.clone(), JD, PollSettings::default());
        coordinator.select_files(vec![cv("alice.pdf"), cv("bad.docx")]);
        coordinator
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_upload_failure_proceeds_with_processed_ids() {
        let api = MockApi::new();
        api.on_cv_upload(Ok(mock::cvs_uploaded(&[101, 102], &[("bad.docx", "corrupt file")])))
            .on_start(Ok(mock::started(12, "initiating")));

        let mut coordinator = coordinator(&api);
        let session_id = coordinator.submit().await.unwrap();

        assert_eq!(session_id, 12);
        assert_eq!(
            api.calls(),
            vec![
                Call::SubmitCvs(vec!["alice.pdf".to_string(), "bad.docx".to_string()]),
                Call::StartAnalysis(JD, vec![101, 102]),
            ]
        );
        let snapshot = coordinator.snapshot();
        assert_eq!(
            snapshot.state,
            CoordinatorState::Polling {
                session_id: 12,
                status: SessionStatus::Initiating
            }
        );
        assert_eq!(snapshot.file_errors["bad.docx"], "corrupt file");
        assert_eq!(snapshot.processed_cv_ids, vec![101, 102]);
        assert_eq!(snapshot.upload_percent, Some(100));
        assert_eq!(coordinator.results_location(), Some(Location::results(12)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_processed_ids_never_starts_analysis() {
        let api = MockApi::new();
        api.on_cv_upload(Ok(mock::cvs_uploaded(&[], &[("bad.docx", "corrupt file")])));

        let mut coordinator = coordinator(&api);
        let err = coordinator.submit().await.unwrap_err();

        assert!(matches!(err, AppError::Workflow(_)));
        assert_eq!(
            err.to_string(),
            "CV upload failed for all files. Errors: bad.docx: corrupt file"
        );
        assert_eq!(api.start_calls(), 0);
        assert!(matches!(
            coordinator.state(),
            CoordinatorState::ErrorAtStep { step: Step::Upload, session_id: None, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_transport_failure_never_starts_analysis() {
        let api = MockApi::new();
        api.on_cv_upload(mock::failure(500, "CV processing failed for all attempted files"));

        let mut coordinator = coordinator(&api);
        let err = coordinator.submit().await.unwrap_err();

        assert_eq!(err.to_string(), "CV processing failed for all attempted files");
        assert_eq!(api.start_calls(), 0);
        assert_eq!(
            coordinator.snapshot().message.as_deref(),
            Some("Error during CV upload or analysis: CV processing failed for all attempted files")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_selection_is_rejected_without_calls() {
        let api = MockApi::new();
        let mut coordinator = AnalysisCoordinator::new(api.clone(), JD, PollSettings::default());

        let err = coordinator.submit().await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Please upload at least one CV file or a ZIP archive.");
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_file_type_is_rejected_without_calls() {
        let api = MockApi::new();
        let mut coordinator = AnalysisCoordinator::new(api.clone(), JD, PollSettings::default());
        coordinator.select_files(vec![cv("alice.pdf"), cv("photo.png")]);

        let err = coordinator.submit().await.unwrap_err();
        assert!(err.to_string().contains("photo.png: unsupported file type .png"));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_can_be_retried_as_a_fresh_run() {
        let api = MockApi::new();
        api.on_cv_upload(Ok(mock::cvs_uploaded(&[101], &[])))
            .on_start(mock::failure(500, "Server error during analysis start"))
            .on_start(Ok(mock::started(13, "initiating")));

        let mut coordinator = coordinator(&api);
        coordinator.submit().await.unwrap_err();
        assert!(matches!(
            coordinator.state(),
            CoordinatorState::ErrorAtStep { step: Step::Start, .. }
        ));

        assert_eq!(coordinator.submit().await.unwrap(), 13);
        assert_eq!(api.start_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_recomputed_on_every_poll_and_stops_at_terminal() {
        let api = MockApi::new();
        api.on_cv_upload(Ok(mock::cvs_uploaded(&[101, 102, 103, 104, 105], &[])))
            .on_start(Ok(mock::started(12, "initiating")))
            .on_status(Ok(mock::status("in_progress", 0, 5)))
            .on_status(Ok(mock::status("in_progress", 3, 5)))
            .on_status(Ok(mock::status("completed", 5, 5)));

        let mut coordinator = coordinator(&api);
        let mut rx = coordinator.subscribe();
        let collector = tokio::spawn(async move {
            let mut seen: Vec<u8> = Vec::new();
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                if snapshot.status_line.is_some() && seen.last() != Some(&snapshot.analysis_percent) {
                    seen.push(snapshot.analysis_percent);
                }
            }
            seen
        });

        coordinator.submit().await.unwrap();
        let started = Instant::now();
        let status = coordinator.poll_to_completion().await.unwrap();

        assert_eq!(status, SessionStatus::Completed);
        assert_eq!(started.elapsed(), Duration::from_secs(9));
        assert_eq!(api.status_calls(), 3);
        assert_eq!(
            coordinator.state(),
            CoordinatorState::Terminal {
                session_id: 12,
                status: SessionStatus::Completed
            }
        );
        assert_eq!(
            coordinator.snapshot().message.as_deref(),
            Some("Analysis finished. Session ID: 12. Final Status: completed.")
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.status_calls(), 3);

        drop(coordinator);
        assert_eq!(collector.await.unwrap(), vec![0, 60, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_keeps_session_id_and_stops_polling() {
        let api = MockApi::new();
        api.on_cv_upload(Ok(mock::cvs_uploaded(&[101], &[])))
            .on_start(Ok(mock::started(12, "initiating")))
            .on_status(Ok(mock::status("in_progress", 0, 1)))
            .on_status(mock::failure(500, "Database error"));

        let mut coordinator = coordinator(&api);
        coordinator.submit().await.unwrap();
        let err = coordinator.poll_to_completion().await.unwrap_err();

        assert!(matches!(err, AppError::Transport(_)));
        assert_eq!(api.status_calls(), 2);
        assert!(matches!(
            coordinator.state(),
            CoordinatorState::ErrorAtStep { step: Step::Poll, session_id: Some(12), .. }
        ));
        assert_eq!(coordinator.results_location(), Some(Location::results(12)));
        assert_eq!(
            coordinator.snapshot().message.as_deref(),
            Some("Error polling analysis status: Database error")
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.status_calls(), 2);

        let err = coordinator.submit().await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling_immediately_and_clears_the_session() {
        let api = MockApi::new();
        api.on_cv_upload(Ok(mock::cvs_uploaded(&[101], &[])))
            .on_start(Ok(mock::started(12, "initiating")))
            .on_status(Ok(mock::status("in_progress", 0, 1)));

        let mut coordinator = coordinator(&api);
        let handle = coordinator.cancel_handle();
        coordinator.submit().await.unwrap();

        let (result, _) = tokio::join!(coordinator.poll_to_completion(), async {
            tokio::time::sleep(Duration::from_secs(7)).await;
            handle.cancel();
        });

        assert!(matches!(result, Err(AppError::Superseded)));
        assert_eq!(api.status_calls(), 2);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert!(coordinator.results_location().is_none());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.status_calls(), 2);
        assert!(matches!(coordinator.submit().await, Err(AppError::Superseded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_upload_result_is_discarded() {
        let api = MockApi::new();
        api.on_cv_upload(Ok(mock::cvs_uploaded(&[101], &[])))
            .delay_uploads(Duration::from_secs(5));

        let mut coordinator = coordinator(&api);
        let handle = coordinator.cancel_handle();

        let (result, _) = tokio::join!(coordinator.submit(), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        });

        assert!(matches!(result, Err(AppError::Superseded)));
        assert_eq!(api.start_calls(), 0);
        // The sample reported before cancellation is the only one that landed.
        assert_eq!(coordinator.snapshot().upload_percent, Some(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_selection_clears_a_finished_run() {
        let api = MockApi::new();
        api.on_cv_upload(Ok(mock::cvs_uploaded(&[101], &[])))
            .on_start(Ok(mock::started(12, "initiating")))
            .on_status(Ok(mock::status("completed", 1, 1)));

        let mut coordinator = coordinator(&api);
        coordinator.submit().await.unwrap();
        coordinator.poll_to_completion().await.unwrap();
        assert!(coordinator.submit().await.is_err());

        coordinator.select_files(vec![cv("carol.txt")]);
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.state, CoordinatorState::Idle);
        assert_eq!(snapshot.selected_files, vec!["carol.txt"]);
        assert!(snapshot.processed_cv_ids.is_empty());
        assert!(snapshot.message.is_none());

        coordinator.submit().await.unwrap();
        assert_eq!(api.start_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_status_fetches_never_overlap() {
        let api = MockApi::new();
        api.on_cv_upload(Ok(mock::cvs_uploaded(&[101], &[])))
            .on_start(Ok(mock::started(12, "initiating")))
            .on_status(Ok(mock::status("in_progress", 0, 1)))
            .on_status(Ok(mock::status("in_progress", 0, 1)))
            .on_status(Ok(mock::status("completed_with_errors", 1, 1)))
            .delay_status(Duration::from_secs(5));

        let mut coordinator = coordinator(&api);
        coordinator.submit().await.unwrap();
        let status = coordinator.poll_to_completion().await.unwrap();

        assert_eq!(status, SessionStatus::CompletedWithErrors);
        assert_eq!(api.status_calls(), 3);
        assert_eq!(api.max_status_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_polls_flag_a_stall_until_progress_resumes() {
        let api = MockApi::new();
        let settings = PollSettings {
            interval: Duration::from_secs(3),
            stall_polls: 2,
        };
        let mut coordinator = AnalysisCoordinator::new(api.clone(), JD, settings);

        let mut flags = Vec::new();
        for (analyzed, status) in [(1, "in_progress"), (1, "in_progress"), (1, "in_progress"), (2, "in_progress")] {
            coordinator.observe_status(12, mock::status(status, analyzed, 5));
            flags.push(coordinator.snapshot().stalled);
        }
        assert_eq!(flags, vec![false, false, true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_keeps_polling() {
        let api = MockApi::new();
        let mut coordinator = AnalysisCoordinator::new(api.clone(), JD, PollSettings::default());

        assert!(coordinator.observe_status(12, mock::status("queued", 0, 5)).is_none());
        assert!(matches!(coordinator.state(), CoordinatorState::Polling { .. }));
        assert_eq!(
            coordinator.observe_status(12, mock::status("error", 0, 5)),
            Some(SessionStatus::Error)
        );
    }

    #[tokio::test]
    async fn test_drop_cancels_the_scope() {
        let api = MockApi::new();
        let coordinator = AnalysisCoordinator::new(api.clone(), JD, PollSettings::default());
        let handle = coordinator.cancel_handle();
        drop(coordinator);
        assert!(handle.is_cancelled());
    }
}
