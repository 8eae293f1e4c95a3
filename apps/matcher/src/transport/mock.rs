//! Scripted in-memory [`MatcherApi`] for workflow tests.
//!
//! Each operation pops the next scripted outcome; the last outcome of a queue
//! repeats forever so a test can script "in_progress until told otherwise".

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{ByteProgress, MatcherApi, Operation, TransportError, UploadFile};
use crate::models::analysis::{
    ResultsResponse, SessionStatus, StartAnalysisResponse, StatusResponse,
};
use crate::models::requirements::{RequirementSet, RequirementsResponse, SaveRequirementsResponse};
use crate::models::uploads::{CvUploadResponse, JdUploadResponse};
use crate::models::{CvEntryId, JdId, SessionId};

/// A scripted outcome: the payload, or `(http_status, error_message)`.
pub type Scripted<T> = Result<T, (u16, String)>;

pub fn failure<T>(status: u16, message: &str) -> Scripted<T> {
    Err((status, message.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SubmitJd(String),
    SubmitCvs(Vec<String>),
    FetchRequirements(JdId),
    SaveRequirements(JdId, RequirementSet),
    StartAnalysis(JdId, Vec<CvEntryId>),
    FetchStatus(SessionId),
    FetchResults(SessionId),
}

struct Script<T>(Mutex<VecDeque<Scripted<T>>>);

impl<T: Clone> Script<T> {
    fn new() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }

    fn push(&self, outcome: Scripted<T>) {
        self.0.lock().unwrap().push_back(outcome);
    }

    fn next(&self, operation: Operation) -> Result<T, TransportError> {
        let mut queue = self.0.lock().unwrap();
        let outcome = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match outcome {
            Some(Ok(value)) => Ok(value),
            Some(Err((status, message))) => Err(TransportError::Api {
                operation,
                status,
                message,
                details: Default::default(),
            }),
            None => panic!("no scripted response for {operation}"),
        }
    }
}

pub struct MockApi {
    jd_uploads: Script<JdUploadResponse>,
    cv_uploads: Script<CvUploadResponse>,
    requirements: Script<RequirementsResponse>,
    saves: Script<SaveRequirementsResponse>,
    starts: Script<StartAnalysisResponse>,
    statuses: Script<StatusResponse>,
    results: Script<ResultsResponse>,
    calls: Mutex<Vec<Call>>,
    status_delay: Mutex<Option<Duration>>,
    upload_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jd_uploads: Script::new(),
            cv_uploads: Script::new(),
            requirements: Script::new(),
            saves: Script::new(),
            starts: Script::new(),
            statuses: Script::new(),
            results: Script::new(),
            calls: Mutex::new(Vec::new()),
            status_delay: Mutex::new(None),
            upload_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn on_jd_upload(&self, outcome: Scripted<JdUploadResponse>) -> &Self {
        self.jd_uploads.push(outcome);
        self
    }

    pub fn on_cv_upload(&self, outcome: Scripted<CvUploadResponse>) -> &Self {
        self.cv_uploads.push(outcome);
        self
    }

    pub fn on_fetch_requirements(&self, outcome: Scripted<RequirementsResponse>) -> &Self {
        self.requirements.push(outcome);
        self
    }

    pub fn on_save_requirements(&self, outcome: Scripted<SaveRequirementsResponse>) -> &Self {
        self.saves.push(outcome);
        self
    }

    pub fn on_start(&self, outcome: Scripted<StartAnalysisResponse>) -> &Self {
        self.starts.push(outcome);
        self
    }

    pub fn on_status(&self, outcome: Scripted<StatusResponse>) -> &Self {
        self.statuses.push(outcome);
        self
    }

    pub fn on_results(&self, outcome: Scripted<ResultsResponse>) -> &Self {
        self.results.push(outcome);
        self
    }

    /// Every status fetch sleeps this long before answering.
    pub fn delay_status(&self, delay: Duration) -> &Self {
        *self.status_delay.lock().unwrap() = Some(delay);
        self
    }

    /// CV uploads sleep this long after reporting half of their bytes.
    pub fn delay_uploads(&self, delay: Duration) -> &Self {
        *self.upload_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::FetchStatus(_)))
            .count()
    }

    pub fn start_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::StartAnalysis(..)))
            .count()
    }

    pub fn max_status_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response builders
// ────────────────────────────────────────────────────────────────────────────

pub fn jd_uploaded(jd_id: Option<JdId>) -> JdUploadResponse {
    JdUploadResponse {
        jd_id,
        message: Some("JD uploaded and requirements extracted".to_string()),
    }
}

pub fn cvs_uploaded(ids: &[CvEntryId], errors: &[(&str, &str)]) -> CvUploadResponse {
    CvUploadResponse {
        processed_cv_ids: ids.to_vec(),
        errors: errors
            .iter()
            .map(|(file, message)| (file.to_string(), message.to_string()))
            .collect(),
        message: None,
    }
}

pub fn started(session_id: SessionId, status: &str) -> StartAnalysisResponse {
    StartAnalysisResponse {
        analysis_session_id: session_id,
        status: SessionStatus::from(status.to_string()),
        message: None,
    }
}

pub fn status(status: &str, analyzed: u32, total: u32) -> StatusResponse {
    StatusResponse {
        analysis_session_id: None,
        status: SessionStatus::from(status.to_string()),
        cvs_analyzed_count: analyzed,
        total_cvs_to_analyze: total,
    }
}

pub fn requirements(
    jd_filename: Option<&str>,
    education: &[&str],
    experience: &[&str],
    skills: &[&str],
) -> RequirementsResponse {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
    RequirementsResponse {
        jd_id: None,
        jd_filename: jd_filename.map(str::to_string),
        requirements: RequirementSet {
            education: owned(education),
            experience: owned(experience),
            skills: owned(skills),
        },
    }
}

#[async_trait]
impl MatcherApi for MockApi {
    async fn submit_jd(
        &self,
        file: UploadFile,
        progress: Arc<dyn ByteProgress>,
    ) -> Result<JdUploadResponse, TransportError> {
        self.record(Call::SubmitJd(file.file_name.clone()));
        progress.on_bytes(file.len() / 2, file.len());
        self.jd_uploads.next(Operation::SubmitJd)
    }

    async fn submit_cvs(
        &self,
        files: Vec<UploadFile>,
        progress: Arc<dyn ByteProgress>,
    ) -> Result<CvUploadResponse, TransportError> {
        self.record(Call::SubmitCvs(
            files.iter().map(|f| f.file_name.clone()).collect(),
        ));
        let total: u64 = files.iter().map(UploadFile::len).sum();
        progress.on_bytes(total / 2, total);

        let delay = *self.upload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.cv_uploads.next(Operation::SubmitCvs)
    }

    async fn fetch_requirements(
        &self,
        jd_id: JdId,
    ) -> Result<RequirementsResponse, TransportError> {
        self.record(Call::FetchRequirements(jd_id));
        self.requirements.next(Operation::FetchRequirements)
    }

    async fn save_requirements(
        &self,
        jd_id: JdId,
        requirements: &RequirementSet,
    ) -> Result<SaveRequirementsResponse, TransportError> {
        self.record(Call::SaveRequirements(jd_id, requirements.clone()));
        self.saves.next(Operation::SaveRequirements)
    }

    async fn start_analysis(
        &self,
        jd_id: JdId,
        cv_entry_ids: &[CvEntryId],
    ) -> Result<StartAnalysisResponse, TransportError> {
        self.record(Call::StartAnalysis(jd_id, cv_entry_ids.to_vec()));
        self.starts.next(Operation::StartAnalysis)
    }

    async fn fetch_status(&self, session_id: SessionId) -> Result<StatusResponse, TransportError> {
        self.record(Call::FetchStatus(session_id));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.statuses.next(Operation::FetchStatus)
    }

    async fn fetch_results(
        &self,
        session_id: SessionId,
    ) -> Result<ResultsResponse, TransportError> {
        self.record(Call::FetchResults(session_id));
        self.results.next(Operation::FetchResults)
    }
}
