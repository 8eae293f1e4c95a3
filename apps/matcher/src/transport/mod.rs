//! Transport adapter, the single point of contact with the matching server.
//!
//! No page or coordinator builds a request itself; they all hold an
//! `Arc<dyn MatcherApi>`. Production uses [`http::HttpTransport`]; tests swap
//! in a scripted double.
//!
//! This layer performs exactly one round-trip per call: no retries, no
//! timeouts beyond the HTTP client's own defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::models::analysis::{ResultsResponse, StartAnalysisResponse, StatusResponse};
use crate::models::requirements::{RequirementSet, RequirementsResponse, SaveRequirementsResponse};
use crate::models::uploads::{CvUploadResponse, JdUploadResponse};
use crate::models::{CvEntryId, JdId, SessionId};

pub mod http;
#[cfg(test)]
pub mod mock;

/// Accepted Job Description formats.
pub const JD_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];
/// Accepted CV formats; a ZIP archive may bundle several CVs.
pub const CV_EXTENSIONS: &[&str] = &["pdf", "docx", "zip", "txt"];

/// The logical server operations, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SubmitJd,
    SubmitCvs,
    FetchRequirements,
    SaveRequirements,
    StartAnalysis,
    FetchStatus,
    FetchResults,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::SubmitJd => "JD upload",
            Operation::SubmitCvs => "CVs upload",
            Operation::FetchRequirements => "JD requirements fetch",
            Operation::SaveRequirements => "JD requirements save",
            Operation::StartAnalysis => "analysis start",
            Operation::FetchStatus => "analysis status fetch",
            Operation::FetchResults => "results fetch",
        })
    }
}

/// Normalized failure of a single call. `Display` is the one human-readable
/// message shown to the user.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response at all; the raw client error is the best message available.
    #[error("{source}")]
    Network {
        operation: Operation,
        source: reqwest::Error,
    },

    /// Non-2xx response. `message` is the body's `error` field when present,
    /// otherwise `Server error during <operation>`.
    #[error("{message}")]
    Api {
        operation: Operation,
        status: u16,
        message: String,
        /// Per-file failures some endpoints attach as `details`.
        details: BTreeMap<String, String>,
    },

    #[error("Unexpected response during {operation}: {source}")]
    Decode {
        operation: Operation,
        source: serde_json::Error,
    },
}

impl TransportError {
    pub fn operation(&self) -> Operation {
        match self {
            TransportError::Network { operation, .. }
            | TransportError::Api { operation, .. }
            | TransportError::Decode { operation, .. } => *operation,
        }
    }

    pub fn details(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            TransportError::Api { details, .. } if !details.is_empty() => Some(details),
            _ => None,
        }
    }
}

/// Receives raw `(bytes_loaded, bytes_total)` samples while an upload body is sent.
pub trait ByteProgress: Send + Sync {
    fn on_bytes(&self, loaded: u64, total: u64);
}

/// A local file staged for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Rejects files whose extension is not in `allowed`.
    pub fn ensure_extension(&self, allowed: &[&str]) -> Result<(), String> {
        match self.extension() {
            Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
            Some(ext) => Err(format!(
                "{}: unsupported file type .{ext}. Allowed: {}",
                self.file_name,
                allowed.join(", ")
            )),
            None => Err(format!(
                "{}: file has no extension. Allowed: {}",
                self.file_name,
                allowed.join(", ")
            )),
        }
    }
}

/// The server collaborator as seen by the client.
#[async_trait]
pub trait MatcherApi: Send + Sync {
    async fn submit_jd(
        &self,
        file: UploadFile,
        progress: Arc<dyn ByteProgress>,
    ) -> Result<JdUploadResponse, TransportError>;

    async fn submit_cvs(
        &self,
        files: Vec<UploadFile>,
        progress: Arc<dyn ByteProgress>,
    ) -> Result<CvUploadResponse, TransportError>;

    async fn fetch_requirements(&self, jd_id: JdId)
        -> Result<RequirementsResponse, TransportError>;

    async fn save_requirements(
        &self,
        jd_id: JdId,
        requirements: &RequirementSet,
    ) -> Result<SaveRequirementsResponse, TransportError>;

    async fn start_analysis(
        &self,
        jd_id: JdId,
        cv_entry_ids: &[CvEntryId],
    ) -> Result<StartAnalysisResponse, TransportError>;

    async fn fetch_status(&self, session_id: SessionId) -> Result<StatusResponse, TransportError>;

    async fn fetch_results(&self, session_id: SessionId)
        -> Result<ResultsResponse, TransportError>;
}
