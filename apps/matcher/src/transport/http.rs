use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ByteProgress, MatcherApi, Operation, TransportError, UploadFile};
use crate::models::analysis::{
    ResultsResponse, StartAnalysisRequest, StartAnalysisResponse, StatusResponse,
};
use crate::models::requirements::{
    RequirementSet, RequirementsResponse, SaveRequirementsRequest, SaveRequirementsResponse,
};
use crate::models::uploads::{CvUploadResponse, JdUploadResponse};
use crate::models::{CvEntryId, JdId, SessionId};

/// Upload bodies are handed to the connection in chunks of this size; each
/// chunk produces one progress sample.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    details: Option<Value>,
}

/// `reqwest`-backed implementation of [`MatcherApi`].
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends one request and decodes the success payload, normalizing every
    /// failure into a [`TransportError`].
    async fn send<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        debug!(%operation, "Sending request");

        let response = request
            .send()
            .await
            .map_err(|source| TransportError::Network { operation, source })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::Network { operation, source })?;

        if !status.is_success() {
            let error = api_error(operation, status.as_u16(), &body);
            warn!(%operation, status = status.as_u16(), message = %error, "Server rejected request");
            return Err(error);
        }

        debug!(%operation, status = status.as_u16(), bytes = body.len(), "Request succeeded");
        serde_json::from_slice(&body).map_err(|source| TransportError::Decode { operation, source })
    }
}

#[async_trait]
impl MatcherApi for HttpTransport {
    async fn submit_jd(
        &self,
        file: UploadFile,
        progress: Arc<dyn ByteProgress>,
    ) -> Result<JdUploadResponse, TransportError> {
        let total = file.len();
        let sent = Arc::new(AtomicU64::new(0));
        let form = Form::new().part("file", streamed_part(&file, sent, total, progress));

        self.send(
            Operation::SubmitJd,
            self.client.post(self.url("uploads/jd")).multipart(form),
        )
        .await
    }

    async fn submit_cvs(
        &self,
        files: Vec<UploadFile>,
        progress: Arc<dyn ByteProgress>,
    ) -> Result<CvUploadResponse, TransportError> {
        let total: u64 = files.iter().map(UploadFile::len).sum();
        let sent = Arc::new(AtomicU64::new(0));
        let form = files.iter().fold(Form::new(), |form, file| {
            form.part(
                "files",
                streamed_part(file, Arc::clone(&sent), total, Arc::clone(&progress)),
            )
        });

        self.send(
            Operation::SubmitCvs,
            self.client.post(self.url("uploads/cvs")).multipart(form),
        )
        .await
    }

    async fn fetch_requirements(
        &self,
        jd_id: JdId,
    ) -> Result<RequirementsResponse, TransportError> {
        self.send(
            Operation::FetchRequirements,
            self.client.get(self.url(&format!("jd/{jd_id}/requirements"))),
        )
        .await
    }

    async fn save_requirements(
        &self,
        jd_id: JdId,
        requirements: &RequirementSet,
    ) -> Result<SaveRequirementsResponse, TransportError> {
        self.send(
            Operation::SaveRequirements,
            self.client
                .post(self.url(&format!("jd/{jd_id}/requirements")))
                .json(&SaveRequirementsRequest { requirements }),
        )
        .await
    }

    async fn start_analysis(
        &self,
        jd_id: JdId,
        cv_entry_ids: &[CvEntryId],
    ) -> Result<StartAnalysisResponse, TransportError> {
        self.send(
            Operation::StartAnalysis,
            self.client
                .post(self.url("analysis/start"))
                .json(&StartAnalysisRequest {
                    jd_id,
                    cv_entry_ids,
                }),
        )
        .await
    }

    async fn fetch_status(&self, session_id: SessionId) -> Result<StatusResponse, TransportError> {
        self.send(
            Operation::FetchStatus,
            self.client
                .get(self.url(&format!("analysis/status/{session_id}"))),
        )
        .await
    }

    async fn fetch_results(
        &self,
        session_id: SessionId,
    ) -> Result<ResultsResponse, TransportError> {
        self.send(
            Operation::FetchResults,
            self.client
                .get(self.url(&format!("analysis/results/{session_id}"))),
        )
        .await
    }
}

/// Wraps one file in a streaming multipart part that reports every chunk it
/// yields. `sent` is shared by all parts of one request.
fn streamed_part(
    file: &UploadFile,
    sent: Arc<AtomicU64>,
    total: u64,
    progress: Arc<dyn ByteProgress>,
) -> Part {
    let chunks = split_chunks(&file.bytes);
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        let len = chunk.len() as u64;
        let loaded = sent.fetch_add(len, Ordering::SeqCst) + len;
        progress.on_bytes(loaded, total);
        Ok::<Bytes, std::io::Error>(chunk)
    });

    Part::stream_with_length(Body::wrap_stream(stream), file.len()).file_name(file.file_name.clone())
}

fn split_chunks(bytes: &Bytes) -> Vec<Bytes> {
    (0..bytes.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| bytes.slice(start..(start + UPLOAD_CHUNK_SIZE).min(bytes.len())))
        .collect()
}

/// Builds the error for a non-2xx response: structured `error` field first,
/// then the generic per-operation message.
fn api_error(operation: Operation, status: u16, body: &[u8]) -> TransportError {
    let parsed = serde_json::from_slice::<ErrorBody>(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|b| b.error.as_ref())
        .and_then(error_message)
        .unwrap_or_else(|| format!("Server error during {operation}"));

    let details = parsed
        .and_then(|b| b.details)
        .map(details_map)
        .unwrap_or_default();

    TransportError::Api {
        operation,
        status,
        message,
        details,
    }
}

/// Accepts both `{"error": "msg"}` and `{"error": {"code": .., "message": "msg"}}`.
fn error_message(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("message").and_then(Value::as_str)?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn details_map(value: Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}
