use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{null_as_default, CvEntryId, JdId, SessionId};

// ────────────────────────────────────────────────────────────────────────────
// Status labels
// ────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a server-side analysis session.
/// Unknown labels are kept verbatim in `Unrecognized` and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    Pending,
    Initiating,
    Processing,
    InProgress,
    Completed,
    CompletedWithErrors,
    Error,
    Unrecognized(String),
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Initiating => "initiating",
            SessionStatus::Processing => "processing",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::CompletedWithErrors => "completed_with_errors",
            SessionStatus::Error => "error",
            SessionStatus::Unrecognized(raw) => raw,
        }
    }

    /// No further state change happens after a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::CompletedWithErrors | SessionStatus::Error
        )
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Unrecognized(String::new())
    }
}

impl From<String> for SessionStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => SessionStatus::Pending,
            "initiating" => SessionStatus::Initiating,
            "processing" => SessionStatus::Processing,
            "in_progress" => SessionStatus::InProgress,
            "completed" => SessionStatus::Completed,
            "completed_with_errors" => SessionStatus::CompletedWithErrors,
            "error" => SessionStatus::Error,
            _ => SessionStatus::Unrecognized(raw),
        }
    }
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Unrecognized(raw) if raw.is_empty() => f.write_str("unknown"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Per-candidate verdict. The server may add labels beyond the three it documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MatchStatus {
    Match,
    NoMatch,
    Error,
    Other(String),
}

impl MatchStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MatchStatus::Match => "Match",
            MatchStatus::NoMatch => "No Match",
            MatchStatus::Error => "Error",
            MatchStatus::Other(raw) => raw,
        }
    }

    /// Label shown to the user; a missing status reads `N/A`.
    pub fn label(&self) -> &str {
        match self {
            MatchStatus::Other(raw) if raw.is_empty() => "N/A",
            other => other.as_str(),
        }
    }
}

impl Default for MatchStatus {
    fn default() -> Self {
        MatchStatus::Other(String::new())
    }
}

impl From<String> for MatchStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Match" => MatchStatus::Match,
            "No Match" => MatchStatus::NoMatch,
            "Error" => MatchStatus::Error,
            _ => MatchStatus::Other(raw),
        }
    }
}

impl From<MatchStatus> for String {
    fn from(status: MatchStatus) -> Self {
        status.as_str().to_string()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire records
// ────────────────────────────────────────────────────────────────────────────

/// POST /analysis/start body.
#[derive(Debug, Serialize)]
pub struct StartAnalysisRequest<'a> {
    pub jd_id: JdId,
    pub cv_entry_ids: &'a [CvEntryId],
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartAnalysisResponse {
    pub analysis_session_id: SessionId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: SessionStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// GET /analysis/status/{session_id}: the polled read-only projection.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub analysis_session_id: Option<SessionId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: SessionStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cvs_analyzed_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_cvs_to_analyze: u32,
}

impl StatusResponse {
    /// `round(analyzed * 100 / total)`, or 0 when the total is not known yet.
    pub fn progress_percent(&self) -> u8 {
        if self.total_cvs_to_analyze == 0 {
            return 0;
        }
        let percent =
            (self.cvs_analyzed_count as f64 * 100.0 / self.total_cvs_to_analyze as f64).round();
        percent.clamp(0.0, 100.0) as u8
    }
}

/// Category name → ordered findings. Categories with no findings map to an empty list.
pub type DetailedMatchInfo = BTreeMap<String, Vec<String>>;

/// One candidate's outcome within a session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchResult {
    pub cv_id: CvEntryId,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub match_status: MatchStatus,
    /// Meaningless when `match_status` is `Error`.
    #[serde(default, deserialize_with = "lenient_score")]
    pub numerical_score: Option<f64>,
    #[serde(default, alias = "explanation")]
    pub llm_explanation: Option<String>,
    #[serde(default, deserialize_with = "lenient_findings")]
    pub detailed_match_info: DetailedMatchInfo,
    #[serde(default)]
    pub processed_at: Option<String>,
}

/// GET /analysis/results/{session_id}
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsResponse {
    #[serde(default)]
    pub analysis_session_id: Option<SessionId>,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub jd_id: Option<JdId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: SessionStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub results: Vec<MatchResult>,
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient decoders
// ────────────────────────────────────────────────────────────────────────────

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64().filter(|score| score.is_finite()))
}

fn lenient_findings<'de, D>(deserializer: D) -> Result<DetailedMatchInfo, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(map) = Value::deserialize(deserializer)? else {
        return Ok(DetailedMatchInfo::new());
    };

    Ok(map
        .into_iter()
        .map(|(category, findings)| {
            let findings = match findings {
                Value::Array(items) => items.into_iter().filter_map(finding_text).collect(),
                Value::String(s) if !s.trim().is_empty() => vec![s],
                _ => Vec::new(),
            };
            (category, findings)
        })
        .collect())
}

fn finding_text(item: Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Skips records that cannot be decoded at all rather than failing the whole page.
fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<MatchResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<MatchResult>(item) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable result record");
                None
            }
        })
        .collect())
}
