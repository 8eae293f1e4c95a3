//! Workflow router: every pipeline stage has an addressable location carrying
//! the one identifier needed to resume it.
//!
//! Identifiers stay raw strings inside a [`Location`]; a page converts them
//! with [`parse_id`] before any outbound call, so a malformed deep link fails
//! as a validation error instead of silently defaulting.

use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// Pipeline stage, in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    UploadJd,
    RequirementsEditor,
    UploadCvs,
    Results,
}

impl Stage {
    pub const COUNT: usize = 4;

    /// 1-based position in the pipeline.
    pub fn step(&self) -> usize {
        *self as usize + 1
    }

    pub fn title(&self) -> &'static str {
        match self {
            Stage::UploadJd => "Upload Job Description",
            Stage::RequirementsEditor => "Review Requirements",
            Stage::UploadCvs => "Upload CVs & Analyze",
            Stage::Results => "Analysis Results",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Home,
    UploadJd,
    RequirementsEditor { jd_id: String },
    UploadCvs { jd_id: String },
    Results { session_id: String },
}

impl Location {
    pub fn requirements_editor(jd_id: impl ToString) -> Self {
        Location::RequirementsEditor {
            jd_id: jd_id.to_string(),
        }
    }

    pub fn upload_cvs(jd_id: impl ToString) -> Self {
        Location::UploadCvs {
            jd_id: jd_id.to_string(),
        }
    }

    pub fn results(session_id: impl ToString) -> Self {
        Location::Results {
            session_id: session_id.to_string(),
        }
    }

    /// Accepts `/upload-jd`, `upload-jd`, `/results/12/` and so on; the home
    /// page is `/` or the empty string.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let path = raw.trim().trim_matches('/');
        let segments: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').collect()
        };

        match segments.as_slice() {
            [] => Ok(Location::Home),
            ["upload-jd"] => Ok(Location::UploadJd),
            ["jd-requirements-editor", id] if !id.is_empty() => Ok(Location::requirements_editor(id)),
            ["upload-cvs", id] if !id.is_empty() => Ok(Location::upload_cvs(id)),
            ["results", id] if !id.is_empty() => Ok(Location::results(id)),
            _ => Err(AppError::validation(format!(
                "Unknown location '{raw}'. Expected /upload-jd, /jd-requirements-editor/<jd_id>, /upload-cvs/<jd_id> or /results/<session_id>"
            ))),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Location::Home => "/".to_string(),
            Location::UploadJd => "/upload-jd".to_string(),
            Location::RequirementsEditor { jd_id } => format!("/jd-requirements-editor/{jd_id}"),
            Location::UploadCvs { jd_id } => format!("/upload-cvs/{jd_id}"),
            Location::Results { session_id } => format!("/results/{session_id}"),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Location::Home => None,
            Location::UploadJd => Some(Stage::UploadJd),
            Location::RequirementsEditor { .. } => Some(Stage::RequirementsEditor),
            Location::UploadCvs { .. } => Some(Stage::UploadCvs),
            Location::Results { .. } => Some(Stage::Results),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for Location {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s)
    }
}

/// Converts a location identifier to its server-side integer form.
/// Only plain positive integers are accepted: no sign, whitespace or zero.
pub fn parse_id(raw: &str, label: &str) -> Result<i64, AppError> {
    let valid = !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit());
    match raw.parse::<i64>() {
        Ok(id) if valid && id > 0 => Ok(id),
        _ => Err(AppError::validation(format!(
            "Invalid {label} '{raw}': expected a positive integer"
        ))),
    }
}
