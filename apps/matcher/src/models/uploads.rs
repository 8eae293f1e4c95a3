use std::collections::BTreeMap;

use serde::Deserialize;

use super::{null_as_default, CvEntryId, JdId};

/// POST /uploads/jd
#[derive(Debug, Clone, Deserialize)]
pub struct JdUploadResponse {
    #[serde(default)]
    pub jd_id: Option<JdId>,
    #[serde(default)]
    pub message: Option<String>,
}

/// POST /uploads/cvs
///
/// Succeeds even when some files failed; `errors` maps file name to message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CvUploadResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub processed_cv_ids: Vec<CvEntryId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: BTreeMap<String, String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Renders a per-file error map as `name: message; name: message`.
pub fn describe_file_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(file, message)| format!("{file}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}
