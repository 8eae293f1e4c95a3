use std::sync::Arc;

use tracing::info;

use crate::errors::AppError;
use crate::progress::UploadProgressTracker;
use crate::router::Location;
use crate::transport::{MatcherApi, UploadFile, JD_EXTENSIONS};

/// Uploads the Job Description and returns the requirements-editor location
/// for the new JD.
pub async fn submit_jd(
    api: &dyn MatcherApi,
    file: Option<UploadFile>,
    tracker: Arc<UploadProgressTracker>,
) -> Result<Location, AppError> {
    let file = file.ok_or_else(|| AppError::validation("Please upload a Job Description file."))?;
    file.ensure_extension(JD_EXTENSIONS)
        .map_err(AppError::Validation)?;

    let file_name = file.file_name.clone();
    let response = api.submit_jd(file, tracker.clone()).await?;
    tracker.finish();

    // Ids start at 1; anything else cannot be opened by the next page.
    let jd_id = response.jd_id.filter(|id| *id > 0).ok_or_else(|| {
        AppError::Workflow("Job Description upload failed to return an ID.".to_string())
    })?;
    info!(
        jd_id,
        file = %file_name,
        message = response.message.as_deref().unwrap_or_default(),
        "Job Description uploaded"
    );

    Ok(Location::requirements_editor(jd_id))
}

/// Text shown when [`submit_jd`] fails. Validation problems are shown as is.
pub fn failure_message(error: &AppError) -> String {
    match error {
        AppError::Validation(message) => message.clone(),
        other => format!("Error during JD upload: {other}"),
    }
}
