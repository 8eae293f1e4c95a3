//! Requirement editor: an editable copy of a JD's extracted requirements kept
//! next to the pristine copy captured at load time.
//!
//! Edits are driven by live input, so out-of-range indices are ignored rather
//! than reported. Nothing is sent to the server until [`RequirementEditor::confirm`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::requirements::{RequirementCategory, RequirementSet};
use crate::models::JdId;
use crate::router::Location;
use crate::transport::MatcherApi;

pub struct RequirementEditor {
    api: Arc<dyn MatcherApi>,
    jd_id: JdId,
    jd_display_name: String,
    editable: RequirementSet,
    pristine: RequirementSet,
    last_error: Option<String>,
}

impl RequirementEditor {
    /// Fetches the extracted requirements and the JD's display name.
    pub async fn load(api: Arc<dyn MatcherApi>, jd_id: JdId) -> Result<Self, AppError> {
        let response = api
            .fetch_requirements(jd_id)
            .await
            .map_err(|e| AppError::fetch("Failed to load JD requirements", e))?;

        if response.jd_id.is_some_and(|id| id != jd_id) {
            warn!(jd_id, served_jd_id = ?response.jd_id, "Requirements response names a different JD");
        }

        let jd_display_name = response
            .jd_filename
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Job Description ID: {jd_id}"));

        debug!(
            jd_id,
            education = response.requirements.education.len(),
            experience = response.requirements.experience.len(),
            skills = response.requirements.skills.len(),
            "Loaded JD requirements"
        );

        Ok(Self {
            api,
            jd_id,
            jd_display_name,
            pristine: response.requirements.clone(),
            editable: response.requirements,
            last_error: None,
        })
    }

    pub fn jd_id(&self) -> JdId {
        self.jd_id
    }

    pub fn jd_display_name(&self) -> &str {
        &self.jd_display_name
    }

    pub fn requirements(&self) -> &RequirementSet {
        &self.editable
    }

    pub fn pristine(&self) -> &RequirementSet {
        &self.pristine
    }

    pub fn is_dirty(&self) -> bool {
        self.editable != self.pristine
    }

    /// Message of the most recent failed confirm, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn edit(&mut self, category: RequirementCategory, index: usize, value: impl Into<String>) {
        if let Some(slot) = self.editable.get_mut(category).get_mut(index) {
            *slot = value.into();
        }
    }

    /// Appends an empty slot and returns its index.
    pub fn add(&mut self, category: RequirementCategory) -> usize {
        let items = self.editable.get_mut(category);
        items.push(String::new());
        items.len() - 1
    }

    pub fn delete(&mut self, category: RequirementCategory, index: usize) {
        let items = self.editable.get_mut(category);
        if index < items.len() {
            items.remove(index);
        }
    }

    pub fn reset(&mut self) {
        self.editable = self.pristine.clone();
    }

    /// What [`confirm`](Self::confirm) would submit right now.
    pub fn cleaned(&self) -> RequirementSet {
        self.editable.cleaned()
    }

    /// Saves the cleaned requirements. On success returns the next location;
    /// on failure the editable state is kept so a retry resubmits the same edits.
    pub async fn confirm(&mut self) -> Result<Location, AppError> {
        let payload = self.cleaned();
        if payload.is_empty() {
            warn!(jd_id = self.jd_id, "Confirming an empty requirement set");
        }

        match self.api.save_requirements(self.jd_id, &payload).await {
            Ok(response) => {
                if response.jd_id.is_some_and(|id| id != self.jd_id) {
                    warn!(
                        jd_id = self.jd_id,
                        saved_jd_id = ?response.jd_id,
                        "Server saved requirements under a different JD"
                    );
                }
                info!(
                    jd_id = self.jd_id,
                    message = response.message.as_deref().unwrap_or_default(),
                    "Requirements confirmed"
                );
                self.last_error = None;
                Ok(Location::upload_cvs(self.jd_id))
            }
            Err(e) => {
                warn!(
                    jd_id = self.jd_id,
                    operation = %e.operation(),
                    error = %e,
                    "Saving requirements failed"
                );
                self.last_error = Some(e.to_string());
                Err(AppError::Transport(e))
            }
        }
    }
}
