//! CV upload and analysis page. The heavy lifting lives in the coordinator;
//! this page opens one for a JD and renders its snapshots.

use std::sync::Arc;

use colored::Color;

use super::Theme;
use crate::coordinator::{AnalysisCoordinator, AnalysisSnapshot, CoordinatorState, PollSettings};
use crate::errors::AppError;
use crate::router::{parse_id, Location};
use crate::transport::MatcherApi;

pub fn open(
    api: Arc<dyn MatcherApi>,
    raw_jd_id: &str,
    settings: PollSettings,
) -> Result<AnalysisCoordinator, AppError> {
    let jd_id = parse_id(raw_jd_id, "JD ID")?;
    Ok(AnalysisCoordinator::new(api, jd_id, settings))
}

pub fn render_snapshot(jd_id: i64, snapshot: &AnalysisSnapshot, theme: &Theme) -> String {
    let mut out = String::new();
    out.push_str(&theme.heading(&format!("Upload CVs for JD ID: {jd_id}")));
    out.push('\n');

    if snapshot.selected_files.is_empty() {
        out.push_str("No CV files selected.\n");
    } else {
        out.push_str(&format!("Selected: {}\n", snapshot.selected_files.join(", ")));
    }

    if let Some(message) = &snapshot.message {
        let color = match snapshot.state {
            CoordinatorState::ErrorAtStep { .. } => Color::Red,
            CoordinatorState::Terminal { .. } => Color::Green,
            _ => Color::Cyan,
        };
        out.push_str(&theme.paint(message, color));
        out.push('\n');
    }

    if !snapshot.file_errors.is_empty() {
        out.push_str(&theme.label("Files with errors:"));
        out.push('\n');
        for (file, error) in &snapshot.file_errors {
            out.push_str(&format!("  {}\n", theme.paint(&format!("{file}: {error}"), Color::Yellow)));
        }
    }

    if let Some(line) = &snapshot.status_line {
        out.push_str(&format!("{line} ({}%)\n", snapshot.analysis_percent));
    }
    if snapshot.stalled {
        out.push_str(&theme.paint(
            "Progress has not changed for several polls; the server may still be working.",
            Color::Yellow,
        ));
        out.push('\n');
    }

    if let Some(session_id) = snapshot.state.session_id() {
        out.push_str(&format!(
            "View results: {} (Session {session_id})\n",
            Location::results(session_id)
        ));
    }
    out
}
