//! Analysis results page: session header plus the classified candidate cards.

use colored::Color;
use tracing::warn;

use super::{Theme, ViewState};
use crate::classifier::{classify, Bucket, Classification};
use crate::errors::AppError;
use crate::models::analysis::{MatchResult, MatchStatus, ResultsResponse};
use crate::models::{format_timestamp, SessionId};
use crate::router::parse_id;
use crate::transport::MatcherApi;

pub const NO_RESULTS: &str =
    "No analysis results found for this session, or the session is still processing.";

#[derive(Debug)]
pub struct ResultsView {
    pub session_id: SessionId,
    pub response: ResultsResponse,
}

impl ResultsView {
    pub fn classification(&self) -> Classification<'_> {
        classify(&self.response.results)
    }
}

pub async fn load(api: &dyn MatcherApi, raw_session_id: &str) -> ViewState<ResultsView> {
    let session_id = match parse_id(raw_session_id, "session ID") {
        Ok(id) => id,
        Err(e) => return ViewState::Error(e),
    };

    let response = match api.fetch_results(session_id).await {
        Ok(response) => response,
        Err(e) => return ViewState::Error(AppError::fetch("Failed to load analysis results", e)),
    };
    if response.analysis_session_id.is_some_and(|id| id != session_id) {
        warn!(
            session_id,
            served_session_id = ?response.analysis_session_id,
            "Results response names a different session"
        );
    }

    let view = ResultsView {
        session_id,
        response,
    };
    if view.classification().is_empty() {
        ViewState::Empty(NO_RESULTS.to_string())
    } else {
        ViewState::Ready(view)
    }
}

pub fn render(view: &ResultsView, theme: &Theme) -> String {
    let response = &view.response;
    let mut out = String::new();

    out.push_str(&theme.heading("Analysis Results"));
    out.push('\n');
    let session = response
        .session_name
        .clone()
        .unwrap_or_else(|| format!("ID {}", view.session_id));
    let jd = response
        .jd_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let created = response
        .created_at
        .as_deref()
        .map(format_timestamp)
        .unwrap_or_else(|| "N/A".to_string());
    out.push_str(&format!("{} {session}\n", theme.label("Session:")));
    out.push_str(&format!("{} {jd}\n", theme.label("Job Description ID:")));
    out.push_str(&format!("{} {}\n", theme.label("Status:"), response.status));
    out.push_str(&format!("{} {created}\n", theme.label("Created At:")));

    let classification = view.classification();
    out.push_str(&format!(
        "{} {}\n",
        theme.label("CVs Analyzed:"),
        classification.len()
    ));
    for bucket in Bucket::ALL {
        let cards = classification.bucket(bucket);
        // The three verdict buckets always show; the others only when populated.
        let always_shown = matches!(
            bucket,
            Bucket::StrongMatch | Bucket::PotentialMatch | Bucket::NotSuitable
        );
        if cards.is_empty() && !always_shown {
            continue;
        }

        out.push('\n');
        out.push_str(&theme.heading(&format!("{} ({})", bucket.title(), cards.len())));
        out.push('\n');
        if cards.is_empty() {
            out.push_str("  No CVs in this category.\n");
        }
        for result in cards {
            render_card(&mut out, result, theme);
        }
    }
    out
}

fn render_card(out: &mut String, result: &MatchResult, theme: &Theme) {
    let name = result
        .original_filename
        .clone()
        .unwrap_or_else(|| format!("ID {}", result.cv_id));
    let status_color = match result.match_status {
        MatchStatus::Match => Color::Green,
        MatchStatus::NoMatch => Color::Red,
        MatchStatus::Error => Color::Magenta,
        MatchStatus::Other(_) => Color::Yellow,
    };

    out.push_str(&format!("\n  {} {name}\n", theme.label("CV:")));
    out.push_str(&format!(
        "  Match Status: {}\n",
        theme.paint(result.match_status.label(), status_color)
    ));
    out.push_str(&format!("  Numerical Score: {}\n", score_label(result.numerical_score)));
    out.push_str(&format!(
        "  Explanation: {}\n",
        result
            .llm_explanation
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or("No explanation provided.")
    ));

    if !result.detailed_match_info.is_empty() {
        out.push_str("  Detailed Match Breakdown:\n");
        for (category, findings) in &result.detailed_match_info {
            out.push_str(&format!("    {}:\n", humanize_category(category)));
            if findings.is_empty() {
                out.push_str("      No specific items listed for this category.\n");
            }
            for finding in findings {
                out.push_str(&format!("      - {finding}\n"));
            }
        }
    }

    let processed = result
        .processed_at
        .as_deref()
        .map(format_timestamp)
        .unwrap_or_else(|| "N/A".to_string());
    out.push_str(&format!("  Processed at: {processed}\n"));
}

/// `NN/100` rounded to a whole number, or `N/A`.
pub fn score_label(score: Option<f64>) -> String {
    match score {
        // Halves round up, not to even.
        Some(score) => format!("{:.0}/100", score.round()),
        None => "N/A".to_string(),
    }
}

/// `skills_met` → `Skills Met`.
pub fn humanize_category(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
