//! Requirements editor page: review and adjust extracted JD requirements.

use std::sync::Arc;

use colored::Color;
use tracing::warn;

use super::{Theme, ViewState};
use crate::editor::RequirementEditor;
use crate::models::requirements::RequirementCategory;
use crate::router::parse_id;
use crate::transport::MatcherApi;

pub async fn open(api: Arc<dyn MatcherApi>, raw_jd_id: &str) -> ViewState<RequirementEditor> {
    let jd_id = match parse_id(raw_jd_id, "JD ID") {
        Ok(id) => id,
        Err(e) => return ViewState::Error(e),
    };
    match RequirementEditor::load(api, jd_id).await {
        Ok(editor) => ViewState::Ready(editor),
        Err(e) => ViewState::Error(e),
    }
}

pub fn render(editor: &RequirementEditor, theme: &Theme) -> String {
    let mut out = String::new();
    out.push_str(&theme.heading("Confirm Job Description Requirements"));
    out.push('\n');
    out.push_str(&format!(
        "Editing requirements for: {}\n",
        theme.label(editor.jd_display_name())
    ));

    for category in RequirementCategory::ALL {
        out.push('\n');
        out.push_str(&theme.label(category.title()));
        out.push('\n');
        let items = editor.requirements().get(category);
        let original = editor.pristine().get(category);
        if items.is_empty() {
            out.push_str(&format!(
                "  {}\n",
                theme.paint(&format!("No {category} requirements listed."), Color::BrightBlack)
            ));
        }
        for (index, item) in items.iter().enumerate() {
            let text = if item.trim().is_empty() {
                theme.paint("(blank, dropped on confirm)", Color::BrightBlack)
            } else if original.get(index) != Some(item) {
                format!("{item} {}", theme.paint("(edited)", Color::Yellow))
            } else {
                item.clone()
            };
            out.push_str(&format!("  [{category}:{index}] {text}\n"));
        }
    }

    if editor.is_dirty() {
        out.push_str(&format!(
            "\n{}\n",
            theme.paint("Unsaved edits. Use --confirm to save them or --reset to restore the original.", Color::Yellow)
        ));
    }
    if let Some(error) = editor.last_error() {
        out.push_str(&format!(
            "\n{}\n",
            theme.paint(&format!("Failed to save confirmed requirements: {error}"), Color::Red)
        ));
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Command-line edits
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    Set {
        category: RequirementCategory,
        index: usize,
        value: String,
    },
    Delete {
        category: RequirementCategory,
        index: usize,
    },
    Add {
        category: RequirementCategory,
        value: String,
    },
}

/// `CATEGORY:INDEX=VALUE`
pub fn parse_set(raw: &str) -> Result<EditOp, String> {
    let (target, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Expected CATEGORY:INDEX=VALUE, got '{raw}'"))?;
    let (category, index) = parse_target(target)?;
    Ok(EditOp::Set {
        category,
        index,
        value: value.to_string(),
    })
}

/// `CATEGORY:INDEX`
pub fn parse_delete(raw: &str) -> Result<EditOp, String> {
    let (category, index) = parse_target(raw)?;
    Ok(EditOp::Delete { category, index })
}

/// `CATEGORY=VALUE`
pub fn parse_add(raw: &str) -> Result<EditOp, String> {
    let (category, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Expected CATEGORY=VALUE, got '{raw}'"))?;
    Ok(EditOp::Add {
        category: category.parse()?,
        value: value.to_string(),
    })
}

fn parse_target(raw: &str) -> Result<(RequirementCategory, usize), String> {
    let (category, index) = raw
        .split_once(':')
        .ok_or_else(|| format!("Expected CATEGORY:INDEX, got '{raw}'"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|_| format!("Invalid index '{index}' in '{raw}'"))?;
    Ok((category.parse()?, index))
}

/// Applies edits in a fixed order: reset, sets, deletes, adds. Indices in
/// sets and deletes refer to positions before any delete, so deletes run
/// from the highest index down.
pub fn apply_edits(editor: &mut RequirementEditor, reset: bool, ops: &[EditOp]) {
    if reset {
        editor.reset();
    }

    for op in ops {
        if let EditOp::Set { category, index, value } = op {
            if *index >= editor.requirements().get(*category).len() {
                warn!(%category, index, "Ignoring edit of a missing requirement");
            }
            editor.edit(*category, *index, value.clone());
        }
    }

    let mut deletes: Vec<(RequirementCategory, usize)> = ops
        .iter()
        .filter_map(|op| match op {
            EditOp::Delete { category, index } => Some((*category, *index)),
            _ => None,
        })
        .collect();
    deletes.sort_by(|a, b| b.1.cmp(&a.1));
    deletes.dedup();
    for (category, index) in deletes {
        if index >= editor.requirements().get(category).len() {
            warn!(%category, index, "Ignoring delete of a missing requirement");
        }
        editor.delete(category, index);
    }

    for op in ops {
        if let EditOp::Add { category, value } = op {
            let slot = editor.add(*category);
            editor.edit(*category, slot, value.clone());
        }
    }
}
