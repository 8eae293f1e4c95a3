use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{null_as_default, JdId};

/// One of the three independent requirement lists extracted from a JD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementCategory {
    Education,
    Experience,
    Skills,
}

impl RequirementCategory {
    pub const ALL: [RequirementCategory; 3] = [
        RequirementCategory::Education,
        RequirementCategory::Experience,
        RequirementCategory::Skills,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementCategory::Education => "education",
            RequirementCategory::Experience => "experience",
            RequirementCategory::Skills => "skills",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RequirementCategory::Education => "Education Requirements",
            RequirementCategory::Experience => "Experience Requirements",
            RequirementCategory::Skills => "Skills Requirements",
        }
    }
}

impl fmt::Display for RequirementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "education" => Ok(RequirementCategory::Education),
            "experience" => Ok(RequirementCategory::Experience),
            "skills" => Ok(RequirementCategory::Skills),
            other => Err(format!(
                "Unknown requirement category '{other}'. Expected education, experience or skills"
            )),
        }
    }
}

/// Three ordered lists of free-text requirements. Order is presentational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSet {
    #[serde(default, deserialize_with = "lenient_list")]
    pub education: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub experience: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub skills: Vec<String>,
}

impl RequirementSet {
    pub fn get(&self, category: RequirementCategory) -> &[String] {
        match category {
            RequirementCategory::Education => &self.education,
            RequirementCategory::Experience => &self.experience,
            RequirementCategory::Skills => &self.skills,
        }
    }

    pub fn get_mut(&mut self, category: RequirementCategory) -> &mut Vec<String> {
        match category {
            RequirementCategory::Education => &mut self.education,
            RequirementCategory::Experience => &mut self.experience,
            RequirementCategory::Skills => &mut self.skills,
        }
    }

    /// Trimmed copy with every blank entry dropped. An all-blank category
    /// becomes an empty list.
    pub fn cleaned(&self) -> RequirementSet {
        let clean = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        };
        RequirementSet {
            education: clean(&self.education),
            experience: clean(&self.experience),
            skills: clean(&self.skills),
        }
    }

    pub fn is_empty(&self) -> bool {
        RequirementCategory::ALL
            .iter()
            .all(|category| self.get(*category).is_empty())
    }
}

/// Missing, `null` or non-list categories decode as empty; non-string items are dropped.
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// GET /jd/{jd_id}/requirements
#[derive(Debug, Clone, Deserialize)]
pub struct RequirementsResponse {
    #[serde(default)]
    pub jd_id: Option<JdId>,
    #[serde(default)]
    pub jd_filename: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requirements: RequirementSet,
}

/// POST /jd/{jd_id}/requirements body.
#[derive(Debug, Serialize)]
pub struct SaveRequirementsRequest<'a> {
    pub requirements: &'a RequirementSet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequirementsResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub jd_id: Option<JdId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_categories_default_to_empty() {
        let response: RequirementsResponse = serde_json::from_value(json!({
            "jd_id": 7,
            "jd_filename": "backend.pdf",
            "requirements": { "skills": ["Go"] }
        }))
        .unwrap();
        assert!(response.requirements.education.is_empty());
        assert!(response.requirements.experience.is_empty());
        assert_eq!(response.requirements.skills, vec!["Go"]);
    }

    #[test]
    fn test_null_and_malformed_categories_are_tolerated() {
        let response: RequirementsResponse = serde_json::from_value(json!({
            "requirements": {
                "education": null,
                "experience": "5 years",
                "skills": ["Rust", 3, null, "SQL"]
            }
        }))
        .unwrap();
        assert!(response.requirements.education.is_empty());
        assert!(response.requirements.experience.is_empty());
        assert_eq!(response.requirements.skills, vec!["Rust", "SQL"]);
        assert!(response.jd_filename.is_none());
    }

    #[test]
    fn test_null_requirements_object() {
        let response: RequirementsResponse =
            serde_json::from_value(json!({ "requirements": null })).unwrap();
        assert!(response.requirements.is_empty());
    }

    #[test]
    fn test_cleaned_trims_and_drops_blank_entries() {
        let set = RequirementSet {
            education: vec!["  ".to_string(), "\t".to_string()],
            experience: vec![" 3+ years backend ".to_string(), String::new()],
            skills: vec!["Go".to_string()],
        };
        let cleaned = set.cleaned();
        assert!(cleaned.education.is_empty());
        assert_eq!(cleaned.experience, vec!["3+ years backend"]);
        assert_eq!(cleaned.skills, vec!["Go"]);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(
            "Skills".parse::<RequirementCategory>().unwrap(),
            RequirementCategory::Skills
        );
        assert!("hobbies".parse::<RequirementCategory>().is_err());
    }

    #[test]
    fn test_save_request_shape() {
        let set = RequirementSet {
            education: vec![],
            experience: vec![],
            skills: vec!["Go".to_string(), "Rust".to_string()],
        };
        let body = serde_json::to_value(SaveRequirementsRequest { requirements: &set }).unwrap();
        assert_eq!(
            body,
            json!({ "requirements": { "education": [], "experience": [], "skills": ["Go", "Rust"] } })
        );
    }
}
