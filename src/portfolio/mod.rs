//! Seeker-owned portfolio items.
mod service;

pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub id: Uuid,
    pub seeker_id: Uuid,
    pub skills: Vec<String>,
    pub description: String,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PortfolioItem {
    /// Last path segment of the stored file.
    pub fn file_name(&self) -> Option<&str> {
        self.file_url
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .filter(|name| !name.is_empty())
    }
}

/// Skills as sent by clients: a JSON array or a comma-separated string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkillsInput {
    List(Vec<String>),
    Text(String),
}

impl SkillsInput {
    /// Trimmed, non-empty, de-duplicated skills, first occurrence wins.
    pub fn normalize(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            SkillsInput::List(list) => list,
            SkillsInput::Text(text) => text.split(',').map(str::to_owned).collect(),
        };

        let mut skills: Vec<String> = Vec::with_capacity(raw.len());
        for skill in raw {
            let skill = skill.trim();
            if !skill.is_empty() && !skills.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
                skills.push(skill.to_owned());
            }
        }
        skills
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skills_from_text() {
        let skills = SkillsInput::Text(" Rust, SQL ,,rust, Go ".into()).normalize();
        assert_eq!(skills, vec!["Rust", "SQL", "Go"]);
    }

    #[test]
    fn test_skills_from_json() {
        let input: SkillsInput = serde_json::from_str(r#"["Design", " ", "Figma"]"#).unwrap();
        assert_eq!(input.normalize(), vec!["Design", "Figma"]);

        let input: SkillsInput = serde_json::from_str(r#""Design, Figma""#).unwrap();
        assert_eq!(input.normalize(), vec!["Design", "Figma"]);
    }

    #[test]
    fn test_file_name() {
        let mut item = PortfolioItem {
            id: Uuid::new_v4(),
            seeker_id: Uuid::new_v4(),
            skills: vec![],
            description: String::new(),
            file_url: Some("http://localhost/uploads/portfolios/a/cv.pdf".into()),
            created_at: Utc::now(),
        };
        assert_eq!(item.file_name(), Some("cv.pdf"));

        item.file_url = None;
        assert_eq!(item.file_name(), None);
    }
}
