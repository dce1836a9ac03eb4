//! Public catalog of skill names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::{Database, StoreError};
use crate::error::{Result, ServerError};

pub const MAX_NAME_LENGTH: usize = 50;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Skill catalog manager.
pub struct SkillService<'a> {
    db: &'a Database,
}

impl<'a> SkillService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Add a skill. Names are unique regardless of case.
    pub async fn create(&self, name: &str) -> Result<Skill> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(ServerError::field(
                "name",
                "length",
                "Skill name must be 1 to 50 characters long.",
            ));
        }

        if self.db.skills.find_by_name(name).await?.is_some() {
            return Err(ServerError::Conflict("This skill already exists.".into()));
        }

        let skill = Skill {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };

        match self.db.skills.insert(&skill).await {
            Ok(()) => Ok(skill),
            Err(StoreError::Duplicate { .. }) => {
                Err(ServerError::Conflict("This skill already exists.".into()))
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Skills sorted by name, optionally filtered by a case-insensitive
    /// substring.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Skill>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        Ok(self.db.skills.list(search).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_ignores_case() {
        let db = Database::memory();
        let service = SkillService::new(&db);

        service.create("  Rust ").await.unwrap();
        assert!(matches!(
            service.create("rust").await,
            Err(ServerError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_name_length() {
        let db = Database::memory();
        let service = SkillService::new(&db);

        assert!(matches!(service.create("   ").await, Err(ServerError::Validation(_))));
        assert!(matches!(
            service.create(&"x".repeat(MAX_NAME_LENGTH + 1)).await,
            Err(ServerError::Validation(_))
        ));
        assert!(service.create(&"x".repeat(MAX_NAME_LENGTH)).await.is_ok());
    }

    #[tokio::test]
    async fn test_search_and_order() {
        let db = Database::memory();
        let service = SkillService::new(&db);

        for name in ["SQL", "Rust", "PostgreSQL", "Go"] {
            service.create(name).await.unwrap();
        }

        let names: Vec<String> = service
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Go", "PostgreSQL", "Rust", "SQL"]);

        let names: Vec<String> = service
            .list(Some("sql"))
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["PostgreSQL", "SQL"]);
    }
}
