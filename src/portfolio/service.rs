use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::blob::{BlobStore, Upload, release};
use crate::config::PortfolioPolicy;
use crate::database::Database;
use crate::error::{Result, ServerError};
use crate::portfolio::PortfolioItem;

const FILE_PREFIX: &str = "portfolios";

/// Portfolio creation request. Skills are already normalized.
#[derive(Debug, Clone, Default)]
pub struct NewPortfolio {
    pub skills: Vec<String>,
    pub description: String,
    pub file: Option<Upload>,
}

/// Present fields replace the stored ones.
#[derive(Debug, Clone, Default)]
pub struct PortfolioPatch {
    pub skills: Option<Vec<String>>,
    pub description: Option<String>,
    pub file: Option<Upload>,
}

/// Portfolio item with its file name, as listed to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioEntry {
    #[serde(flatten)]
    pub item: PortfolioItem,
    pub file_name: Option<String>,
}

impl From<PortfolioItem> for PortfolioEntry {
    fn from(item: PortfolioItem) -> Self {
        let file_name = item.file_name().map(str::to_owned);
        Self { item, file_name }
    }
}

/// Portfolio CRUD, scoped to the owning seeker.
pub struct PortfolioService<'a> {
    db: &'a Database,
    blob: &'a dyn BlobStore,
    policy: PortfolioPolicy,
}

impl<'a> PortfolioService<'a> {
    pub fn new(db: &'a Database, blob: &'a dyn BlobStore, policy: PortfolioPolicy) -> Self {
        Self { db, blob, policy }
    }

    fn check_required(&self, skills: &[String], description: &str, has_file: bool) -> Result<()> {
        let missing = [
            ("skills", skills.is_empty()),
            ("description", description.trim().is_empty()),
            ("file", !has_file),
        ];

        match self.policy {
            PortfolioPolicy::All => {
                if let Some((field, _)) = missing.iter().find(|(_, missing)| *missing) {
                    return Err(ServerError::field(
                        *field,
                        "required",
                        "Skills, description and file are required.",
                    ));
                }
            },
            PortfolioPolicy::Any => {
                if missing.iter().all(|(_, missing)| *missing) {
                    return Err(ServerError::field(
                        "skills",
                        "required",
                        "At least one of skills, description or file is required.",
                    ));
                }
            },
        }
        Ok(())
    }

    pub async fn create(&self, seeker_id: Uuid, new: NewPortfolio) -> Result<PortfolioEntry> {
        self.check_required(&new.skills, &new.description, new.file.is_some())?;

        let file_url = match new.file {
            Some(file) => Some(file.store(self.blob, FILE_PREFIX, seeker_id).await?),
            None => None,
        };

        let item = PortfolioItem {
            id: Uuid::new_v4(),
            seeker_id,
            skills: new.skills,
            description: new.description.trim().to_owned(),
            file_url,
            created_at: Utc::now(),
        };

        if let Err(err) = self.db.portfolios.insert(&item).await {
            if let Some(url) = &item.file_url {
                release(self.blob, url).await;
            }
            return Err(err.into());
        }

        tracing::info!(%seeker_id, portfolio_id = %item.id, "portfolio item created");
        Ok(item.into())
    }

    /// Caller's items, newest first.
    pub async fn list(&self, seeker_id: Uuid) -> Result<Vec<PortfolioEntry>> {
        let items = self.db.portfolios.list_by_seeker(seeker_id).await?;
        Ok(items.into_iter().map(PortfolioEntry::from).collect())
    }

    /// Item owned by `seeker_id`. Someone else's item is reported missing.
    pub async fn get(&self, seeker_id: Uuid, id: Uuid) -> Result<PortfolioItem> {
        self.db
            .portfolios
            .find_by_id(id)
            .await?
            .filter(|item| item.seeker_id == seeker_id)
            .ok_or(ServerError::NotFound("portfolio"))
    }

    pub async fn update(
        &self,
        seeker_id: Uuid,
        id: Uuid,
        patch: PortfolioPatch,
    ) -> Result<PortfolioEntry> {
        let mut item = self.get(seeker_id, id).await?;

        if let Some(skills) = patch.skills {
            item.skills = skills;
        }
        if let Some(description) = patch.description {
            item.description = description.trim().to_owned();
        }
        let has_file = item.file_url.is_some() || patch.file.is_some();
        self.check_required(&item.skills, &item.description, has_file)?;

        let (stored, superseded) = match patch.file {
            Some(file) => {
                let url = file.store(self.blob, FILE_PREFIX, seeker_id).await?;
                (Some(url.clone()), item.file_url.replace(url))
            },
            None => (None, None),
        };

        if let Err(err) = self.db.portfolios.update(&item).await {
            if let Some(url) = &stored {
                release(self.blob, url).await;
            }
            return Err(err.into());
        }
        if let Some(old) = superseded {
            release(self.blob, &old).await;
        }

        tracing::debug!(%seeker_id, portfolio_id = %item.id, "portfolio item updated");
        Ok(item.into())
    }

    /// Delete an item and release its file.
    pub async fn delete(&self, seeker_id: Uuid, id: Uuid) -> Result<()> {
        let item = self.get(seeker_id, id).await?;
        if !self.db.portfolios.delete(seeker_id, id).await? {
            return Err(ServerError::NotFound("portfolio"));
        }

        if let Some(url) = &item.file_url {
            release(self.blob, url).await;
        }

        tracing::info!(%seeker_id, portfolio_id = %id, "portfolio item deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::database::{PortfolioRepository, Result as StoreResult, StoreError};

    /// Portfolio store whose updates always fail.
    struct FrozenPortfolios(Arc<dyn PortfolioRepository>);

    #[async_trait]
    impl PortfolioRepository for FrozenPortfolios {
        async fn insert(&self, item: &PortfolioItem) -> StoreResult<()> {
            self.0.insert(item).await
        }

        async fn update(&self, _item: &PortfolioItem) -> StoreResult<()> {
            Err(StoreError::Backend("read-only".into()))
        }

        async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<PortfolioItem>> {
            self.0.find_by_id(id).await
        }

        async fn list_by_seeker(&self, seeker_id: Uuid) -> StoreResult<Vec<PortfolioItem>> {
            self.0.list_by_seeker(seeker_id).await
        }

        async fn delete(&self, seeker_id: Uuid, id: Uuid) -> StoreResult<bool> {
            self.0.delete(seeker_id, id).await
        }
    }

    fn file() -> Option<Upload> {
        Some(Upload {
            bytes: b"%PDF".to_vec(),
            content_type: "application/pdf".into(),
        })
    }

    fn complete() -> NewPortfolio {
        NewPortfolio {
            skills: vec!["Rust".into()],
            description: "Backend work".into(),
            file: file(),
        }
    }

    #[tokio::test]
    async fn test_policy_all_requires_every_field() {
        let db = Database::memory();
        let blob = MemoryBlobStore::default();
        let service = PortfolioService::new(&db, &blob, PortfolioPolicy::All);
        let seeker = Uuid::new_v4();

        let partial = NewPortfolio {
            file: None,
            ..complete()
        };
        assert!(matches!(
            service.create(seeker, partial).await,
            Err(ServerError::Validation(_))
        ));

        let entry = service.create(seeker, complete()).await.unwrap();
        assert!(entry.file_name.as_deref().is_some_and(|n| n.ends_with(".pdf")));
    }

    #[tokio::test]
    async fn test_policy_any_requires_one_field() {
        let db = Database::memory();
        let blob = MemoryBlobStore::default();
        let service = PortfolioService::new(&db, &blob, PortfolioPolicy::Any);
        let seeker = Uuid::new_v4();

        assert!(matches!(
            service.create(seeker, NewPortfolio::default()).await,
            Err(ServerError::Validation(_))
        ));

        let only_skills = NewPortfolio {
            skills: vec!["SQL".into()],
            ..Default::default()
        };
        assert!(service.create(seeker, only_skills).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_seeker_sees_not_found() {
        let db = Database::memory();
        let blob = MemoryBlobStore::default();
        let service = PortfolioService::new(&db, &blob, PortfolioPolicy::All);
        let (owner, intruder) = (Uuid::new_v4(), Uuid::new_v4());

        let entry = service.create(owner, complete()).await.unwrap();
        let id = entry.item.id;

        assert!(matches!(service.get(intruder, id).await, Err(ServerError::NotFound(_))));
        assert!(matches!(
            service.update(intruder, id, PortfolioPatch::default()).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(service.delete(intruder, id).await, Err(ServerError::NotFound(_))));
        assert!(service.get(owner, id).await.is_ok());
    }

    #[tokio::test]
    async fn test_replace_and_delete_release_files() {
        let db = Database::memory();
        let blob = MemoryBlobStore::default();
        let service = PortfolioService::new(&db, &blob, PortfolioPolicy::All);
        let seeker = Uuid::new_v4();

        let entry = service.create(seeker, complete()).await.unwrap();
        let first = entry.item.file_url.clone().unwrap();

        let updated = service
            .update(
                seeker,
                entry.item.id,
                PortfolioPatch {
                    description: Some("Platform work".into()),
                    file: file(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = updated.item.file_url.clone().unwrap();

        assert_eq!(updated.item.skills, vec!["Rust"]);
        assert_ne!(first, second);
        assert!(!blob.contains(&first).await);
        assert!(blob.contains(&second).await);

        service.delete(seeker, entry.item.id).await.unwrap();
        assert!(!blob.contains(&second).await);
        assert!(service.list(seeker).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_releases_new_file() {
        let memory = Database::memory();
        let frozen = Arc::new(FrozenPortfolios(memory.portfolios.clone()));
        let db = memory.with_portfolios(frozen);
        let blob = MemoryBlobStore::default();
        let service = PortfolioService::new(&db, &blob, PortfolioPolicy::All);
        let seeker = Uuid::new_v4();

        let entry = service.create(seeker, complete()).await.unwrap();
        let first = entry.item.file_url.clone().unwrap();

        let patch = PortfolioPatch {
            file: file(),
            ..Default::default()
        };
        assert!(service.update(seeker, entry.item.id, patch).await.is_err());

        assert_eq!(blob.len().await, 1);
        assert!(blob.contains(&first).await);
    }

    #[tokio::test]
    async fn test_update_cannot_blank_required_field() {
        let db = Database::memory();
        let blob = MemoryBlobStore::default();
        let service = PortfolioService::new(&db, &blob, PortfolioPolicy::All);
        let seeker = Uuid::new_v4();
        let entry = service.create(seeker, complete()).await.unwrap();

        let patch = PortfolioPatch {
            skills: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(
            service.update(seeker, entry.item.id, patch).await,
            Err(ServerError::Validation(_))
        ));
    }
}
