//! In-process store backend.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::*;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    employers: HashMap<Uuid, EmployerProfile>,
    seekers: HashMap<Uuid, SeekerProfile>,
    portfolios: HashMap<Uuid, PortfolioItem>,
    positions: HashMap<Uuid, Position>,
    applications: HashMap<Uuid, Application>,
    revocations: HashMap<String, DateTime<Utc>>,
    skills: HashMap<Uuid, Skill>,
}

/// Store keeping every table behind a single lock.
///
/// Uniqueness checks and the write they guard happen under the same write
/// guard, so concurrent inserts behave like a unique index.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::duplicate("users_email_key"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.tables.write().await.users.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn save_employer(&self, profile: &EmployerProfile) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.employers.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn save_seeker(&self, profile: &SeekerProfile) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.seekers.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn find_employer(&self, user_id: Uuid) -> Result<Option<EmployerProfile>> {
        Ok(self.tables.read().await.employers.get(&user_id).cloned())
    }

    async fn find_seeker(&self, user_id: Uuid) -> Result<Option<SeekerProfile>> {
        Ok(self.tables.read().await.seekers.get(&user_id).cloned())
    }
}

#[async_trait]
impl PortfolioRepository for MemoryStore {
    async fn insert(&self, item: &PortfolioItem) -> Result<()> {
        self.tables.write().await.portfolios.insert(item.id, item.clone());
        Ok(())
    }

    async fn update(&self, item: &PortfolioItem) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(stored) = tables.portfolios.get_mut(&item.id) {
            *stored = item.clone();
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PortfolioItem>> {
        Ok(self.tables.read().await.portfolios.get(&id).cloned())
    }

    async fn list_by_seeker(&self, seeker_id: Uuid) -> Result<Vec<PortfolioItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<PortfolioItem> = tables
            .portfolios
            .values()
            .filter(|p| p.seeker_id == seeker_id)
            .cloned()
            .collect();
        newest_first(&mut items, |p| p.created_at);
        Ok(items)
    }

    async fn delete(&self, seeker_id: Uuid, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.portfolios.get(&id) {
            Some(item) if item.seeker_id == seeker_id => {
                tables.portfolios.remove(&id);
                Ok(true)
            },
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PositionRepository for MemoryStore {
    async fn insert(&self, position: &Position) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.positions.insert(position.id, position.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Position>> {
        Ok(self.tables.read().await.positions.get(&id).cloned())
    }

    async fn list_listed(&self, now: DateTime<Utc>) -> Result<Vec<Position>> {
        let tables = self.tables.read().await;
        let mut positions: Vec<Position> = tables
            .positions
            .values()
            .filter(|p| p.is_listed_at(now))
            .cloned()
            .collect();
        newest_first(&mut positions, |p| p.created_at);
        Ok(positions)
    }

    async fn list_by_employer(&self, employer_id: Uuid) -> Result<Vec<Position>> {
        let tables = self.tables.read().await;
        let mut positions: Vec<Position> = tables
            .positions
            .values()
            .filter(|p| p.employer_id == employer_id)
            .cloned()
            .collect();
        newest_first(&mut positions, |p| p.created_at);
        Ok(positions)
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn insert(&self, application: &Application) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.applications.values().any(|a| {
            a.position_id == application.position_id && a.seeker_id == application.seeker_id
        }) {
            return Err(StoreError::duplicate("applications_position_id_seeker_id_key"));
        }
        tables
            .applications
            .insert(application.id, application.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>> {
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn find_by_pair(
        &self,
        position_id: Uuid,
        seeker_id: Uuid,
    ) -> Result<Option<Application>> {
        let tables = self.tables.read().await;
        Ok(tables
            .applications
            .values()
            .find(|a| a.position_id == position_id && a.seeker_id == seeker_id)
            .cloned())
    }

    async fn update_status(&self, application: &Application, expected: Status) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.applications.get_mut(&application.id) {
            Some(stored) if stored.status == expected => {
                stored.status = application.status;
                stored.notes = application.notes.clone();
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn list_by_positions(&self, position_ids: &[Uuid]) -> Result<Vec<Application>> {
        let tables = self.tables.read().await;
        let mut applications: Vec<Application> = tables
            .applications
            .values()
            .filter(|a| position_ids.contains(&a.position_id))
            .cloned()
            .collect();
        newest_first(&mut applications, |a| a.applied_at);
        Ok(applications)
    }

    async fn list_by_seeker(&self, seeker_id: Uuid) -> Result<Vec<Application>> {
        let tables = self.tables.read().await;
        let mut applications: Vec<Application> = tables
            .applications
            .values()
            .filter(|a| a.seeker_id == seeker_id)
            .cloned()
            .collect();
        newest_first(&mut applications, |a| a.applied_at);
        Ok(applications)
    }
}

#[async_trait]
impl RevocationLedger for MemoryStore {
    async fn insert(&self, digest: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.revocations.contains_key(digest) {
            return Err(StoreError::duplicate("revoked_tokens_pkey"));
        }
        tables.revocations.insert(digest.to_owned(), expires_at);
        Ok(())
    }

    async fn contains(&self, digest: &str, now: DateTime<Utc>) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .revocations
            .get(digest)
            .is_some_and(|expires_at| *expires_at > now))
    }

    async fn prune(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.revocations.len();
        tables.revocations.retain(|_, expires_at| *expires_at > now);
        Ok((before - tables.revocations.len()) as u64)
    }
}

#[async_trait]
impl SkillRepository for MemoryStore {
    async fn insert(&self, skill: &Skill) -> Result<()> {
        let mut tables = self.tables.write().await;
        let lowered = skill.name.to_lowercase();
        if tables
            .skills
            .values()
            .any(|s| s.name.to_lowercase() == lowered)
        {
            return Err(StoreError::duplicate("skills_lower_name_key"));
        }
        tables.skills.insert(skill.id, skill.clone());
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Skill>> {
        let lowered = name.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .skills
            .values()
            .find(|s| s.name.to_lowercase() == lowered)
            .cloned())
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<Skill>> {
        let search = search.map(str::to_lowercase);
        let tables = self.tables.read().await;
        let mut skills: Vec<Skill> = tables
            .skills
            .values()
            .filter(|s| {
                search
                    .as_deref()
                    .is_none_or(|needle| s.name.to_lowercase().contains(needle))
            })
            .cloned()
            .collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(skills)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn test_revocation_expiry() {
        let store = MemoryStore::default();
        let now = Utc::now();

        RevocationLedger::insert(&store, "live", now + Duration::hours(1))
            .await
            .unwrap();
        RevocationLedger::insert(&store, "stale", now - Duration::hours(1))
            .await
            .unwrap();

        assert!(store.contains("live", now).await.unwrap());
        assert!(!store.contains("stale", now).await.unwrap());
        assert!(matches!(
            RevocationLedger::insert(&store, "live", now).await,
            Err(StoreError::Duplicate { .. })
        ));

        assert_eq!(store.prune(now).await.unwrap(), 1);
        assert!(store.contains("live", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let store = MemoryStore::default();
        let mut application = Application {
            id: Uuid::new_v4(),
            position_id: Uuid::new_v4(),
            seeker_id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            applied_at: Utc::now(),
            status: Status::Pending,
            notes: None,
        };
        ApplicationRepository::insert(&store, &application)
            .await
            .unwrap();

        application.status = Status::Accepted;
        assert!(store
            .update_status(&application, Status::Pending)
            .await
            .unwrap());

        application.status = Status::Rejected;
        assert!(!store
            .update_status(&application, Status::Pending)
            .await
            .unwrap());

        let stored = ApplicationRepository::find_by_id(&store, application.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Accepted);
    }
}
