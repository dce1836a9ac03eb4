//! PostgreSQL store backend.
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::*;

/// Maps driver errors, turning unique violations into [`StoreError::Duplicate`].
trait Catch<T> {
    fn catch(self) -> Result<T>;
}

impl<T> Catch<T> for std::result::Result<T, sqlx::Error> {
    fn catch(self) -> Result<T> {
        self.map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate {
                constraint: db.constraint().unwrap_or_default().to_owned(),
            },
            err => StoreError::Sqlx(err),
        })
    }
}

fn corrupted(column: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("invalid `{column}` value: {err}"))
}

#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    password: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = StoreError;

    fn try_from(r: UserRecord) -> Result<Self> {
        Ok(User {
            id: r.id,
            name: r.name,
            email: r.email,
            password: r.password,
            role: r.role.parse().map_err(|e| corrupted("role", e))?,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct EmployerRecord {
    user_id: Uuid,
    name: String,
    address: String,
    phone: String,
    description: String,
    logo_url: Option<String>,
    is_profile_complete: bool,
    updated_at: DateTime<Utc>,
}

impl From<EmployerRecord> for EmployerProfile {
    fn from(r: EmployerRecord) -> Self {
        EmployerProfile {
            user_id: r.user_id,
            name: r.name,
            address: r.address,
            phone: r.phone,
            description: r.description,
            logo_url: r.logo_url,
            is_profile_complete: r.is_profile_complete,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct SeekerRecord {
    user_id: Uuid,
    name: String,
    address: String,
    phone: String,
    date_of_birth: Option<NaiveDate>,
    gender: String,
    photo_url: Option<String>,
    is_profile_complete: bool,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SeekerRecord> for SeekerProfile {
    type Error = StoreError;

    fn try_from(r: SeekerRecord) -> Result<Self> {
        Ok(SeekerProfile {
            user_id: r.user_id,
            name: r.name,
            address: r.address,
            phone: r.phone,
            date_of_birth: r.date_of_birth,
            gender: r.gender.parse().map_err(|e| corrupted("gender", e))?,
            photo_url: r.photo_url,
            is_profile_complete: r.is_profile_complete,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct PortfolioRecord {
    id: Uuid,
    seeker_id: Uuid,
    skills: Vec<String>,
    description: String,
    file_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PortfolioRecord> for PortfolioItem {
    fn from(r: PortfolioRecord) -> Self {
        PortfolioItem {
            id: r.id,
            seeker_id: r.seeker_id,
            skills: r.skills,
            description: r.description,
            file_url: r.file_url,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct PositionRecord {
    id: Uuid,
    employer_id: Uuid,
    name: String,
    capacity: i32,
    description: String,
    submission_start: DateTime<Utc>,
    submission_end: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<PositionRecord> for Position {
    type Error = StoreError;

    fn try_from(r: PositionRecord) -> Result<Self> {
        Ok(Position {
            id: r.id,
            employer_id: r.employer_id,
            name: r.name,
            capacity: u32::try_from(r.capacity).map_err(|e| corrupted("capacity", e))?,
            description: r.description,
            submission_start: r.submission_start,
            submission_end: r.submission_end,
            is_active: r.is_active,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct ApplicationRecord {
    id: Uuid,
    position_id: Uuid,
    seeker_id: Uuid,
    portfolio_id: Uuid,
    applied_at: DateTime<Utc>,
    status: String,
    notes: Option<String>,
}

impl TryFrom<ApplicationRecord> for Application {
    type Error = StoreError;

    fn try_from(r: ApplicationRecord) -> Result<Self> {
        Ok(Application {
            id: r.id,
            position_id: r.position_id,
            seeker_id: r.seeker_id,
            portfolio_id: r.portfolio_id,
            applied_at: r.applied_at,
            status: r.status.parse().map_err(|e| corrupted("status", e))?,
            notes: r.notes,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct SkillRecord {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<SkillRecord> for Skill {
    fn from(r: SkillRecord) -> Self {
        Skill {
            id: r.id,
            name: r.name,
            created_at: r.created_at,
        }
    }
}

/// PostgreSQL implementation of every repository port.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new [`PgStore`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(User::try_from)
        .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(User::try_from)
        .transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .catch()?;

        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for PgStore {
    async fn save_employer(&self, profile: &EmployerProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO employer_profiles
                (user_id, name, address, phone, description, logo_url, is_profile_complete, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE SET
                name = EXCLUDED.name,
                address = EXCLUDED.address,
                phone = EXCLUDED.phone,
                description = EXCLUDED.description,
                logo_url = EXCLUDED.logo_url,
                is_profile_complete = EXCLUDED.is_profile_complete,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.name)
        .bind(&profile.address)
        .bind(&profile.phone)
        .bind(&profile.description)
        .bind(&profile.logo_url)
        .bind(profile.is_profile_complete)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(())
    }

    async fn save_seeker(&self, profile: &SeekerProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO seeker_profiles
                (user_id, name, address, phone, date_of_birth, gender, photo_url, is_profile_complete, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO UPDATE SET
                name = EXCLUDED.name,
                address = EXCLUDED.address,
                phone = EXCLUDED.phone,
                date_of_birth = EXCLUDED.date_of_birth,
                gender = EXCLUDED.gender,
                photo_url = EXCLUDED.photo_url,
                is_profile_complete = EXCLUDED.is_profile_complete,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.name)
        .bind(&profile.address)
        .bind(&profile.phone)
        .bind(profile.date_of_birth)
        .bind(profile.gender.as_str())
        .bind(&profile.photo_url)
        .bind(profile.is_profile_complete)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(())
    }

    async fn find_employer(&self, user_id: Uuid) -> Result<Option<EmployerProfile>> {
        let record = sqlx::query_as::<_, EmployerRecord>(
            r#"
            SELECT user_id, name, address, phone, description, logo_url, is_profile_complete, updated_at
            FROM employer_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .catch()?;

        Ok(record.map(EmployerProfile::from))
    }

    async fn find_seeker(&self, user_id: Uuid) -> Result<Option<SeekerProfile>> {
        sqlx::query_as::<_, SeekerRecord>(
            r#"
            SELECT user_id, name, address, phone, date_of_birth, gender, photo_url, is_profile_complete, updated_at
            FROM seeker_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(SeekerProfile::try_from)
        .transpose()
    }
}

#[async_trait]
impl PortfolioRepository for PgStore {
    async fn insert(&self, item: &PortfolioItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO portfolios (id, seeker_id, skills, description, file_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id)
        .bind(item.seeker_id)
        .bind(&item.skills)
        .bind(&item.description)
        .bind(&item.file_url)
        .bind(item.created_at)
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(())
    }

    async fn update(&self, item: &PortfolioItem) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE portfolios
            SET skills = $3, description = $4, file_url = $5
            WHERE id = $1 AND seeker_id = $2
            "#,
        )
        .bind(item.id)
        .bind(item.seeker_id)
        .bind(&item.skills)
        .bind(&item.description)
        .bind(&item.file_url)
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PortfolioItem>> {
        let record = sqlx::query_as::<_, PortfolioRecord>(
            r#"
            SELECT id, seeker_id, skills, description, file_url, created_at
            FROM portfolios
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .catch()?;

        Ok(record.map(PortfolioItem::from))
    }

    async fn list_by_seeker(&self, seeker_id: Uuid) -> Result<Vec<PortfolioItem>> {
        let records = sqlx::query_as::<_, PortfolioRecord>(
            r#"
            SELECT id, seeker_id, skills, description, file_url, created_at
            FROM portfolios
            WHERE seeker_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(seeker_id)
        .fetch_all(&self.pool)
        .await
        .catch()?;

        Ok(records.into_iter().map(PortfolioItem::from).collect())
    }

    async fn delete(&self, seeker_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM portfolios WHERE id = $1 AND seeker_id = $2")
            .bind(id)
            .bind(seeker_id)
            .execute(&self.pool)
            .await
            .catch()?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PositionRepository for PgStore {
    async fn insert(&self, position: &Position) -> Result<()> {
        let capacity =
            i32::try_from(position.capacity).map_err(|e| corrupted("capacity", e))?;

        sqlx::query(
            r#"
            INSERT INTO positions
                (id, employer_id, name, capacity, description, submission_start, submission_end, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(position.id)
        .bind(position.employer_id)
        .bind(&position.name)
        .bind(capacity)
        .bind(&position.description)
        .bind(position.submission_start)
        .bind(position.submission_end)
        .bind(position.is_active)
        .bind(position.created_at)
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Position>> {
        sqlx::query_as::<_, PositionRecord>(
            r#"
            SELECT id, employer_id, name, capacity, description, submission_start, submission_end, is_active, created_at
            FROM positions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(Position::try_from)
        .transpose()
    }

    async fn list_listed(&self, now: DateTime<Utc>) -> Result<Vec<Position>> {
        sqlx::query_as::<_, PositionRecord>(
            r#"
            SELECT id, employer_id, name, capacity, description, submission_start, submission_end, is_active, created_at
            FROM positions
            WHERE is_active AND submission_end >= $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .catch()?
        .into_iter()
        .map(Position::try_from)
        .collect()
    }

    async fn list_by_employer(&self, employer_id: Uuid) -> Result<Vec<Position>> {
        sqlx::query_as::<_, PositionRecord>(
            r#"
            SELECT id, employer_id, name, capacity, description, submission_start, submission_end, is_active, created_at
            FROM positions
            WHERE employer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(employer_id)
        .fetch_all(&self.pool)
        .await
        .catch()?
        .into_iter()
        .map(Position::try_from)
        .collect()
    }
}

#[async_trait]
impl ApplicationRepository for PgStore {
    async fn insert(&self, application: &Application) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO applications (id, position_id, seeker_id, portfolio_id, applied_at, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(application.id)
        .bind(application.position_id)
        .bind(application.seeker_id)
        .bind(application.portfolio_id)
        .bind(application.applied_at)
        .bind(application.status.as_str())
        .bind(&application.notes)
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>> {
        sqlx::query_as::<_, ApplicationRecord>(
            r#"
            SELECT id, position_id, seeker_id, portfolio_id, applied_at, status, notes
            FROM applications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(Application::try_from)
        .transpose()
    }

    async fn find_by_pair(
        &self,
        position_id: Uuid,
        seeker_id: Uuid,
    ) -> Result<Option<Application>> {
        sqlx::query_as::<_, ApplicationRecord>(
            r#"
            SELECT id, position_id, seeker_id, portfolio_id, applied_at, status, notes
            FROM applications
            WHERE position_id = $1 AND seeker_id = $2
            "#,
        )
        .bind(position_id)
        .bind(seeker_id)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(Application::try_from)
        .transpose()
    }

    async fn update_status(&self, application: &Application, expected: Status) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET status = $2, notes = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(application.id)
        .bind(application.status.as_str())
        .bind(&application.notes)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_positions(&self, position_ids: &[Uuid]) -> Result<Vec<Application>> {
        sqlx::query_as::<_, ApplicationRecord>(
            r#"
            SELECT id, position_id, seeker_id, portfolio_id, applied_at, status, notes
            FROM applications
            WHERE position_id = ANY($1)
            ORDER BY applied_at DESC
            "#,
        )
        .bind(position_ids)
        .fetch_all(&self.pool)
        .await
        .catch()?
        .into_iter()
        .map(Application::try_from)
        .collect()
    }

    async fn list_by_seeker(&self, seeker_id: Uuid) -> Result<Vec<Application>> {
        sqlx::query_as::<_, ApplicationRecord>(
            r#"
            SELECT id, position_id, seeker_id, portfolio_id, applied_at, status, notes
            FROM applications
            WHERE seeker_id = $1
            ORDER BY applied_at DESC
            "#,
        )
        .bind(seeker_id)
        .fetch_all(&self.pool)
        .await
        .catch()?
        .into_iter()
        .map(Application::try_from)
        .collect()
    }
}

#[async_trait]
impl RevocationLedger for PgStore {
    async fn insert(&self, digest: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (digest, revoked_at, expires_at)
            VALUES ($1, NOW(), $2)
            "#,
        )
        .bind(digest)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(())
    }

    async fn contains(&self, digest: &str, now: DateTime<Utc>) -> Result<bool> {
        let record = sqlx::query_as::<_, (i32,)>(
            "SELECT 1 FROM revoked_tokens WHERE digest = $1 AND expires_at > $2",
        )
        .bind(digest)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .catch()?;

        Ok(record.is_some())
    }

    async fn prune(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .catch()?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SkillRepository for PgStore {
    async fn insert(&self, skill: &Skill) -> Result<()> {
        sqlx::query("INSERT INTO skills (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(skill.id)
            .bind(&skill.name)
            .bind(skill.created_at)
            .execute(&self.pool)
            .await
            .catch()?;

        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Skill>> {
        let record = sqlx::query_as::<_, SkillRecord>(
            "SELECT id, name, created_at FROM skills WHERE lower(name) = lower($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .catch()?;

        Ok(record.map(Skill::from))
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<Skill>> {
        let pattern = search.map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        });

        let records = sqlx::query_as::<_, SkillRecord>(
            r#"
            SELECT id, name, created_at
            FROM skills
            WHERE $1::text IS NULL OR name ILIKE $1
            ORDER BY name ASC
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .catch()?;

        Ok(records.into_iter().map(Skill::from).collect())
    }
}
