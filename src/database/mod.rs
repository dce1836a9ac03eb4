//! Persistence ports and their backends.
mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRef;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::AppState;
use crate::account::User;
use crate::application::{Application, Status};
use crate::config::Postgres;
use crate::portfolio::PortfolioItem;
use crate::position::Position;
use crate::profile::{EmployerProfile, SeekerProfile};
use crate::skill::Skill;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "hireboard";
pub const DEFAULT_POOL_SIZE: u32 = 10;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate value for `{constraint}`")]
    Duplicate { constraint: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("store unavailable: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(details: &str) -> Self {
        StoreError::Backend(details.to_owned())
    }

    pub fn duplicate(constraint: &str) -> Self {
        StoreError::Duplicate {
            constraint: constraint.to_owned(),
        }
    }
}

/// Port for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user. Fails with [`StoreError::Duplicate`] on a taken email.
    async fn insert(&self, user: &User) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Find a user by its lowercased email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Port for role-specific profiles, keyed by user.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Create or replace the employer profile of `profile.user_id`.
    async fn save_employer(&self, profile: &EmployerProfile) -> Result<()>;

    /// Create or replace the seeker profile of `profile.user_id`.
    async fn save_seeker(&self, profile: &SeekerProfile) -> Result<()>;

    async fn find_employer(&self, user_id: Uuid) -> Result<Option<EmployerProfile>>;

    async fn find_seeker(&self, user_id: Uuid) -> Result<Option<SeekerProfile>>;
}

/// Port for portfolio items. Lists are ordered newest first.
#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    async fn insert(&self, item: &PortfolioItem) -> Result<()>;

    async fn update(&self, item: &PortfolioItem) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PortfolioItem>>;

    async fn list_by_seeker(&self, seeker_id: Uuid) -> Result<Vec<PortfolioItem>>;

    /// Delete an item owned by `seeker_id`. Returns `false` if none matched.
    async fn delete(&self, seeker_id: Uuid, id: Uuid) -> Result<bool>;
}

/// Port for positions. Lists are ordered newest first.
#[async_trait]
pub trait PositionRepository: Send + Sync {
    async fn insert(&self, position: &Position) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Position>>;

    /// Active positions whose submission window has not ended at `now`.
    async fn list_listed(&self, now: DateTime<Utc>) -> Result<Vec<Position>>;

    async fn list_by_employer(&self, employer_id: Uuid) -> Result<Vec<Position>>;
}

/// Port for applications. Lists are ordered by `applied_at`, newest first.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the seeker already applied
    /// to the position.
    async fn insert(&self, application: &Application) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>>;

    async fn find_by_pair(&self, position_id: Uuid, seeker_id: Uuid)
    -> Result<Option<Application>>;

    /// Write the decided status of `application` if the stored status is
    /// still `expected`. Returns `false` when another writer got there first.
    async fn update_status(&self, application: &Application, expected: Status) -> Result<bool>;

    async fn list_by_positions(&self, position_ids: &[Uuid]) -> Result<Vec<Application>>;

    async fn list_by_seeker(&self, seeker_id: Uuid) -> Result<Vec<Application>>;
}

/// Port for the ledger of revoked tokens.
#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Record a revoked token digest. Fails with [`StoreError::Duplicate`]
    /// when the digest is already present.
    async fn insert(&self, digest: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Whether `digest` is revoked and its entry has not expired at `now`.
    async fn contains(&self, digest: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Drop entries expired at `now`, returning how many were removed.
    async fn prune(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Port for the skill catalog.
#[async_trait]
pub trait SkillRepository: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] on a name taken in any case.
    async fn insert(&self, skill: &Skill) -> Result<()>;

    /// Case-insensitive lookup.
    async fn find_by_name(&self, name: &str) -> Result<Option<Skill>>;

    /// Skills sorted by name, filtered by a case-insensitive substring.
    async fn list(&self, search: Option<&str>) -> Result<Vec<Skill>>;
}

/// Custom db structure to pass to Axum.
#[derive(Clone)]
pub struct Database {
    pub users: Arc<dyn UserRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub portfolios: Arc<dyn PortfolioRepository>,
    pub positions: Arc<dyn PositionRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub revocations: Arc<dyn RevocationLedger>,
    pub skills: Arc<dyn SkillRepository>,
    pool: Option<PgPool>,
}

impl Database {
    /// Init PostgreSQL connections and run pending migrations.
    pub async fn postgres(config: &Postgres) -> Result<Self> {
        let username = config.username.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let password = config.password.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let database = config.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME);

        let addr = format!(
            "postgres://{username}:{password}@{}/{database}",
            config.address
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size.unwrap_or(DEFAULT_POOL_SIZE))
            .connect(&addr)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        tracing::info!(hostname = %config.address, db = %database, "postgres connected");

        let store = Arc::new(PgStore::new(pool.clone()));
        Ok(Self {
            users: store.clone(),
            profiles: store.clone(),
            portfolios: store.clone(),
            positions: store.clone(),
            applications: store.clone(),
            revocations: store.clone(),
            skills: store,
            pool: Some(pool),
        })
    }

    /// Process-local store, used when no PostgreSQL instance is configured.
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            users: store.clone(),
            profiles: store.clone(),
            portfolios: store.clone(),
            positions: store.clone(),
            applications: store.clone(),
            revocations: store.clone(),
            skills: store,
            pool: None,
        }
    }

    /// Replace the profile repository.
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileRepository>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_portfolios(mut self, portfolios: Arc<dyn PortfolioRepository>) -> Self {
        self.portfolios = portfolios;
        self
    }

    /// Close pooled connections.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(app_state: &AppState) -> Database {
        app_state.db.clone()
    }
}
