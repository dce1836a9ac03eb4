use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::account::{Role, User, UserSummary};
use crate::crypto::Crypto;
use crate::database::{Database, StoreError};
use crate::error::{Result, ServerError};
use crate::profile::{EmployerProfile, SeekerProfile};
use crate::token::{Session, TokenService};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Registration request, already shape-checked by the router.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Issued token together with the account it belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticated {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserSummary,
    pub is_profile_complete: bool,
}

/// Registration, login and logout.
pub struct AccountService<'a> {
    db: &'a Database,
    crypto: &'a Crypto,
    tokens: &'a TokenService,
}

impl<'a> AccountService<'a> {
    pub fn new(db: &'a Database, crypto: &'a Crypto, tokens: &'a TokenService) -> Self {
        Self { db, crypto, tokens }
    }

    /// Create a user and its empty profile, then issue a token.
    ///
    /// If the profile cannot be created the user is deleted again before the
    /// error is returned.
    pub async fn register(&self, account: NewAccount) -> Result<Authenticated> {
        let email = account.email.trim().to_lowercase();
        let name = account.name.trim();
        if name.is_empty() {
            return Err(ServerError::field("name", "length", "Name cannot be empty."));
        }
        if account.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ServerError::field(
                "password",
                "length",
                "Password must contain at least 6 characters.",
            ));
        }

        if self.db.users.find_by_email(&email).await?.is_some() {
            return Err(ServerError::Conflict("Email is already registered.".into()));
        }

        let password = self
            .crypto
            .pwd
            .hash_password(&account.password)
            .map_err(|err| ServerError::internal("password hashing failed", err))?;

        let user = User {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            email,
            password,
            role: account.role,
            created_at: Utc::now(),
        };

        match self.db.users.insert(&user).await {
            Ok(()) => {},
            Err(StoreError::Duplicate { .. }) => {
                return Err(ServerError::Conflict("Email is already registered.".into()));
            },
            Err(err) => return Err(err.into()),
        }

        let created = match user.role {
            Role::Employer => {
                self.db
                    .profiles
                    .save_employer(&EmployerProfile::empty(user.id))
                    .await
            },
            Role::Seeker => {
                self.db
                    .profiles
                    .save_seeker(&SeekerProfile::empty(user.id))
                    .await
            },
        };

        if let Err(err) = created {
            tracing::warn!(user_id = %user.id, error = %err, "profile creation failed, removing user");
            if let Err(delete_err) = self.db.users.delete(user.id).await {
                tracing::error!(user_id = %user.id, error = %delete_err, "compensating delete failed, user is orphaned");
            }
            return Err(err.into());
        }

        let (token, expires_at) = self.tokens.issue(user.id, user.role)?;

        metrics::counter!("accounts_registered_total", "role" => user.role.as_str()).increment(1);
        tracing::info!(user_id = %user.id, role = %user.role, "user registered");

        Ok(Authenticated {
            token,
            expires_at,
            user: UserSummary::new(&user, false),
            is_profile_complete: false,
        })
    }

    /// Check credentials and issue a token.
    ///
    /// Unknown email and wrong password produce the same error.
    pub async fn login(&self, email: &str, password: &str) -> Result<Authenticated> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.db.users.find_by_email(&email).await? else {
            return Err(ServerError::InvalidCredentials);
        };

        if !self.crypto.pwd.verify_password(password, &user.password) {
            return Err(ServerError::InvalidCredentials);
        }

        let is_profile_complete = self.is_profile_complete(&user).await?;
        let (token, expires_at) = self.tokens.issue(user.id, user.role)?;

        tracing::debug!(user_id = %user.id, "user logged in");

        Ok(Authenticated {
            token,
            expires_at,
            user: UserSummary::new(&user, is_profile_complete),
            is_profile_complete,
        })
    }

    /// Revoke the token of the current session.
    pub async fn logout(&self, session: &Session) -> Result<()> {
        self.tokens
            .revoke(&session.token, session.expires_at)
            .await?;

        tracing::info!(user_id = %session.identity.user_id, "token revoked");
        Ok(())
    }

    async fn is_profile_complete(&self, user: &User) -> Result<bool> {
        let complete = match user.role {
            Role::Employer => self
                .db
                .profiles
                .find_employer(user.id)
                .await?
                .is_some_and(|p| p.is_profile_complete),
            Role::Seeker => self
                .db
                .profiles
                .find_seeker(user.id)
                .await?
                .is_some_and(|p| p.is_profile_complete),
        };
        Ok(complete)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::config::{Argon2, Token};
    use crate::crypto::Hasher;
    use crate::database::{ProfileRepository, Result as StoreResult};
    use crate::token::{TokenError, TokenManager};

    /// Profile repository that refuses every write.
    struct FailingProfiles;

    #[async_trait]
    impl ProfileRepository for FailingProfiles {
        async fn save_employer(&self, _: &EmployerProfile) -> StoreResult<()> {
            Err(StoreError::backend("profile store down"))
        }

        async fn save_seeker(&self, _: &SeekerProfile) -> StoreResult<()> {
            Err(StoreError::backend("profile store down"))
        }

        async fn find_employer(&self, _: Uuid) -> StoreResult<Option<EmployerProfile>> {
            Ok(None)
        }

        async fn find_seeker(&self, _: Uuid) -> StoreResult<Option<SeekerProfile>> {
            Ok(None)
        }
    }

    fn crypto() -> Crypto {
        Crypto::new(
            Some(Argon2 {
                memory_cost: 1024,
                iterations: 1,
                parallelism: 1,
                hash_length: 32,
            }),
            b"pepper",
        )
        .unwrap()
    }

    fn tokens(db: &Database) -> TokenService {
        let config = Token {
            secret: Some("test-secret".into()),
            ..Default::default()
        };
        TokenService::new(
            TokenManager::new("hireboard", &config).unwrap(),
            db.revocations.clone(),
            Hasher::new(b"pepper"),
        )
    }

    fn account(email: &str, role: Role) -> NewAccount {
        NewAccount {
            name: "Jane Doe".into(),
            email: email.into(),
            password: "hunter22".into(),
            role,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let db = Database::memory();
        let (crypto, tokens) = (crypto(), tokens(&db));
        let service = AccountService::new(&db, &crypto, &tokens);

        let registered = service
            .register(account("Jane@Example.com ", Role::Employer))
            .await
            .unwrap();
        assert_eq!(registered.user.email, "jane@example.com");
        assert!(!registered.is_profile_complete);

        let session = tokens.verify(&registered.token).await.unwrap();
        assert_eq!(session.identity.role, Role::Employer);
        assert!(db.profiles.find_employer(registered.user.id).await.unwrap().is_some());

        let logged = service.login("jane@example.com", "hunter22").await.unwrap();
        assert_eq!(logged.user.id, registered.user.id);
        assert_eq!(logged.user.role, Role::Employer);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let db = Database::memory();
        let (crypto, tokens) = (crypto(), tokens(&db));
        let service = AccountService::new(&db, &crypto, &tokens);

        let first = service
            .register(account("dup@example.com", Role::Seeker))
            .await
            .unwrap();
        assert!(matches!(
            service.register(account("DUP@example.com", Role::Employer)).await,
            Err(ServerError::Conflict(_))
        ));

        let user = db.users.find_by_email("dup@example.com").await.unwrap().unwrap();
        assert_eq!(user.id, first.user.id);
        assert_eq!(user.role, Role::Seeker);
    }

    #[tokio::test]
    async fn test_login_errors_are_identical() {
        let db = Database::memory();
        let (crypto, tokens) = (crypto(), tokens(&db));
        let service = AccountService::new(&db, &crypto, &tokens);
        service
            .register(account("known@example.com", Role::Seeker))
            .await
            .unwrap();

        let unknown = service.login("nobody@example.com", "hunter22").await.unwrap_err();
        let wrong = service.login("known@example.com", "hunter23").await.unwrap_err();
        assert!(matches!(unknown, ServerError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_short_password() {
        let db = Database::memory();
        let (crypto, tokens) = (crypto(), tokens(&db));
        let service = AccountService::new(&db, &crypto, &tokens);

        let mut new = account("short@example.com", Role::Seeker);
        new.password = "12345".into();
        assert!(matches!(service.register(new).await, Err(ServerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_blank_name() {
        let db = Database::memory();
        let (crypto, tokens) = (crypto(), tokens(&db));
        let service = AccountService::new(&db, &crypto, &tokens);

        let mut new = account("blank@example.com", Role::Employer);
        new.name = "   ".into();
        assert!(matches!(service.register(new).await, Err(ServerError::Validation(_))));
        assert!(db.users.find_by_email("blank@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_profile_failure_removes_user() {
        let db = Database::memory().with_profiles(Arc::new(FailingProfiles));
        let (crypto, tokens) = (crypto(), tokens(&db));
        let service = AccountService::new(&db, &crypto, &tokens);

        let err = service
            .register(account("orphan@example.com", Role::Employer))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Store(StoreError::Backend(_))));
        assert!(db.users.find_by_email("orphan@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let db = Database::memory();
        let (crypto, tokens) = (crypto(), tokens(&db));
        let service = AccountService::new(&db, &crypto, &tokens);

        let registered = service
            .register(account("bye@example.com", Role::Seeker))
            .await
            .unwrap();
        let session = tokens.verify(&registered.token).await.unwrap();

        service.logout(&session).await.unwrap();
        service.logout(&session).await.unwrap();
        assert!(matches!(
            tokens.verify(&registered.token).await,
            Err(TokenError::Revoked)
        ));
    }
}
