//! Manage json web tokens and their revocation.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::{Identity, Role};
use crate::config::Token as TokenConfig;
use crate::crypto::Hasher;
use crate::database::{RevocationLedger, StoreError};

const DEFAULT_AUDIENCE: &str = "hireboard";

/// Reasons a token is refused, or could not be handled.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no token")]
    Missing,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token expired")]
    Expired,
    #[error("token revoked")]
    Revoked,
    #[error("revocation ledger unavailable: {0}")]
    Ledger(StoreError),
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Recipients that the JWT is intended for.
    pub aud: String,
    /// Expiration time, in seconds since epoch.
    pub exp: i64,
    /// Issue time, in seconds since epoch.
    pub iat: i64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// User ID.
    pub sub: String,
    pub role: Role,
}

/// Manage JWT tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenManager {
    /// Create a new [`TokenManager`].
    ///
    /// A shared `secret` selects HS256, otherwise the PEM pair selects ES384.
    pub fn new(issuer: &str, config: &TokenConfig) -> Result<Self, TokenError> {
        let (algorithm, encoding_key, decoding_key) = match (
            &config.secret,
            &config.private_key_pem,
            &config.public_key_pem,
        ) {
            (Some(secret), _, _) if !secret.is_empty() => (
                Algorithm::HS256,
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            (_, Some(private_key), Some(public_key)) => (
                Algorithm::ES384,
                EncodingKey::from_ec_pem(private_key.as_bytes()).map_err(TokenError::Signing)?,
                DecodingKey::from_ec_pem(public_key.as_bytes()).map_err(TokenError::Signing)?,
            ),
            _ => return Err(TokenError::Signing(ErrorKind::InvalidKeyFormat.into())),
        };

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            issuer: issuer.to_owned(),
            audience: config
                .audience
                .clone()
                .unwrap_or_else(|| DEFAULT_AUDIENCE.to_owned()),
            ttl: Duration::days(config.ttl_days),
        })
    }

    /// Create a new token for a user.
    pub fn create(&self, user_id: Uuid, role: Role) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            role,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;
        Ok((token, expires_at))
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // Revocation entries end at `exp`; no grace period past it.
        validation.leeway = 0;
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(err.to_string()),
            })
    }
}

/// Authenticated caller, with the token that proved it.
#[derive(Clone, Debug)]
pub struct Session {
    pub identity: Identity,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue, verify and revoke tokens.
pub struct TokenService {
    manager: TokenManager,
    ledger: Arc<dyn RevocationLedger>,
    hasher: Hasher,
}

impl TokenService {
    /// Create a new [`TokenService`].
    pub fn new(manager: TokenManager, ledger: Arc<dyn RevocationLedger>, hasher: Hasher) -> Self {
        Self {
            manager,
            ledger,
            hasher,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<(String, DateTime<Utc>), TokenError> {
        self.manager.create(user_id, role)
    }

    /// Check that a token is not revoked, then decode it.
    pub async fn verify(&self, token: &str) -> Result<Session, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let digest = self.hasher.digest(token);
        if self
            .ledger
            .contains(&digest, Utc::now())
            .await
            .map_err(TokenError::Ledger)?
        {
            return Err(TokenError::Revoked);
        }

        let claims = self.manager.decode(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|err| TokenError::Invalid(err.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| TokenError::Invalid("exp out of range".into()))?;

        Ok(Session {
            identity: Identity {
                user_id,
                role: claims.role,
            },
            token: token.to_owned(),
            expires_at,
        })
    }

    /// Revoke a token until it would have expired anyway.
    ///
    /// Revoking the same token twice succeeds.
    pub async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), TokenError> {
        let digest = self.hasher.digest(token);
        match self.ledger.insert(&digest, expires_at).await {
            Ok(()) => {
                metrics::counter!("tokens_revoked_total").increment(1);
                Ok(())
            },
            Err(StoreError::Duplicate { .. }) => Ok(()),
            Err(err) => Err(TokenError::Ledger(err)),
        }
    }

    /// Drop revocation entries of tokens that expired on their own.
    pub async fn prune(&self) -> Result<u64, StoreError> {
        self.ledger.prune(Utc::now()).await
    }
}
