//! HTTP API.
pub mod auth;
pub mod companies;
pub mod positions;
pub mod skills;
pub mod societies;
pub mod status;

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::ServerError;
use crate::blob::Upload;
use crate::error::Result;

/// JSON body checked with [`Validate`] before reaching the handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Plain acknowledgement body.
#[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_owned(),
        })
    }
}

/// Decode an optional base64 asset of a request body.
pub fn decode_upload(
    field: &'static str,
    payload: Option<&str>,
    max_size: usize,
) -> Result<Option<Upload>> {
    payload
        .filter(|payload| !payload.trim().is_empty())
        .map(|payload| Upload::decode(field, payload, max_size))
        .transpose()
}

/// In-memory state with cheap hashing parameters.
/// MUST NEVER be used in production.
#[cfg(test)]
pub fn state() -> crate::AppState {
    use std::sync::Arc;

    use crate::blob::MemoryBlobStore;
    use crate::config::{Argon2, Configuration};
    use crate::crypto::{Crypto, Hasher};
    use crate::database::Database;
    use crate::token::{TokenManager, TokenService};

    let mut config = Configuration::default();
    config.token.secret = Some("test-secret".into());
    config.argon2 = Some(Argon2 {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    });

    let db = Database::memory();
    let crypto = Crypto::new(config.argon2.clone(), b"pepper").unwrap();
    let manager = TokenManager::new(&config.name, &config.token).unwrap();
    let token = TokenService::new(manager, db.revocations.clone(), Hasher::new(b"pepper"));

    crate::AppState {
        config: Arc::new(config),
        db,
        crypto: Arc::new(crypto),
        token: Arc::new(token),
        blob: Arc::new(MemoryBlobStore::default()),
        metrics: None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Method, Response, StatusCode};
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde::de::DeserializeOwned;
    use serde_json::{Value, json};
    use uuid::Uuid;

    use crate::make_request;

    pub(crate) async fn body<T: DeserializeOwned>(response: Response<Body>) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Register an account and return its token and id.
    pub(crate) async fn register(app: &Router, email: &str, role: &str) -> (String, Uuid) {
        let response = make_request(
            None,
            app.clone(),
            Method::POST,
            "/auth/register",
            json!({
                "name": "Test Account",
                "email": email,
                "password": "hunter22",
                "role": role,
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = body(response).await;
        let token = body["token"].as_str().unwrap().to_owned();
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (token, id)
    }

    /// Register an employer with a completed company profile.
    pub(crate) async fn employer(app: &Router, email: &str) -> (String, Uuid) {
        let (token, id) = register(app, email, "HRD").await;
        let response = make_request(
            Some(&token),
            app.clone(),
            Method::POST,
            "/auth/complete-hrd-profile",
            json!({
                "name": "Acme",
                "address": "1 Main St",
                "phone": "555-0100",
                "description": "Anvils and more",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        (token, id)
    }

    /// Create an open position and return its id.
    pub(crate) async fn open_position(app: &Router, token: &str) -> Uuid {
        let now = Utc::now();
        let response = make_request(
            Some(token),
            app.clone(),
            Method::POST,
            "/positions",
            json!({
                "name": "Backend engineer",
                "capacity": 2,
                "description": "Rust services",
                "submissionStart": (now - Duration::days(1)).to_rfc3339(),
                "submissionEnd": (now + Duration::days(7)).to_rfc3339(),
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = body(response).await;
        body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Add a complete portfolio item for a seeker and return its id.
    pub(crate) async fn portfolio(app: &Router, token: &str) -> Uuid {
        let response = make_request(
            Some(token),
            app.clone(),
            Method::POST,
            "/societies/portfolio",
            json!({
                "skills": "Rust, SQL",
                "description": "Backend work",
                "file": "data:application/pdf;base64,JVBERi0xLjQ=",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = body(response).await;
        body["id"].as_str().unwrap().parse().unwrap()
    }

    #[test]
    fn test_decode_upload_skips_empty() {
        assert!(super::decode_upload("file", None, 10).unwrap().is_none());
        assert!(super::decode_upload("file", Some(" "), 10).unwrap().is_none());
        assert!(super::decode_upload("file", Some("aGVsbG8="), 10).unwrap().is_some());
    }
}
