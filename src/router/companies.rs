//! Company profile of the calling employer.
use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::account::Identity;
use crate::error::Result;
use crate::middleware::{authenticate, employer_only};
use crate::profile::{EmployerPatch, EmployerProfile, ProfileService};
use crate::router::{Valid, decode_upload};

/// Every field is optional. Present fields replace the stored ones.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateBody {
    #[validate(length(max = 100, message = "Name must contain at most 100 characters."))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub logo: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<EmployerProfile>> {
    let profile = ProfileService::new(&state.db, state.blob.as_ref())
        .employer(identity.user_id)
        .await?;

    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Valid(body): Valid<UpdateBody>,
) -> Result<Json<EmployerProfile>> {
    let logo = decode_upload("logo", body.logo.as_deref(), state.config.storage.max_size)?;
    let patch = EmployerPatch {
        name: body.name,
        address: body.address,
        phone: body.phone,
        description: body.description,
    };

    let profile = ProfileService::new(&state.db, state.blob.as_ref())
        .update_employer(identity.user_id, patch, logo)
        .await?;

    Ok(Json(profile))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `GET /companies/me` goes to `get_profile`.
        // `PUT /companies/me` goes to `update_profile`.
        .route("/me", get(get_profile).put(update_profile))
        .route_layer(middleware::from_fn(employer_only))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}
