//! Profile and portfolio of the calling job seeker.
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::account::Identity;
use crate::error::Result;
use crate::middleware::{authenticate, seeker_only};
use crate::portfolio::{
    NewPortfolio, PortfolioEntry, PortfolioPatch, PortfolioService, SkillsInput,
};
use crate::profile::{Gender, ProfileService, SeekerPatch, SeekerProfile};
use crate::router::{Message, Valid, decode_upload};

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    #[validate(length(max = 100, message = "Name must contain at most 100 characters."))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "date_of_birth")]
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub photo: Option<String>,
}

/// Portfolio item as sent by clients.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct PortfolioBody {
    pub skills: Option<SkillsInput>,
    #[validate(length(max = 5000, message = "Description must contain at most 5000 characters."))]
    pub description: Option<String>,
    /// Base64 or data URL.
    pub file: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<SeekerProfile>> {
    let profile = ProfileService::new(&state.db, state.blob.as_ref())
        .seeker(identity.user_id)
        .await?;

    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Valid(body): Valid<UpdateBody>,
) -> Result<Json<SeekerProfile>> {
    let photo = decode_upload("photo", body.photo.as_deref(), state.config.storage.max_size)?;
    let patch = SeekerPatch {
        name: body.name,
        address: body.address,
        phone: body.phone,
        date_of_birth: body.date_of_birth,
        gender: body.gender,
    };

    let profile = ProfileService::new(&state.db, state.blob.as_ref())
        .update_seeker(identity.user_id, patch, photo)
        .await?;

    Ok(Json(profile))
}

fn portfolios(state: &AppState) -> PortfolioService<'_> {
    PortfolioService::new(&state.db, state.blob.as_ref(), state.config.policy.portfolio)
}

pub async fn create_portfolio(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Valid(body): Valid<PortfolioBody>,
) -> Result<(StatusCode, Json<PortfolioEntry>)> {
    let file = decode_upload("file", body.file.as_deref(), state.config.storage.max_size)?;
    let new = NewPortfolio {
        skills: body.skills.map(SkillsInput::normalize).unwrap_or_default(),
        description: body.description.unwrap_or_default(),
        file,
    };

    let entry = portfolios(&state).create(identity.user_id, new).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_portfolio(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<PortfolioEntry>>> {
    Ok(Json(portfolios(&state).list(identity.user_id).await?))
}

pub async fn get_portfolio(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<PortfolioEntry>> {
    let item = portfolios(&state).get(identity.user_id, id).await?;
    Ok(Json(item.into()))
}

pub async fn update_portfolio(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Valid(body): Valid<PortfolioBody>,
) -> Result<Json<PortfolioEntry>> {
    let file = decode_upload("file", body.file.as_deref(), state.config.storage.max_size)?;
    let patch = PortfolioPatch {
        skills: body.skills.map(SkillsInput::normalize),
        description: body.description,
        file,
    };

    let entry = portfolios(&state)
        .update(identity.user_id, id, patch)
        .await?;
    Ok(Json(entry))
}

pub async fn delete_portfolio(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>> {
    portfolios(&state).delete(identity.user_id, id).await?;
    Ok(Message::new("Portfolio deleted."))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `GET /societies/me` goes to `get_profile`.
        // `PUT /societies/me` goes to `update_profile`.
        .route("/me", get(get_profile).put(update_profile))
        // `GET /societies/portfolio` goes to `list_portfolio`.
        // `POST /societies/portfolio` goes to `create_portfolio`.
        .route("/portfolio", get(list_portfolio).post(create_portfolio))
        .route(
            "/portfolio/{id}",
            get(get_portfolio)
                .put(update_portfolio)
                .delete(delete_portfolio),
        )
        .route_layer(middleware::from_fn(seeker_only))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}
