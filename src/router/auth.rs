//! Registration, login, logout and profile completion.
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router, middleware};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::account::{AccountService, Authenticated, Identity, NewAccount, Role};
use crate::error::Result;
use crate::middleware::{authenticate, employer_only, seeker_only};
use crate::profile::{
    EmployerDetails, EmployerProfile, Gender, ProfileService, SeekerDetails, SeekerProfile,
};
use crate::router::{Message, Valid, decode_upload};
use crate::token::Session;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterBody {
    #[validate(length(min = 1, max = 100, message = "Name must contain 1 to 100 characters."))]
    pub name: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 6, max = 255, message = "Password must contain at least 6 characters."))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginBody {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CompanyBody {
    #[validate(length(min = 1, message = "Name cannot be empty."))]
    pub name: String,
    #[validate(length(min = 1, message = "Address cannot be empty."))]
    pub address: String,
    #[validate(length(min = 1, message = "Phone cannot be empty."))]
    pub phone: String,
    #[validate(length(min = 1, message = "Description cannot be empty."))]
    pub description: String,
    /// Base64 or data URL.
    pub logo: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SocietyBody {
    #[validate(length(min = 1, message = "Name cannot be empty."))]
    pub name: String,
    #[validate(length(min = 1, message = "Address cannot be empty."))]
    pub address: String,
    #[validate(length(min = 1, message = "Phone cannot be empty."))]
    pub phone: String,
    #[serde(alias = "date_of_birth")]
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    /// Base64 or data URL.
    pub photo: Option<String>,
}

/// Handler to create an account.
pub async fn register(
    State(state): State<AppState>,
    Valid(body): Valid<RegisterBody>,
) -> Result<(StatusCode, Json<Authenticated>)> {
    let authenticated = AccountService::new(&state.db, &state.crypto, &state.token)
        .register(NewAccount {
            name: body.name,
            email: body.email,
            password: body.password,
            role: body.role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(authenticated)))
}

/// Handler to exchange credentials for a token.
pub async fn login(
    State(state): State<AppState>,
    Valid(body): Valid<LoginBody>,
) -> Result<Json<Authenticated>> {
    let authenticated = AccountService::new(&state.db, &state.crypto, &state.token)
        .login(&body.email, &body.password)
        .await?;

    Ok(Json(authenticated))
}

/// Handler to revoke the presented token.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Message>> {
    AccountService::new(&state.db, &state.crypto, &state.token)
        .logout(&session)
        .await?;

    Ok(Message::new("Logged out."))
}

pub async fn complete_hrd_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Valid(body): Valid<CompanyBody>,
) -> Result<Json<EmployerProfile>> {
    let logo = decode_upload("logo", body.logo.as_deref(), state.config.storage.max_size)?;

    let profile = ProfileService::new(&state.db, state.blob.as_ref())
        .complete_employer(
            identity.user_id,
            EmployerDetails {
                name: body.name,
                address: body.address,
                phone: body.phone,
                description: body.description,
            },
            logo,
        )
        .await?;

    Ok(Json(profile))
}

pub async fn complete_society_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Valid(body): Valid<SocietyBody>,
) -> Result<Json<SeekerProfile>> {
    let photo = decode_upload("photo", body.photo.as_deref(), state.config.storage.max_size)?;

    let profile = ProfileService::new(&state.db, state.blob.as_ref())
        .complete_seeker(
            identity.user_id,
            SeekerDetails {
                name: body.name,
                address: body.address,
                phone: body.phone,
                date_of_birth: body.date_of_birth,
                gender: body.gender,
            },
            photo,
        )
        .await?;

    Ok(Json(profile))
}

pub fn router(state: AppState) -> Router<AppState> {
    let employer = Router::new()
        // `POST /auth/complete-hrd-profile` goes to `complete_hrd_profile`.
        .route("/complete-hrd-profile", post(complete_hrd_profile))
        .route_layer(middleware::from_fn(employer_only));

    let seeker = Router::new()
        // `POST /auth/complete-society-profile` goes to `complete_society_profile`.
        .route("/complete-society-profile", post(complete_society_profile))
        .route_layer(middleware::from_fn(seeker_only));

    let authenticated = Router::new()
        // `POST /auth/logout` goes to `logout`.
        .route("/logout", post(logout))
        .merge(employer)
        .merge(seeker)
        .route_layer(middleware::from_fn_with_state(state, authenticate));

    Router::new()
        // `POST /auth/register` goes to `register`.
        .route("/register", post(register))
        // `POST /auth/login` goes to `login`.
        .route("/login", post(login))
        .merge(authenticated)
}
