//! Public skill catalog.
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::skill::{Skill, SkillService};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(
        min = 1,
        max = 50,
        message = "Skill name must be 1 to 50 characters long."
    ))]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Search {
    pub search: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<Skill>)> {
    let skill = SkillService::new(&state.db).create(&body.name).await?;
    Ok((StatusCode::CREATED, Json(skill)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<Search>,
) -> Result<Json<Vec<Skill>>> {
    let skills = SkillService::new(&state.db)
        .list(query.search.as_deref())
        .await?;
    Ok(Json(skills))
}

pub fn router() -> Router<AppState> {
    // `GET /skills?search=` goes to `list`.
    // `POST /skills` goes to `create`.
    Router::new().route("/", get(list).post(create))
}
