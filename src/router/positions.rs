//! Positions and the applications sent to them.
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::account::Identity;
use crate::application::{
    Application, ApplicationService, ApplyRequest, Decision, ReceivedApplication, SentApplication,
};
use crate::error::Result;
use crate::middleware::{authenticate, employer_only, seeker_only};
use crate::position::{NewPosition, Position, PositionService, PositionView};
use crate::router::Valid;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PositionBody {
    #[validate(length(min = 1, max = 200, message = "Name must contain 1 to 200 characters."))]
    pub name: String,
    pub capacity: i64,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "submission_start")]
    pub submission_start: String,
    #[serde(alias = "submission_end")]
    pub submission_end: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyBody {
    #[serde(alias = "cover_letter")]
    #[validate(length(max = 5000, message = "Notes must contain at most 5000 characters."))]
    pub notes: Option<String>,
    #[serde(alias = "portfolio_id")]
    pub portfolio_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DecideBody {
    pub status: Decision,
    #[serde(alias = "message")]
    #[validate(length(max = 5000, message = "Notes must contain at most 5000 characters."))]
    pub notes: Option<String>,
}

fn applications(state: &AppState) -> ApplicationService<'_> {
    ApplicationService::new(&state.db, state.config.policy.enforce_submission_window)
}

/// Handler listing positions still accepting applications.
pub async fn list_public(State(state): State<AppState>) -> Result<Json<Vec<PositionView>>> {
    Ok(Json(PositionService::new(&state.db).list_public().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Valid(body): Valid<PositionBody>,
) -> Result<(StatusCode, Json<Position>)> {
    let position = PositionService::new(&state.db)
        .create(
            identity.user_id,
            NewPosition {
                name: body.name,
                capacity: body.capacity,
                description: body.description,
                submission_start: body.submission_start,
                submission_end: body.submission_end,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(position)))
}

pub async fn list_own(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Position>>> {
    Ok(Json(
        PositionService::new(&state.db)
            .list_own(identity.user_id)
            .await?,
    ))
}

pub async fn list_company_applications(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ReceivedApplication>>> {
    Ok(Json(
        applications(&state)
            .list_for_company(identity.user_id)
            .await?,
    ))
}

pub async fn list_position_applications(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(position_id): Path<Uuid>,
) -> Result<Json<Vec<ReceivedApplication>>> {
    Ok(Json(
        applications(&state)
            .list_for_position(identity.user_id, position_id)
            .await?,
    ))
}

pub async fn decide(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(application_id): Path<Uuid>,
    Valid(body): Valid<DecideBody>,
) -> Result<Json<Application>> {
    let application = applications(&state)
        .decide(identity.user_id, application_id, body.status, body.notes)
        .await?;

    Ok(Json(application))
}

pub async fn apply(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(position_id): Path<Uuid>,
    Valid(body): Valid<ApplyBody>,
) -> Result<(StatusCode, Json<Application>)> {
    let application = applications(&state)
        .apply(
            identity.user_id,
            position_id,
            ApplyRequest {
                notes: body.notes,
                portfolio_id: body.portfolio_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<SentApplication>>> {
    Ok(Json(applications(&state).list_mine(identity.user_id).await?))
}

pub fn router(state: AppState) -> Router<AppState> {
    let employer = Router::new()
        // `POST /positions` goes to `create`.
        .route("/", post(create))
        // `GET /positions/company` goes to `list_own`.
        .route("/company", get(list_own))
        .route("/company/applications", get(list_company_applications))
        .route("/{id}/applications", get(list_position_applications))
        // `PUT /positions/applications/:ID` goes to `decide`.
        .route("/applications/{id}", put(decide))
        .route_layer(middleware::from_fn(employer_only))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let seeker = Router::new()
        // `POST /positions/:ID/apply` goes to `apply`.
        .route("/{id}/apply", post(apply))
        .route("/my-applications", get(list_mine))
        .route_layer(middleware::from_fn(seeker_only))
        .route_layer(middleware::from_fn_with_state(state, authenticate));

    Router::new()
        // `GET /positions` goes to `list_public`.
        .route("/", get(list_public))
        .merge(employer)
        .merge(seeker)
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};
    use uuid::Uuid;

    use crate::router::tests::{body, employer, open_position, portfolio, register};
    use crate::*;

    async fn apply(app: &Router, token: &str, position: Uuid) -> axum::http::Response<axum::body::Body> {
        make_request(
            Some(token),
            app.clone(),
            Method::POST,
            &format!("/positions/{position}/apply"),
            json!({ "cover_letter": "Hire me" }).to_string(),
        )
        .await
    }

    async fn decide(
        app: &Router,
        token: &str,
        application: &str,
        status: &str,
    ) -> axum::http::Response<axum::body::Body> {
        make_request(
            Some(token),
            app.clone(),
            Method::PUT,
            &format!("/positions/applications/{application}"),
            json!({ "status": status, "message": "Welcome aboard" }).to_string(),
        )
        .await
    }

    #[tokio::test]
    async fn test_application_lifecycle_handler() {
        let app = app(router::state());
        let (hrd, _) = employer(&app, "acme@example.com").await;
        let (seeker, seeker_id) = register(&app, "jane@example.com", "Society").await;
        let position = open_position(&app, &hrd).await;

        let response = apply(&app, &seeker, position).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let portfolio_id = portfolio(&app, &seeker).await;
        let response = apply(&app, &seeker, position).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let application: Value = body(response).await;
        assert_eq!(application["status"], "PENDING");
        assert_eq!(application["notes"], "Hire me");
        assert_eq!(application["portfolioId"], portfolio_id.to_string());
        let id = application["id"].as_str().unwrap().to_owned();

        let response = decide(&app, &hrd, &id, "ACCEPTED").await;
        assert_eq!(response.status(), StatusCode::OK);
        let decided: Value = body(response).await;
        assert_eq!(decided["status"], "ACCEPTED");
        assert_eq!(decided["notes"], "Welcome aboard");

        let response = decide(&app, &hrd, &id, "REJECTED").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = make_request(
            Some(&hrd),
            app.clone(),
            Method::GET,
            &format!("/positions/{position}/applications"),
            String::new(),
        )
        .await;
        let received: Vec<Value> = body(response).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["status"], "ACCEPTED");
        assert_eq!(received[0]["seeker"]["userId"], seeker_id.to_string());
        assert_eq!(received[0]["portfolio"]["id"], portfolio_id.to_string());

        let response = make_request(
            Some(&seeker),
            app,
            Method::GET,
            "/positions/my-applications",
            String::new(),
        )
        .await;
        let sent: Vec<Value> = body(response).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["company"]["name"], "Acme");
        assert_eq!(sent[0]["position"]["id"], position.to_string());
    }

    #[tokio::test]
    async fn test_apply_twice_handler() {
        let app = app(router::state());
        let (hrd, _) = employer(&app, "acme@example.com").await;
        let (seeker, _) = register(&app, "jane@example.com", "Society").await;
        let position = open_position(&app, &hrd).await;
        portfolio(&app, &seeker).await;

        assert_eq!(apply(&app, &seeker, position).await.status(), StatusCode::CREATED);
        assert_eq!(apply(&app, &seeker, position).await.status(), StatusCode::BAD_REQUEST);

        let response = make_request(
            Some(&hrd),
            app,
            Method::GET,
            "/positions/company/applications",
            String::new(),
        )
        .await;
        let received: Vec<Value> = body(response).await;
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn test_decide_on_foreign_position_handler() {
        let app = app(router::state());
        let (owner, _) = employer(&app, "acme@example.com").await;
        let (intruder, _) = employer(&app, "globex@example.com").await;
        let (seeker, _) = register(&app, "jane@example.com", "Society").await;
        let position = open_position(&app, &owner).await;
        portfolio(&app, &seeker).await;

        let application: Value = body(apply(&app, &seeker, position).await).await;
        let id = application["id"].as_str().unwrap();

        let response = decide(&app, &intruder, id, "REJECTED").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = make_request(
            Some(&intruder),
            app.clone(),
            Method::GET,
            &format!("/positions/{position}/applications"),
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = decide(&app, &seeker, id, "ACCEPTED").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_public_listing_handler() {
        let app = app(router::state());
        let (hrd, _) = employer(&app, "acme@example.com").await;
        let open = open_position(&app, &hrd).await;

        let now = Utc::now();
        let response = make_request(
            Some(&hrd),
            app.clone(),
            Method::POST,
            "/positions",
            json!({
                "name": "Closed",
                "capacity": 1,
                "submission_start": (now - Duration::days(10)).to_rfc3339(),
                "submission_end": (now - Duration::days(1)).to_rfc3339(),
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let closed: Value = body(response).await;

        let response = make_request(None, app.clone(), Method::GET, "/positions", String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listed: Vec<Value> = body(response).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["id"], open.to_string());
        assert_eq!(listed[0]["company"]["name"], "Acme");

        let response =
            make_request(Some(&hrd), app, Method::GET, "/positions/company", String::new()).await;
        let own: Vec<Value> = body(response).await;
        assert_eq!(own.len(), 2);
        assert!(own.iter().any(|p| p["id"] == closed["id"]));
    }

    #[tokio::test]
    async fn test_create_position_validation_handler() {
        let app = app(router::state());
        let (hrd, _) = employer(&app, "acme@example.com").await;
        let (seeker, _) = register(&app, "jane@example.com", "Society").await;
        let body = json!({
            "name": "Backend engineer",
            "capacity": 0,
            "submissionStart": "2030-01-01",
            "submissionEnd": "2030-02-01",
        })
        .to_string();

        let response =
            make_request(Some(&hrd), app.clone(), Method::POST, "/positions", body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let huge = json!({
            "name": "Backend engineer",
            "capacity": 3_000_000_000_i64,
            "submissionStart": "2030-01-01",
            "submissionEnd": "2030-02-01",
        })
        .to_string();
        let response =
            make_request(Some(&hrd), app.clone(), Method::POST, "/positions", huge).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = make_request(Some(&seeker), app, Method::POST, "/positions", body).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
