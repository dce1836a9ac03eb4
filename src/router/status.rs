//! Public instance status for front-end identification.
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::config::Configuration;

/// Structured configuration.
#[derive(Serialize)]
pub struct Status {
    name: String,
    version: String,
}

/// Public server status.
pub async fn status(State(config): State<Arc<Configuration>>) -> Json<Status> {
    Json(Status {
        name: config.name.clone(),
        version: config.version.clone(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::Value;

    use crate::router::tests::body;
    use crate::*;

    #[tokio::test]
    async fn test_status_handler() {
        let app = app(router::state());

        let response = make_request(None, app, Method::GET, "/status.json", String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let status: Value = body(response).await;
        assert_eq!(status["name"], "hireboard");
        assert_eq!(status["version"], env!("CARGO_PKG_VERSION"));
    }
}
