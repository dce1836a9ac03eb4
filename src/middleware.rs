//! Middlewares for routes.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;
use crate::ServerError;
use crate::account::{Identity, Role};
use crate::error::Result;
use crate::token::TokenError;

/// Header carrying the token, checked before `Authorization`.
pub const TOKEN_HEADER: &str = "x-auth-token";
const BEARER: &str = "Bearer ";

fn extract_token(headers: &HeaderMap) -> Option<String> {
    let token = match headers.get(TOKEN_HEADER) {
        Some(value) => value.to_str().ok()?,
        None => headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix(BEARER)?,
    };

    let token = token.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

/// Verify the presented token and attach the caller's [`Identity`] and
/// [`Session`](crate::token::Session) to the request.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = extract_token(req.headers())
        .ok_or(ServerError::Unauthenticated(TokenError::Missing))?;

    let session = state.token.verify(&token).await.inspect_err(|err| {
        tracing::debug!(error = %err, "token refused");
    })?;

    req.extensions_mut().insert(session.identity);
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

async fn require_role(role: Role, req: Request, next: Next) -> Result<Response> {
    let Some(identity) = req.extensions().get::<Identity>() else {
        return Err(ServerError::Unauthenticated(TokenError::Missing));
    };

    if identity.role != role {
        return Err(ServerError::Forbidden(format!(
            "This action is reserved to {role} accounts."
        )));
    }

    Ok(next.run(req).await)
}

/// Role guard for employer (`HRD`) routes.
pub async fn employer_only(req: Request, next: Next) -> Result<Response> {
    require_role(Role::Employer, req, next).await
}

/// Role guard for seeker (`Society`) routes.
pub async fn seeker_only(req: Request, next: Next) -> Result<Response> {
    require_role(Role::Seeker, req, next).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));

        headers.insert(TOKEN_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));

        headers.insert(TOKEN_HEADER, HeaderValue::from_static("  "));
        assert_eq!(extract_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers), None);
    }
}
