use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;
use vidtube_types::api::TokenKind;

use crate::auth::ACCESS_COOKIE;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated requester, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Extract and validate the access token from the Authorization header or
/// the `accessToken` cookie. Tokens of deleted users are rejected.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .or_else(|| jar.get(ACCESS_COOKIE).map(|c| c.value().to_owned()))
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = state
        .auth
        .decode_token(&token, TokenKind::Access)
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    let user = state
        .with_db(move |db| db.get_user_by_id(claims.sub))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
    });
    Ok(next.run(req).await)
}
