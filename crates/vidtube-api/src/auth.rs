use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Multipart, State},
};
use axum_extra::extract::{
    WithRejection,
    cookie::{Cookie, CookieJar, SameSite},
};
use bytes::Bytes;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use vidtube_db::models::NewUser;
use vidtube_types::api::{
    ChangePasswordRequest, Claims, LoginRequest, LoginResponse, RefreshTokenRequest, TokenKind,
    TokenPair, UserProfile,
};

use crate::account::send_verification_best_effort;
use crate::error::ApiError;
use crate::form::MultipartForm;
use crate::media::MediaKind;
use crate::middleware::AuthUser;
use crate::response::{ApiResponse, Empty};
use crate::state::AppState;
use crate::validate::non_blank;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl AuthConfig {
    fn secret(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    pub fn create_token(&self, user_id: Uuid, username: &str, kind: TokenKind) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            kind,
            jti: Uuid::new_v4(),
            exp: (Utc::now() + self.ttl(kind)).timestamp() as usize,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret(kind).as_bytes()),
        )?;

        Ok(token)
    }

    /// Verifies signature and expiry, and that the token is of the expected kind.
    pub fn decode_token(&self, token: &str, kind: TokenKind) -> Option<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind).as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .ok()?;

        (data.claims.kind == kind).then_some(data.claims)
    }
}

/// Only a digest of the refresh token is persisted.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Signs a fresh access/refresh pair. Returns it with the refresh token's digest.
fn mint_tokens(auth: &AuthConfig, user_id: Uuid, username: &str) -> Result<(TokenPair, String), ApiError> {
    let access_token = auth.create_token(user_id, username, TokenKind::Access)?;
    let refresh_token = auth.create_token(user_id, username, TokenKind::Refresh)?;
    let digest = token_digest(&refresh_token);

    Ok((
        TokenPair {
            access_token,
            refresh_token,
        },
        digest,
    ))
}

/// Mints a fresh pair and records the refresh token, which invalidates
/// whatever refresh token the user held before.
async fn issue_tokens(state: &AppState, user_id: Uuid, username: &str) -> Result<TokenPair, ApiError> {
    let (tokens, digest) = mint_tokens(&state.auth, user_id, username)?;
    state
        .with_db(move |db| db.set_refresh_token_hash(user_id, Some(&digest)))
        .await?;
    Ok(tokens)
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

fn with_session(jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, tokens.access_token.clone()))
        .add(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone()))
}

fn without_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let mut form = MultipartForm::parse(multipart).await?;

    let (Some(full_name), Some(username), Some(email), Some(password)) = (
        form.field("fullName"),
        form.field("username").map(|u| u.to_lowercase()),
        form.field("email").map(|e| e.to_lowercase()),
        form.text("password").filter(|p| !p.trim().is_empty()).map(str::to_owned),
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    let username_len = username.chars().count();
    if !(3..=32).contains(&username_len) {
        return Err(ApiError::bad_request("Username must be between 3 and 32 characters"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }
    if !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let taken = {
        let username = username.clone();
        let email = email.clone();
        state
            .with_db(move |db| {
                Ok(db.get_user_by_username(&username)?.is_some()
                    || db.get_user_by_email(&email)?.is_some())
            })
            .await?
    };
    if taken {
        return Err(ApiError::conflict("User with email or username already exists"));
    }

    let avatar_file = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    let cover_file = form.take_file("coverImage");

    let password_hash = hash_password(&password)?;

    let avatar = state.media.save(&avatar_file, MediaKind::Image).await?;
    let cover_image = match &cover_file {
        Some(file) => match state.media.save(file, MediaKind::Image).await {
            Ok(url) => Some(url),
            Err(e) => {
                state.media.remove(&avatar).await;
                return Err(e);
            }
        },
        None => None,
    };

    let id = Uuid::new_v4();
    let created = {
        let (avatar, cover_image) = (avatar.clone(), cover_image.clone());
        state
            .with_db(move |db| {
                db.create_user(&NewUser {
                    id,
                    username: &username,
                    email: &email,
                    full_name: &full_name,
                    password_hash: &password_hash,
                    avatar: &avatar,
                    cover_image: cover_image.as_deref(),
                })
            })
            .await
    };

    let user = match created {
        Ok(user) => user,
        Err(e) => {
            state.media.remove(&avatar).await;
            if let Some(cover) = &cover_image {
                state.media.remove(cover).await;
            }
            return Err(e.on_unique_violation("User with email or username already exists"));
        }
    };

    info!("User registered: {} ({})", user.username, user.id);
    send_verification_best_effort(&state, user.id, &user.email).await;
    Ok(ApiResponse::created(user.profile(), "User registered successfully"))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), ApiError> {
    let username = non_blank(req.username.as_deref()).map(str::to_lowercase);
    let email = non_blank(req.email.as_deref()).map(str::to_lowercase);
    if username.is_none() && email.is_none() {
        return Err(ApiError::bad_request("Username or email is required"));
    }

    let user = state
        .with_db(move |db| match (username, email) {
            (Some(username), _) => db.get_user_by_username(&username),
            (None, Some(email)) => db.get_user_by_email(&email),
            (None, None) => Ok(None),
        })
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let tokens = issue_tokens(&state, user.id, &user.username).await?;
    info!("User logged in: {}", user.username);

    let jar = with_session(jar, &tokens);
    Ok((
        jar,
        ApiResponse::ok(
            LoginResponse {
                user: user.profile(),
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

/// Exchanges a refresh token (JSON body or cookie) for a new pair. Each
/// refresh token is single-use: only the most recently issued one matches.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, ApiResponse<TokenPair>), ApiError> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RefreshTokenRequest>(&body)
            .map_err(|_| ApiError::bad_request("Malformed request body"))?
            .refresh_token
    };

    let incoming = non_blank(from_body.as_deref())
        .map(str::to_owned)
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_owned()))
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let claims = state
        .auth
        .decode_token(&incoming, TokenKind::Refresh)
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    let user = state
        .with_db(move |db| db.get_user_by_id(claims.sub))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    // Only the digest currently on record can be swapped out.
    let (tokens, next) = mint_tokens(&state.auth, user.id, &user.username)?;
    let current = token_digest(&incoming);
    let user_id = user.id;
    let rotated = state
        .with_db(move |db| db.rotate_refresh_token_hash(user_id, &current, &next))
        .await?;
    if !rotated {
        warn!("Rejected stale refresh token for {}", user.username);
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }

    let jar = with_session(jar, &tokens);
    Ok((jar, ApiResponse::ok(tokens, "Access token refreshed")))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Empty>), ApiError> {
    let id = user.id;
    state
        .with_db(move |db| db.set_refresh_token_hash(id, None))
        .await?;

    info!("User logged out: {}", user.username);
    Ok((without_session(jar), ApiResponse::ok(Empty {}, "User logged out")))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<ChangePasswordRequest>, ApiError>,
) -> Result<ApiResponse<Empty>, ApiError> {
    if req.old_password.is_empty() || req.new_password.trim().is_empty() {
        return Err(ApiError::bad_request("Old and new password are required"));
    }
    if req.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let id = user.id;
    let row = state
        .with_db(move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(&req.old_password, &row.password)? {
        return Err(ApiError::bad_request("Invalid old password"));
    }

    let password_hash = hash_password(&req.new_password)?;
    state
        .with_db(move |db| db.update_password(id, &password_hash))
        .await?;

    Ok(ApiResponse::ok(Empty {}, "Password changed successfully"))
}
