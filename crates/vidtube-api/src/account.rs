//! Email verification and password reset. Both hand the user a one-time
//! token by mail; only its digest is stored, with an expiry.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use vidtube_db::models::TokenPurpose;
use vidtube_types::api::{EmailRequest, ResetPasswordRequest};

use crate::auth::{MIN_PASSWORD_LEN, hash_password, token_digest};
use crate::error::ApiError;
use crate::mail::{password_reset_mail, verification_mail};
use crate::response::{ApiResponse, Empty};
use crate::state::AppState;
use crate::validate::non_blank;

fn token_ttl(purpose: TokenPurpose) -> Duration {
    match purpose {
        TokenPurpose::VerifyEmail => Duration::hours(24),
        TokenPurpose::ResetPassword => Duration::hours(1),
    }
}

/// 256 random bits, hex encoded.
fn new_account_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues a fresh token for `purpose` (voiding the previous one) and mails
/// its link to `email`.
pub(crate) async fn send_account_mail(
    state: &AppState,
    user_id: Uuid,
    email: &str,
    purpose: TokenPurpose,
) -> Result<(), ApiError> {
    let token = new_account_token();
    let digest = token_digest(&token);
    let expires_at = Utc::now() + token_ttl(purpose);
    state
        .with_db(move |db| db.issue_account_token(user_id, purpose, &digest, expires_at))
        .await?;

    let mail = match purpose {
        TokenPurpose::VerifyEmail => verification_mail(email, &state.public_url, &token),
        TokenPurpose::ResetPassword => password_reset_mail(email, &state.public_url, &token),
    };
    state.mailer.send(&mail)?;
    Ok(())
}

/// Sends a verification mail, logging rather than failing the request when
/// delivery does not work out.
pub(crate) async fn send_verification_best_effort(state: &AppState, user_id: Uuid, email: &str) {
    if let Err(e) = send_account_mail(state, user_id, email, TokenPurpose::VerifyEmail).await {
        warn!("Could not send verification mail to {}: {}", email, e);
    }
}

fn requested_email(req: &EmailRequest) -> Result<String, ApiError> {
    non_blank(req.email.as_deref())
        .map(str::to_lowercase)
        .ok_or_else(|| ApiError::bad_request("Email is required"))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<ApiResponse<Empty>, ApiError> {
    let digest = token_digest(&token);
    let user_id = state
        .with_db(move |db| {
            let user = db.consume_account_token(TokenPurpose::VerifyEmail, &digest, Utc::now())?;
            if let Some(id) = user {
                db.mark_email_verified(id)?;
            }
            Ok(user)
        })
        .await?
        .ok_or_else(|| ApiError::bad_request("Verification link is invalid or has expired"))?;

    info!("Email verified for user {}", user_id);
    Ok(ApiResponse::ok(Empty {}, "Email verified successfully"))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<EmailRequest>, ApiError>,
) -> Result<ApiResponse<Empty>, ApiError> {
    let email = requested_email(&req)?;

    let lookup = email.clone();
    let user = state
        .with_db(move |db| db.get_user_by_email(&lookup))
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;
    if user.email_verified {
        return Err(ApiError::bad_request("Email is already verified"));
    }

    send_account_mail(&state, user.id, &user.email, TokenPurpose::VerifyEmail).await?;
    Ok(ApiResponse::ok(Empty {}, "Verification email sent successfully"))
}

/// Always answers the same way, whether or not the address is registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<EmailRequest>, ApiError>,
) -> Result<ApiResponse<Empty>, ApiError> {
    let email = requested_email(&req)?;

    let user = state
        .with_db(move |db| db.get_user_by_email(&email))
        .await?;
    match user {
        Some(user) => {
            send_account_mail(&state, user.id, &user.email, TokenPurpose::ResetPassword).await?;
            info!("Password reset requested for {}", user.username);
        }
        None => info!("Password reset requested for an unknown email"),
    }

    Ok(ApiResponse::ok(
        Empty {},
        "If an account exists for this email, a reset link has been sent",
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<ResetPasswordRequest>, ApiError>,
) -> Result<ApiResponse<Empty>, ApiError> {
    // Validate first so a rejected password does not burn the token.
    let new_password = req
        .new_password
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("New password is required"))?;
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }
    let password_hash = hash_password(&new_password)?;

    let digest = token_digest(&token);
    let user_id = state
        .with_db(move |db| {
            let user = db.consume_account_token(TokenPurpose::ResetPassword, &digest, Utc::now())?;
            if let Some(id) = user {
                db.reset_password(id, &password_hash)?;
            }
            Ok(user)
        })
        .await?
        .ok_or_else(|| ApiError::bad_request("Reset link is invalid or has expired"))?;

    info!("Password reset for user {}", user_id);
    Ok(ApiResponse::ok(Empty {}, "Password reset successfully"))
}
