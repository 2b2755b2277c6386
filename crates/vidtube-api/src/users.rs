use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
};
use axum_extra::extract::WithRejection;
use tracing::info;

use vidtube_db::models::UserImage;
use vidtube_types::api::{ChannelProfile, UpdateAccountRequest, UserProfile, VideoSummary};

use crate::account::send_verification_best_effort;
use crate::error::ApiError;
use crate::form::MultipartForm;
use crate::media::MediaKind;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validate::non_blank;

pub async fn current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let id = user.id;
    let row = state
        .with_db(move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::ok(row.profile(), "Current user fetched successfully"))
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateAccountRequest>, ApiError>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let full_name = non_blank(req.full_name.as_deref()).map(str::to_owned);
    let email = non_blank(req.email.as_deref()).map(str::to_lowercase);

    if full_name.is_none() && email.is_none() {
        return Err(ApiError::bad_request("Full name or email is required"));
    }
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let id = user.id;
    let email_submitted = email.is_some();
    if let Some(email) = email.clone() {
        let owner = state
            .with_db(move |db| db.get_user_by_email(&email))
            .await?;
        if owner.is_some_and(|other| other.id != id) {
            return Err(ApiError::conflict("Email is already in use"));
        }
    }

    let row = state
        .with_db(move |db| db.update_account(id, full_name.as_deref(), email.as_deref()))
        .await
        .map_err(|e| e.on_unique_violation("Email is already in use"))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if email_submitted && !row.email_verified {
        send_verification_best_effort(&state, row.id, &row.email).await;
    }

    Ok(ApiResponse::ok(row.profile(), "Account details updated successfully"))
}

pub async fn update_avatar(
    state: State<AppState>,
    user: Extension<AuthUser>,
    multipart: WithRejection<Multipart, ApiError>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    replace_image(state, user, multipart, UserImage::Avatar).await
}

pub async fn update_cover_image(
    state: State<AppState>,
    user: Extension<AuthUser>,
    multipart: WithRejection<Multipart, ApiError>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    replace_image(state, user, multipart, UserImage::CoverImage).await
}

async fn replace_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
    image: UserImage,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let (field, missing, message) = match image {
        UserImage::Avatar => ("avatar", "Avatar file is missing", "Avatar updated successfully"),
        UserImage::CoverImage => (
            "coverImage",
            "Cover image file is missing",
            "Cover image updated successfully",
        ),
    };

    let mut form = MultipartForm::parse(multipart).await?;
    let file = form
        .take_file(field)
        .ok_or_else(|| ApiError::bad_request(missing))?;

    let url = state.media.save(&file, MediaKind::Image).await?;

    let id = user.id;
    let new_url = url.clone();
    let (previous, row) = state
        .with_db(move |db| {
            let previous = db.replace_user_image(id, image, &new_url)?;
            Ok((previous, db.get_user_by_id(id)?))
        })
        .await?;

    if let Some(old) = previous.filter(|old| *old != url) {
        state.media.remove(&old).await;
    }

    let row = row.ok_or_else(|| ApiError::not_found("User not found"))?;
    info!("{} replaced {:?}", row.username, image);
    Ok(ApiResponse::ok(row.profile(), message))
}

pub async fn channel_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(username): Path<String>,
) -> Result<ApiResponse<ChannelProfile>, ApiError> {
    let username = non_blank(Some(&username))
        .map(str::to_lowercase)
        .ok_or_else(|| ApiError::bad_request("Username is missing"))?;

    let viewer = user.id;
    let profile = state
        .with_db(move |db| db.get_channel_profile(&username, viewer))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

pub async fn watch_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<VideoSummary>>, ApiError> {
    let id = user.id;
    let history = state.with_db(move |db| db.watch_history(id)).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
