use axum::{
    Extension,
    extract::{Path, State},
};

use vidtube_types::api::{LikeToggle, VideoSummary};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validate::parse_id;

/// Toggle a like on a video. Returns `{"liked": bool}` so the client can
/// update without refetching.
pub async fn toggle_video_like(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<LikeToggle>, ApiError> {
    let video_id = parse_id(&video_id, "Invalid video Id")?;
    let user_id = user.id;

    let liked = state
        .with_db(move |db| {
            if !db.get_video(video_id)?.is_some_and(|v| v.visible_to(user_id)) {
                return Ok(None);
            }
            db.toggle_video_like(video_id, user_id).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let message = if liked {
        "Video liked successfully"
    } else {
        "Video unliked successfully"
    };
    Ok(ApiResponse::ok(LikeToggle { liked }, message))
}

pub async fn liked_videos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<VideoSummary>>, ApiError> {
    let user_id = user.id;
    let videos = state.with_db(move |db| db.liked_videos(user_id)).await?;
    Ok(ApiResponse::ok(videos, "Liked videos fetched successfully"))
}
