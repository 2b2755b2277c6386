use axum::{Extension, extract::State};

use vidtube_types::api::{ChannelStats, DashboardVideo};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

pub async fn channel_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<ChannelStats>, ApiError> {
    let owner = user.id;
    let stats = state.with_db(move |db| db.channel_stats(owner)).await?;
    Ok(ApiResponse::ok(stats, "Channel stats fetched successfully"))
}

/// Every video of the requester's channel, drafts included.
pub async fn channel_videos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<DashboardVideo>>, ApiError> {
    let owner = user.id;
    let videos = state
        .with_db(move |db| db.channel_dashboard_videos(owner))
        .await?;
    Ok(ApiResponse::ok(videos, "Channel videos fetched successfully"))
}
