use axum::{
    Extension,
    extract::{Path, State},
};
use tracing::debug;
use uuid::Uuid;

use vidtube_types::api::{SubscribedChannels, SubscriberList, SubscriptionToggle, VideoSummary};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validate::parse_id;

async fn ensure_user_exists(state: &AppState, id: Uuid, message: &'static str) -> Result<(), ApiError> {
    let exists = state
        .with_db(move |db| Ok(db.get_user_by_id(id)?.is_some()))
        .await?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::not_found(message))
    }
}

pub async fn toggle_subscription(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(channel_id): Path<String>,
) -> Result<ApiResponse<SubscriptionToggle>, ApiError> {
    let channel = parse_id(&channel_id, "Invalid channel Id")?;
    if channel == user.id {
        return Err(ApiError::bad_request("You cannot subscribe to your own channel"));
    }
    ensure_user_exists(&state, channel, "Channel not found").await?;

    let subscriber = user.id;
    let subscribed = state
        .with_db(move |db| db.toggle_subscription(subscriber, channel))
        .await?;

    debug!("{} subscription to {}: {}", user.username, channel, subscribed);
    let message = if subscribed {
        "Subscription added successfully"
    } else {
        "Subscription removed successfully"
    };
    Ok(ApiResponse::ok(SubscriptionToggle { subscribed }, message))
}

pub async fn channel_subscribers(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<ApiResponse<SubscriberList>, ApiError> {
    let channel = parse_id(&channel_id, "Invalid channel Id")?;
    ensure_user_exists(&state, channel, "Channel not found").await?;

    let subscribers = state
        .with_db(move |db| db.channel_subscribers(channel))
        .await?;

    Ok(ApiResponse::ok(
        SubscriberList {
            total_subscribers: subscribers.len() as u64,
            subscribers,
        },
        "Subscribers fetched successfully",
    ))
}

pub async fn subscribed_channels(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
) -> Result<ApiResponse<SubscribedChannels>, ApiError> {
    let subscriber = parse_id(&subscriber_id, "Invalid subscriber Id")?;
    ensure_user_exists(&state, subscriber, "User not found").await?;

    let channels = state
        .with_db(move |db| db.subscribed_channels(subscriber))
        .await?;

    Ok(ApiResponse::ok(
        SubscribedChannels {
            total_subscribed_channels: channels.len() as u64,
            subscribed_channels: channels,
        },
        "Subscribed channels fetched successfully",
    ))
}

/// Newest published video of every channel the user follows.
pub async fn latest_from_subscriptions(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
) -> Result<ApiResponse<Vec<VideoSummary>>, ApiError> {
    let subscriber = parse_id(&subscriber_id, "Invalid subscriber Id")?;
    ensure_user_exists(&state, subscriber, "User not found").await?;

    let videos = state
        .with_db(move |db| db.latest_from_subscriptions(subscriber))
        .await?;

    Ok(ApiResponse::ok(videos, "Latest videos fetched successfully"))
}
