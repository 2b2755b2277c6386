use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use vidtube_db::models::{PlaylistAdd, PlaylistRow};
use vidtube_types::api::{
    CreatePlaylistRequest, Playlist, PlaylistDetail, PlaylistMembership, UpdatePlaylistRequest,
};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::response::{ApiResponse, Empty};
use crate::state::AppState;
use crate::validate::{ensure_owner, non_blank, parse_id};

/// Loads a playlist the requester must own.
async fn owned_playlist(
    state: &AppState,
    playlist_id: Uuid,
    user: &AuthUser,
) -> Result<PlaylistRow, ApiError> {
    let playlist = state
        .with_db(move |db| db.get_playlist(playlist_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    ensure_owner(
        playlist.owner_id,
        user,
        "Unauthorized request, you don't own this playlist",
    )?;
    Ok(playlist)
}

fn parse_pair(video_id: &str, playlist_id: &str) -> Result<(Uuid, Uuid), ApiError> {
    const MESSAGE: &str = "Invalid video id or playlist id";
    Ok((parse_id(video_id, MESSAGE)?, parse_id(playlist_id, MESSAGE)?))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<CreatePlaylistRequest>, ApiError>,
) -> Result<ApiResponse<Playlist>, ApiError> {
    let (Some(name), Some(description)) = (
        non_blank(req.name.as_deref()).map(str::to_owned),
        non_blank(req.description.as_deref()).map(str::to_owned),
    ) else {
        return Err(ApiError::bad_request("Name and description are required"));
    };

    let id = Uuid::new_v4();
    let owner = user.id;
    let playlist = state
        .with_db(move |db| db.create_playlist(id, owner, &name, &description))
        .await?;

    info!("{} created playlist {}", user.username, playlist.id);
    Ok(ApiResponse::created(playlist, "Playlist created successfully"))
}

pub async fn user_playlists(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<Vec<PlaylistDetail>>, ApiError> {
    let owner = parse_id(&user_id, "Invalid user Id")?;
    ensure_owner(owner, &user, "Unauthorized access, you don't own this user")?;

    let playlists = state.with_db(move |db| db.user_playlists(owner)).await?;
    Ok(ApiResponse::ok(playlists, "Playlists fetched successfully"))
}

/// The requester's playlists, each flagged with whether it holds the video.
pub async fn playlists_containing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<Vec<PlaylistMembership>>, ApiError> {
    let video_id = parse_id(&video_id, "Invalid video Id")?;
    let owner = user.id;

    let membership = state
        .with_db(move |db| {
            if !db.get_video(video_id)?.is_some_and(|v| v.visible_to(owner)) {
                return Ok(None);
            }
            db.playlist_membership(owner, video_id).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(ApiResponse::ok(membership, "Playlists fetched successfully"))
}

pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(playlist_id): Path<String>,
) -> Result<ApiResponse<PlaylistDetail>, ApiError> {
    let playlist_id = parse_id(&playlist_id, "Invalid playlist Id")?;
    owned_playlist(&state, playlist_id, &user).await?;

    let detail = state
        .with_db(move |db| db.get_playlist_detail(playlist_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    Ok(ApiResponse::ok(detail, "Playlist fetched successfully"))
}

/// The duplicate check and the append are one statement, so two concurrent
/// adds of the same video cannot both succeed.
pub async fn add_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<ApiResponse<Playlist>, ApiError> {
    let (video_id, playlist_id) = parse_pair(&video_id, &playlist_id)?;
    owned_playlist(&state, playlist_id, &user).await?;

    let video = state
        .with_db(move |db| db.get_video(video_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    if !video.is_published {
        return Err(ApiError::bad_request("Video is not published"));
    }

    let (outcome, playlist) = state
        .with_db(move |db| db.add_video_to_playlist(playlist_id, video_id))
        .await?;
    if outcome == PlaylistAdd::AlreadyPresent {
        return Err(ApiError::bad_request("Video is already part of this playlist"));
    }

    Ok(ApiResponse::ok(playlist, "Video added to playlist successfully"))
}

pub async fn remove_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<ApiResponse<Playlist>, ApiError> {
    let (video_id, playlist_id) = parse_pair(&video_id, &playlist_id)?;
    owned_playlist(&state, playlist_id, &user).await?;

    let playlist = state
        .with_db(move |db| db.remove_video_from_playlist(playlist_id, video_id))
        .await?
        .ok_or_else(|| ApiError::bad_request("This video is not part of this playlist"))?;

    Ok(ApiResponse::ok(playlist, "Video removed from playlist successfully"))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(playlist_id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<UpdatePlaylistRequest>, ApiError>,
) -> Result<ApiResponse<Playlist>, ApiError> {
    let playlist_id = parse_id(&playlist_id, "Invalid playlist Id")?;

    let name = non_blank(req.name.as_deref()).map(str::to_owned);
    let description = non_blank(req.description.as_deref()).map(str::to_owned);
    if name.is_none() && description.is_none() {
        return Err(ApiError::bad_request("Please provide at least one field to update"));
    }

    owned_playlist(&state, playlist_id, &user).await?;

    let playlist = state
        .with_db(move |db| db.update_playlist(playlist_id, name.as_deref(), description.as_deref()))
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))?;

    Ok(ApiResponse::ok(playlist, "Playlist updated successfully"))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(playlist_id): Path<String>,
) -> Result<ApiResponse<Empty>, ApiError> {
    let playlist_id = parse_id(&playlist_id, "Invalid playlist Id")?;
    owned_playlist(&state, playlist_id, &user).await?;

    let deleted = state
        .with_db(move |db| db.delete_playlist(playlist_id))
        .await?;
    if !deleted {
        return Err(ApiError::not_found("Playlist not found"));
    }

    Ok(ApiResponse::ok(Empty {}, "Playlist deleted successfully"))
}
