use axum::{
    Extension,
    extract::{Multipart, Path, Query, State},
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use vidtube_db::models::{NewVideo, VideoRow, VideoUpdate};
use vidtube_types::api::{
    ChannelVideosQuery, SearchQuery, SearchResults, Video, VideoDetail, VideoListQuery, VideoPage,
    VideoSummary,
};
use vidtube_types::models::{MAX_PAGE_LIMIT, PageRequest, VideoOrder};

use crate::error::ApiError;
use crate::form::MultipartForm;
use crate::media::MediaKind;
use crate::middleware::AuthUser;
use crate::response::{ApiResponse, Empty};
use crate::state::AppState;
use crate::validate::{ensure_owner, non_blank, parse_id};

const SEARCH_PAGE_LIMIT: u32 = 10;

/// Loads a video the requester must own.
async fn owned_video(
    state: &AppState,
    video_id: Uuid,
    user: &AuthUser,
    action: &str,
) -> Result<VideoRow, ApiError> {
    let video = state
        .with_db(move |db| db.get_video(video_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    ensure_owner(
        video.owner_id,
        user,
        &format!("You are not authorized to {action} this video"),
    )?;
    Ok(video)
}

fn parse_duration(raw: Option<&str>) -> Result<f64, ApiError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(0.0);
    };
    raw.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ApiError::bad_request("Duration must be a non-negative number"))
}

pub async fn publish_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<ApiResponse<Video>, ApiError> {
    let mut form = MultipartForm::parse(multipart).await?;

    let (Some(title), Some(description)) = (form.field("title"), form.field("description")) else {
        return Err(ApiError::bad_request("Title and description are required"));
    };
    let duration = parse_duration(form.text("duration"))?;

    let video_file = form
        .take_file("videoFile")
        .ok_or_else(|| ApiError::bad_request("Video file is required"))?;
    let thumbnail_file = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::bad_request("Thumbnail is required"))?;

    let video_url = state.media.save(&video_file, MediaKind::Video).await?;
    let thumbnail_url = match state.media.save(&thumbnail_file, MediaKind::Image).await {
        Ok(url) => url,
        Err(e) => {
            state.media.remove(&video_url).await;
            return Err(e);
        }
    };

    let id = Uuid::new_v4();
    let owner_id = user.id;
    let (video_file, thumbnail) = (video_url.clone(), thumbnail_url.clone());
    let inserted = state
        .with_db(move |db| {
            db.insert_video(&NewVideo {
                id,
                owner_id,
                title: &title,
                description: &description,
                video_file: &video_file,
                thumbnail: &thumbnail,
                duration,
            })
        })
        .await;

    match inserted {
        Ok(row) => {
            info!("{} published video {}", user.username, row.id);
            Ok(ApiResponse::created(Video::from(row), "Video uploaded successfully"))
        }
        Err(e) => {
            state.media.remove(&video_url).await;
            state.media.remove(&thumbnail_url).await;
            Err(e)
        }
    }
}

pub async fn list_videos(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<VideoListQuery>, ApiError>,
) -> Result<ApiResponse<VideoPage>, ApiError> {
    let order = VideoOrder::from_query(query.sort_by.as_deref(), query.sort_type)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let page = PageRequest::new(query.page, query.limit, MAX_PAGE_LIMIT);

    let (videos, total) = state
        .with_db(move |db| db.list_published_videos(order, page))
        .await?;

    Ok(ApiResponse::ok(
        VideoPage {
            videos,
            current_page: page.page,
            total_pages: page.total_pages(total),
            total_videos: total,
        },
        "Videos fetched successfully",
    ))
}

pub async fn search_videos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, ApiError>,
) -> Result<ApiResponse<SearchResults>, ApiError> {
    let needle = non_blank(query.query.as_deref())
        .map(str::to_owned)
        .ok_or_else(|| ApiError::bad_request("Search query is required"))?;
    let page = PageRequest::new(query.page, query.limit, SEARCH_PAGE_LIMIT);

    let viewer = user.id;
    let (channel, (videos, total)) = state
        .with_db(move |db| {
            let channel = db.search_channel(&needle, viewer)?;
            let videos = db.search_videos(&needle, page)?;
            Ok((channel, videos))
        })
        .await?;

    Ok(ApiResponse::ok(
        SearchResults {
            channel,
            videos,
            current_page: page.page,
            total_pages: page.total_pages(total),
            total_videos: total,
        },
        "Search results fetched successfully",
    ))
}

/// Counts a view and records the video in the requester's history before
/// returning it. Drafts are only visible to their owner.
pub async fn get_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<VideoDetail>, ApiError> {
    let video_id = parse_id(&video_id, "Invalid video Id")?;
    let viewer = user.id;

    let detail = state
        .with_db(move |db| {
            if !db.get_video(video_id)?.is_some_and(|v| v.visible_to(viewer)) {
                return Ok(None);
            }
            db.increment_views(video_id)?;
            db.record_watch(viewer, video_id)?;
            db.get_video_detail(video_id, viewer)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(ApiResponse::ok(detail, "Video fetched successfully"))
}

pub async fn update_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<ApiResponse<Video>, ApiError> {
    let video_id = parse_id(&video_id, "Invalid video Id")?;
    let mut form = MultipartForm::parse(multipart).await?;

    let title = form.field("title");
    let description = form.field("description");
    let thumbnail_file = form.take_file("thumbnail");
    if title.is_none() && description.is_none() && thumbnail_file.is_none() {
        return Err(ApiError::bad_request("At least one field is required to update"));
    }

    let existing = owned_video(&state, video_id, &user, "update").await?;

    let thumbnail = match &thumbnail_file {
        Some(file) => Some(state.media.save(file, MediaKind::Image).await?),
        None => None,
    };

    let new_thumbnail = thumbnail.clone();
    let updated = state
        .with_db(move |db| {
            db.update_video(
                video_id,
                &VideoUpdate {
                    title: title.as_deref(),
                    description: description.as_deref(),
                    thumbnail: new_thumbnail.as_deref(),
                },
            )
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    if thumbnail.is_some() {
        state.media.remove(&existing.thumbnail).await;
    }

    Ok(ApiResponse::ok(Video::from(updated), "Video updated successfully"))
}

pub async fn delete_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<Empty>, ApiError> {
    let video_id = parse_id(&video_id, "Invalid video Id")?;
    let video = owned_video(&state, video_id, &user, "delete").await?;

    let deleted = state.with_db(move |db| db.delete_video(video_id)).await?;
    if !deleted {
        return Err(ApiError::not_found("Video not found"));
    }

    state.media.remove(&video.video_file).await;
    state.media.remove(&video.thumbnail).await;

    info!("{} deleted video {}", user.username, video_id);
    Ok(ApiResponse::ok(Empty {}, "Video deleted successfully"))
}

pub async fn toggle_publish(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<Video>, ApiError> {
    let video_id = parse_id(&video_id, "Invalid video Id")?;
    owned_video(&state, video_id, &user, "modify").await?;

    let video = state
        .with_db(move |db| db.toggle_video_published(video_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let message = if video.is_published {
        "Video published successfully"
    } else {
        "Video unpublished successfully"
    };
    Ok(ApiResponse::ok(Video::from(video), message))
}

pub async fn channel_videos(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<ChannelVideosQuery>, ApiError>,
) -> Result<ApiResponse<Vec<VideoSummary>>, ApiError> {
    let owner = parse_id(&user_id, "Invalid user Id")?;
    let order = VideoOrder::for_channel(query.sort_by.as_deref())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let videos = state
        .with_db(move |db| {
            if db.get_user_by_id(owner)?.is_none() {
                return Ok(None);
            }
            db.list_channel_videos(owner, order).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::ok(videos, "Videos fetched successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_defaults_to_zero() {
        assert_eq!(parse_duration(None).unwrap(), 0.0);
        assert_eq!(parse_duration(Some(" ")).unwrap(), 0.0);
        assert_eq!(parse_duration(Some("12.5")).unwrap(), 12.5);
        assert!(parse_duration(Some("-1")).is_err());
        assert!(parse_duration(Some("NaN")).is_err());
        assert!(parse_duration(Some("ten")).is_err());
    }
}
