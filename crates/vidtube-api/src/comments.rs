use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use vidtube_db::models::CommentRow;
use vidtube_types::api::{Comment, CommentPage, CommentRequest, PageQuery};
use vidtube_types::models::PageRequest;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::response::{ApiResponse, Empty};
use crate::state::AppState;
use crate::validate::{ensure_owner, non_blank, parse_id};

const COMMENT_PAGE_LIMIT: u32 = 10;

fn content_of(req: &CommentRequest) -> Result<String, ApiError> {
    non_blank(req.content.as_deref())
        .map(str::to_owned)
        .ok_or_else(|| ApiError::bad_request("Comment content is required"))
}

async fn owned_comment(
    state: &AppState,
    comment_id: Uuid,
    user: &AuthUser,
) -> Result<CommentRow, ApiError> {
    let comment = state
        .with_db(move |db| db.get_comment(comment_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    ensure_owner(comment.owner_id, user, "You are not authorized to modify this comment")?;
    Ok(comment)
}

pub async fn video_comments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<ApiResponse<CommentPage>, ApiError> {
    let video_id = parse_id(&video_id, "Invalid video Id")?;
    let page = PageRequest::new(query.page, query.limit, COMMENT_PAGE_LIMIT);
    let viewer = user.id;

    let (comments, total) = state
        .with_db(move |db| {
            if !db.get_video(video_id)?.is_some_and(|v| v.visible_to(viewer)) {
                return Ok(None);
            }
            db.video_comments(video_id, page).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(ApiResponse::ok(
        CommentPage {
            comments,
            current_page: page.page,
            total_pages: page.total_pages(total),
            total_comments: total,
        },
        "Comments fetched successfully",
    ))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<CommentRequest>, ApiError>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let video_id = parse_id(&video_id, "Invalid video Id")?;
    let content = content_of(&req)?;

    let id = Uuid::new_v4();
    let owner = user.id;
    let comment = state
        .with_db(move |db| {
            if !db.get_video(video_id)?.is_some_and(|v| v.visible_to(owner)) {
                return Ok(None);
            }
            db.insert_comment(id, video_id, owner, &content).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(comment_id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<CommentRequest>, ApiError>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let comment_id = parse_id(&comment_id, "Invalid comment Id")?;
    let content = content_of(&req)?;
    owned_comment(&state, comment_id, &user).await?;

    let comment = state
        .with_db(move |db| db.update_comment(comment_id, &content))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;

    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(comment_id): Path<String>,
) -> Result<ApiResponse<Empty>, ApiError> {
    let comment_id = parse_id(&comment_id, "Invalid comment Id")?;
    owned_comment(&state, comment_id, &user).await?;

    let deleted = state
        .with_db(move |db| db.delete_comment(comment_id))
        .await?;
    if !deleted {
        return Err(ApiError::not_found("Comment not found"));
    }

    Ok(ApiResponse::ok(Empty {}, "Comment deleted successfully"))
}
