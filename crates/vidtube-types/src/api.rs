use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both access and refresh tokens. `jti` keeps two tokens
/// minted in the same second distinguishable, which refresh rotation relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub kind: TokenKind,
    pub jti: Uuid,
    pub exp: usize,
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact owner view embedded in video, comment and subscription lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Body of resend-verification and forgot-password.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmailRequest {
    pub email: Option<String>,
}

/// The token travels in the path; a copy in the body is tolerated.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscribers_count: u64,
    pub channels_subscribed_to_count: u64,
    pub is_subscribed: bool,
    pub created_at: DateTime<Utc>,
}

// -- Videos --

/// The stored video document, returned by write endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: u64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List view of a video, used by every listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: Uuid,
    pub title: String,
    pub thumbnail: String,
    pub video_file: String,
    pub duration: f64,
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub owner: OwnerSummary,
}

/// Single-video view shown on the watch page.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: u64,
    pub is_published: bool,
    pub owner: OwnerSummary,
    pub likes: u64,
    pub subscribers: u64,
    pub is_liked: bool,
    pub is_subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListQuery {
    pub sort_by: Option<String>,
    pub sort_type: Option<i32>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVideosQuery {
    pub sort_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPage {
    pub videos: Vec<VideoSummary>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_videos: u64,
}

/// Best channel match for a search query.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMatch {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub video_count: u64,
    pub latest_videos: Vec<VideoSummary>,
    pub subscriber_count: u64,
    pub is_subscribed_by_current_user: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub channel: Option<ChannelMatch>,
    pub videos: Vec<VideoSummary>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_videos: u64,
}

// -- Playlists --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// The stored playlist document; `videos` keeps insertion order.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub description: String,
    pub videos: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetail {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub description: String,
    pub videos: Vec<VideoSummary>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistMembership {
    pub id: Uuid,
    pub name: String,
    pub contains_video: bool,
}

// -- Subscriptions --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberList {
    pub subscribers: Vec<OwnerSummary>,
    pub total_subscribers: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedChannels {
    pub subscribed_channels: Vec<OwnerSummary>,
    pub total_subscribed_channels: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionToggle {
    pub subscribed: bool,
}

// -- Likes --

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeToggle {
    pub liked: bool,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub video: Uuid,
    pub content: String,
    pub owner: OwnerSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub current_page: u32,
    pub total_pages: u64,
    pub total_comments: u64,
}

// -- Dashboard --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_videos: u64,
    pub total_views: u64,
    pub total_subscribers: u64,
    pub total_likes: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardVideo {
    pub id: Uuid,
    pub title: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: u64,
    pub is_published: bool,
    pub likes: u64,
    pub comments: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
