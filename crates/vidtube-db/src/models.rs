//! Database row types. Rows carry everything the API layer needs for
//! authorization checks; the `vidtube-types` models are what leaves the server.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vidtube_types::api::{OwnerSummary, UserProfile, Video};

pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub refresh_token_hash: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            cover_image: self.cover_image.clone(),
            is_email_verified: self.email_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn owner_summary(&self) -> OwnerSummary {
        OwnerSummary {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

pub struct NewUser<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub avatar: &'a str,
    pub cover_image: Option<&'a str>,
}

/// Which of the two user image columns an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserImage {
    Avatar,
    CoverImage,
}

impl UserImage {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::CoverImage => "cover_image",
        }
    }
}

/// What a one-time account token (sent by mail) authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

impl TokenPurpose {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::ResetPassword => "reset_password",
        }
    }
}

pub struct VideoRow {
    pub id: Uuid,
    pub owner_id: Uuid,
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

impl VideoRow {
    /// Drafts are visible only to their owner.
    pub fn visible_to(&self, viewer: Uuid) -> bool {
        self.is_published || self.owner_id == viewer
    }
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            id: row.id,
            owner: row.owner_id,
            title: row.title,
            description: row.description,
            video_file: row.video_file,
            thumbnail: row.thumbnail,
            duration: row.duration,
            views: row.views,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct NewVideo<'a> {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: &'a str,
    pub description: &'a str,
    pub video_file: &'a str,
    pub thumbnail: &'a str,
    pub duration: f64,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Default)]
pub struct VideoUpdate<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub thumbnail: Option<&'a str>,
}

impl VideoUpdate<'_> {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.thumbnail.is_none()
    }
}

pub struct PlaylistRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct CommentRow {
    pub id: Uuid,
    pub video_id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
}

/// Outcome of adding a video to a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistAdd {
    Added,
    AlreadyPresent,
}
