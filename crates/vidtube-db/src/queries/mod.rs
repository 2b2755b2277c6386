//! Queries, grouped by collection. Every method is an `impl Database` block
//! so callers only ever see `db.some_query(..)`.

mod account_tokens;
mod comments;
mod dashboard;
mod history;
mod likes;
mod playlists;
mod subscriptions;
mod users;
mod videos;

use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;
use vidtube_types::api::{OwnerSummary, VideoSummary};
use vidtube_types::models::{SortField, VideoOrder};

/// Columns for a `VideoSummary`, expecting `videos v JOIN users u ON u.id = v.owner_id`.
pub(crate) const SUMMARY_COLUMNS: &str = "v.id, v.title, v.thumbnail, v.video_file, v.duration, v.views, v.created_at, \
     u.id, u.username, u.full_name, u.avatar";

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

/// Owner summary from four consecutive columns: id, username, full_name, avatar.
pub(crate) fn owner_at(row: &Row<'_>, start: usize) -> rusqlite::Result<OwnerSummary> {
    Ok(OwnerSummary {
        id: uuid_at(row, start)?,
        username: row.get(start + 1)?,
        full_name: row.get(start + 2)?,
        avatar: row.get(start + 3)?,
    })
}

pub(crate) fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<VideoSummary> {
    Ok(VideoSummary {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        thumbnail: row.get(2)?,
        video_file: row.get(3)?,
        duration: row.get(4)?,
        views: count_at(row, 5)?,
        created_at: row.get(6)?,
        owner: owner_at(row, 7)?,
    })
}

/// ORDER BY body for a video listing over alias `v`. rowid breaks ties so
/// rows created within the same millisecond still come back in insert order.
pub(crate) fn order_clause(order: VideoOrder) -> String {
    let dir = if order.descending { "DESC" } else { "ASC" };
    match order.field {
        SortField::CreatedAt => format!("v.created_at {dir}, v.rowid {dir}"),
        SortField::Views => format!("v.views {dir}, v.created_at DESC, v.rowid DESC"),
        SortField::Duration => format!("v.duration {dir}, v.created_at DESC, v.rowid DESC"),
        SortField::Title => format!("v.title COLLATE NOCASE {dir}, v.rowid DESC"),
    }
}

/// `%needle%` with LIKE wildcards in the needle escaped; pair with `ESCAPE '\'`.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
pub(crate) mod fixtures {
    use uuid::Uuid;

    use crate::Database;
    use crate::models::{NewUser, NewVideo};

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        let email = format!("{}@example.com", username);
        db.create_user(&NewUser {
            id,
            username,
            email: &email,
            full_name: &format!("{} Full", username),
            password_hash: "hash",
            avatar: "/media/avatar.png",
            cover_image: None,
        })
        .unwrap();
        id
    }

    pub fn video(db: &Database, owner: Uuid, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.insert_video(&NewVideo {
            id,
            owner_id: owner,
            title,
            description: &format!("{} description", title),
            video_file: "/media/video.mp4",
            thumbnail: "/media/thumb.png",
            duration: 12.5,
        })
        .unwrap();
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cat"), "%cat%");
        assert_eq!(like_pattern("100%_x"), "%100\\%\\_x%");
    }

    #[test]
    fn order_clause_uses_direction() {
        assert_eq!(
            order_clause(VideoOrder::OLDEST),
            "v.created_at ASC, v.rowid ASC"
        );
        assert!(order_clause(VideoOrder::POPULAR).starts_with("v.views DESC"));
    }
}
