use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;
use vidtube_types::api::{ChannelMatch, VideoDetail, VideoSummary};
use vidtube_types::models::{PageRequest, VideoOrder};

use super::{SUMMARY_COLUMNS, count_at, like_pattern, order_clause, owner_at, summary_from_row, uuid_at};
use crate::Database;
use crate::models::{NewVideo, VideoRow, VideoUpdate};

const VIDEO_COLUMNS: &str = "id, owner_id, title, description, video_file, thumbnail, duration, \
     views, is_published, created_at, updated_at";

/// How many recent videos a channel search result carries.
const CHANNEL_MATCH_VIDEOS: u32 = 10;

impl Database {
    pub fn insert_video(&self, new: &NewVideo<'_>) -> Result<VideoRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO videos (id, owner_id, title, description, video_file, thumbnail, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    new.id.to_string(),
                    new.owner_id.to_string(),
                    new.title,
                    new.description,
                    new.video_file,
                    new.thumbnail,
                    new.duration,
                ],
            )?;
            query_video(conn, new.id)?.ok_or_else(|| anyhow!("Video vanished after insert: {}", new.id))
        })
    }

    pub fn get_video(&self, id: Uuid) -> Result<Option<VideoRow>> {
        self.with_conn(|conn| query_video(conn, id))
    }

    /// Returns false when the video does not exist.
    pub fn increment_views(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE videos SET views = views + 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Watch-page view of a video: owner, like and subscriber counts, and
    /// whether `viewer` liked the video or follows its channel.
    pub fn get_video_detail(&self, id: Uuid, viewer: Uuid) -> Result<Option<VideoDetail>> {
        self.with_conn(|conn| {
            let detail = conn
                .query_row(
                    "SELECT v.id, v.title, v.description, v.video_file, v.thumbnail, v.duration,
                            v.views, v.is_published, v.created_at, v.updated_at,
                            u.id, u.username, u.full_name, u.avatar,
                            (SELECT COUNT(*) FROM likes l WHERE l.video_id = v.id),
                            (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = v.owner_id),
                            EXISTS(SELECT 1 FROM likes l WHERE l.video_id = v.id AND l.liked_by = ?2),
                            EXISTS(SELECT 1 FROM subscriptions s
                                   WHERE s.channel_id = v.owner_id AND s.subscriber_id = ?2)
                     FROM videos v
                     JOIN users u ON u.id = v.owner_id
                     WHERE v.id = ?1",
                    params![id.to_string(), viewer.to_string()],
                    |row| {
                        Ok(VideoDetail {
                            id: uuid_at(row, 0)?,
                            title: row.get(1)?,
                            description: row.get(2)?,
                            video_file: row.get(3)?,
                            thumbnail: row.get(4)?,
                            duration: row.get(5)?,
                            views: count_at(row, 6)?,
                            is_published: row.get(7)?,
                            created_at: row.get(8)?,
                            updated_at: row.get(9)?,
                            owner: owner_at(row, 10)?,
                            likes: count_at(row, 14)?,
                            subscribers: count_at(row, 15)?,
                            is_liked: row.get(16)?,
                            is_subscribed: row.get(17)?,
                        })
                    },
                )
                .optional()?;
            Ok(detail)
        })
    }

    /// One page of published videos plus the total number of published videos.
    pub fn list_published_videos(
        &self,
        order: VideoOrder,
        page: PageRequest,
    ) -> Result<(Vec<VideoSummary>, u64)> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM videos v
                 JOIN users u ON u.id = v.owner_id
                 WHERE v.is_published = 1
                 ORDER BY {}
                 LIMIT ?1 OFFSET ?2",
                order_clause(order)
            );
            let mut stmt = conn.prepare(&sql)?;
            let videos = stmt
                .query_map(params![page.limit, page.offset() as i64], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM videos WHERE is_published = 1",
                [],
                |row| row.get(0),
            )?;

            Ok((videos, total.max(0) as u64))
        })
    }

    pub fn list_channel_videos(&self, owner: Uuid, order: VideoOrder) -> Result<Vec<VideoSummary>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM videos v
                 JOIN users u ON u.id = v.owner_id
                 WHERE v.owner_id = ?1 AND v.is_published = 1
                 ORDER BY {}",
                order_clause(order)
            );
            let mut stmt = conn.prepare(&sql)?;
            let videos = stmt
                .query_map([owner.to_string()], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(videos)
        })
    }

    pub fn update_video(&self, id: Uuid, update: &VideoUpdate<'_>) -> Result<Option<VideoRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE videos
                 SET title = COALESCE(?2, title),
                     description = COALESCE(?3, description),
                     thumbnail = COALESCE(?4, thumbnail),
                     updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1",
                params![id.to_string(), update.title, update.description, update.thumbnail],
            )?;
            query_video(conn, id)
        })
    }

    pub fn toggle_video_published(&self, id: Uuid) -> Result<Option<VideoRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE videos
                 SET is_published = NOT is_published,
                     updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1",
                [id.to_string()],
            )?;
            query_video(conn, id)
        })
    }

    /// Deletes the video; likes, comments, playlist entries and history
    /// entries go with it through the foreign keys.
    pub fn delete_video(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM videos WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Published videos whose title or description contains `needle`
    /// (case-insensitive), newest first, plus the total match count.
    pub fn search_videos(&self, needle: &str, page: PageRequest) -> Result<(Vec<VideoSummary>, u64)> {
        let pattern = like_pattern(needle);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM videos v
                 JOIN users u ON u.id = v.owner_id
                 WHERE v.is_published = 1
                   AND (v.title LIKE ?1 ESCAPE '\\' OR v.description LIKE ?1 ESCAPE '\\')
                 ORDER BY v.created_at DESC, v.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let videos = stmt
                .query_map(params![pattern, page.limit, page.offset() as i64], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM videos v
                 WHERE v.is_published = 1
                   AND (v.title LIKE ?1 ESCAPE '\\' OR v.description LIKE ?1 ESCAPE '\\')",
                [&pattern],
                |row| row.get(0),
            )?;

            Ok((videos, total.max(0) as u64))
        })
    }

    /// The best channel whose username or full name contains `needle`.
    /// Only channels with at least one published video qualify; ties go to
    /// the channel with more subscribers.
    pub fn search_channel(&self, needle: &str, viewer: Uuid) -> Result<Option<ChannelMatch>> {
        let pattern = like_pattern(needle);
        self.with_conn(|conn| {
            let channel = conn
                .query_row(
                    "SELECT id, username, full_name, avatar, video_count, subscriber_count, is_subscribed
                     FROM (
                        SELECT u.id, u.username, u.full_name, u.avatar,
                               (SELECT COUNT(*) FROM videos v
                                WHERE v.owner_id = u.id AND v.is_published = 1) AS video_count,
                               (SELECT COUNT(*) FROM subscriptions s
                                WHERE s.channel_id = u.id) AS subscriber_count,
                               EXISTS(SELECT 1 FROM subscriptions s
                                      WHERE s.channel_id = u.id AND s.subscriber_id = ?2) AS is_subscribed
                        FROM users u
                        WHERE u.username LIKE ?1 ESCAPE '\\' OR u.full_name LIKE ?1 ESCAPE '\\'
                     )
                     WHERE video_count > 0
                     ORDER BY subscriber_count DESC, username ASC
                     LIMIT 1",
                    params![pattern, viewer.to_string()],
                    channel_match_from_row,
                )
                .optional()?;

            let Some(mut channel) = channel else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM videos v
                 JOIN users u ON u.id = v.owner_id
                 WHERE v.owner_id = ?1 AND v.is_published = 1
                 ORDER BY v.created_at DESC, v.rowid DESC
                 LIMIT ?2"
            ))?;
            channel.latest_videos = stmt
                .query_map(params![channel.id.to_string(), CHANNEL_MATCH_VIDEOS], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(Some(channel))
        })
    }
}

fn query_video(conn: &Connection, id: Uuid) -> Result<Option<VideoRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"))?;
    let row = stmt.query_row([id.to_string()], video_from_row).optional()?;
    Ok(row)
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRow> {
    Ok(VideoRow {
        id: uuid_at(row, 0)?,
        owner_id: uuid_at(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        video_file: row.get(4)?,
        thumbnail: row.get(5)?,
        duration: row.get(6)?,
        views: count_at(row, 7)?,
        is_published: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn channel_match_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelMatch> {
    Ok(ChannelMatch {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        avatar: row.get(3)?,
        video_count: count_at(row, 4)?,
        subscriber_count: count_at(row, 5)?,
        is_subscribed_by_current_user: row.get(6)?,
        latest_videos: Vec::new(),
    })
}
