use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;
use vidtube_types::api::VideoSummary;

use super::{SUMMARY_COLUMNS, summary_from_row};
use crate::Database;

impl Database {
    /// Like if not liked, unlike otherwise. Returns true when the like exists afterwards.
    pub fn toggle_video_like(&self, video: Uuid, user: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM likes WHERE video_id = ?1 AND liked_by = ?2",
                params![video.to_string(), user.to_string()],
            )?;
            if removed > 0 {
                return Ok(false);
            }

            conn.execute(
                "INSERT OR IGNORE INTO likes (id, video_id, liked_by) VALUES (?1, ?2, ?3)",
                params![Uuid::new_v4().to_string(), video.to_string(), user.to_string()],
            )?;
            Ok(true)
        })
    }

    /// Published videos `user` liked, most recent like first.
    pub fn liked_videos(&self, user: Uuid) -> Result<Vec<VideoSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM likes l
                 JOIN videos v ON v.id = l.video_id
                 JOIN users u ON u.id = v.owner_id
                 WHERE l.liked_by = ?1 AND v.is_published = 1
                 ORDER BY l.created_at DESC, l.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user.to_string()], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
