use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;
use vidtube_types::api::VideoSummary;

use super::{SUMMARY_COLUMNS, summary_from_row};
use crate::Database;

impl Database {
    /// Puts `video` at the front of the user's history. A video already in the
    /// history is moved, never duplicated.
    pub fn record_watch(&self, user: Uuid, video: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO watch_history (user_id, video_id, seq)
                 VALUES (?1, ?2, (SELECT COALESCE(MAX(seq), 0) + 1 FROM watch_history WHERE user_id = ?1))
                 ON CONFLICT(user_id, video_id)
                 DO UPDATE SET seq = excluded.seq, watched_at = excluded.watched_at",
                params![user.to_string(), video.to_string()],
            )?;
            Ok(())
        })
    }

    /// Watch history, most recent first. Unpublished videos are skipped.
    pub fn watch_history(&self, user: Uuid) -> Result<Vec<VideoSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM watch_history h
                 JOIN videos v ON v.id = h.video_id
                 JOIN users u ON u.id = v.owner_id
                 WHERE h.user_id = ?1 AND v.is_published = 1
                 ORDER BY h.seq DESC"
            ))?;
            let rows = stmt
                .query_map([user.to_string()], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
