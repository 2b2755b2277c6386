use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;
use vidtube_types::api::Comment;
use vidtube_types::models::PageRequest;

use super::{owner_at, uuid_at};
use crate::Database;
use crate::models::CommentRow;

const COMMENT_COLUMNS: &str = "c.id, c.video_id, c.content, c.created_at, c.updated_at, \
     u.id, u.username, u.full_name, u.avatar";

impl Database {
    pub fn insert_comment(&self, id: Uuid, video: Uuid, owner: Uuid, content: &str) -> Result<Comment> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (id, video_id, owner_id, content) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), video.to_string(), owner.to_string(), content],
            )?;
            query_comment(conn, id)?.ok_or_else(|| anyhow!("Comment vanished after insert: {}", id))
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, video_id, owner_id, content FROM comments WHERE id = ?1",
                    [id.to_string()],
                    |row| {
                        Ok(CommentRow {
                            id: uuid_at(row, 0)?,
                            video_id: uuid_at(row, 1)?,
                            owner_id: uuid_at(row, 2)?,
                            content: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// One page of a video's comments, newest first, plus the total count.
    pub fn video_comments(&self, video: Uuid, page: PageRequest) -> Result<(Vec<Comment>, u64)> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMENT_COLUMNS}
                 FROM comments c
                 JOIN users u ON u.id = c.owner_id
                 WHERE c.video_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let comments = stmt
                .query_map(
                    params![video.to_string(), page.limit, page.offset() as i64],
                    comment_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE video_id = ?1",
                [video.to_string()],
                |row| row.get(0),
            )?;

            Ok((comments, total.max(0) as u64))
        })
    }

    pub fn update_comment(&self, id: Uuid, content: &str) -> Result<Option<Comment>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE comments
                 SET content = ?2, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1",
                params![id.to_string(), content],
            )?;
            query_comment(conn, id)
        })
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM comments WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }
}

fn query_comment(conn: &Connection, id: Uuid) -> Result<Option<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS}
         FROM comments c
         JOIN users u ON u.id = c.owner_id
         WHERE c.id = ?1"
    ))?;
    let comment = stmt.query_row([id.to_string()], comment_from_row).optional()?;
    Ok(comment)
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: uuid_at(row, 0)?,
        video: uuid_at(row, 1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        owner: owner_at(row, 5)?,
    })
}
