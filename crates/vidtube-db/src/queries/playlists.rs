use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;
use vidtube_types::api::{Playlist, PlaylistDetail, PlaylistMembership, VideoSummary};

use super::{SUMMARY_COLUMNS, summary_from_row, uuid_at};
use crate::Database;
use crate::models::{PlaylistAdd, PlaylistRow};

const PLAYLIST_COLUMNS: &str = "id, owner_id, name, description, created_at, updated_at";

impl Database {
    pub fn create_playlist(
        &self,
        id: Uuid,
        owner: Uuid,
        name: &str,
        description: &str,
    ) -> Result<Playlist> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO playlists (id, owner_id, name, description) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), owner.to_string(), name, description],
            )?;
            query_playlist_document(conn, id)?
                .ok_or_else(|| anyhow!("Playlist vanished after insert: {}", id))
        })
    }

    pub fn get_playlist(&self, id: Uuid) -> Result<Option<PlaylistRow>> {
        self.with_conn(|conn| query_playlist(conn, id))
    }

    /// Appends a video. The `(playlist_id, video_id)` primary key decides
    /// duplicates, so two racing adds of the same video produce one entry.
    pub fn add_video_to_playlist(&self, playlist: Uuid, video: Uuid) -> Result<(PlaylistAdd, Playlist)> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id, position)
                 SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1
                 FROM playlist_videos WHERE playlist_id = ?1",
                params![playlist.to_string(), video.to_string()],
            )?;

            let outcome = if inserted > 0 {
                touch_playlist(conn, playlist)?;
                PlaylistAdd::Added
            } else {
                PlaylistAdd::AlreadyPresent
            };

            let document = query_playlist_document(conn, playlist)?
                .ok_or_else(|| anyhow!("Playlist not found: {}", playlist))?;
            Ok((outcome, document))
        })
    }

    /// Returns `None` when the video was not part of the playlist.
    pub fn remove_video_from_playlist(&self, playlist: Uuid, video: Uuid) -> Result<Option<Playlist>> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM playlist_videos WHERE playlist_id = ?1 AND video_id = ?2",
                params![playlist.to_string(), video.to_string()],
            )?;
            if removed == 0 {
                return Ok(None);
            }
            touch_playlist(conn, playlist)?;
            query_playlist_document(conn, playlist)
        })
    }

    pub fn update_playlist(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Playlist>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE playlists
                 SET name = COALESCE(?2, name),
                     description = COALESCE(?3, description),
                     updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1",
                params![id.to_string(), name, description],
            )?;
            query_playlist_document(conn, id)
        })
    }

    pub fn delete_playlist(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM playlists WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Playlist with its published videos in insertion order.
    pub fn get_playlist_detail(&self, id: Uuid) -> Result<Option<PlaylistDetail>> {
        self.with_conn(|conn| {
            let Some(row) = query_playlist(conn, id)? else {
                return Ok(None);
            };
            let videos = query_playlist_videos(conn, id)?;
            Ok(Some(detail(row, videos)))
        })
    }

    /// All playlists of `owner`, newest first. Empty playlists are included.
    pub fn user_playlists(&self, owner: Uuid) -> Result<Vec<PlaylistDetail>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PLAYLIST_COLUMNS} FROM playlists
                 WHERE owner_id = ?1
                 ORDER BY updated_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([owner.to_string()], playlist_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|row| {
                    let videos = query_playlist_videos(conn, row.id)?;
                    Ok(detail(row, videos))
                })
                .collect()
        })
    }

    /// Every playlist of `owner` with a flag telling whether `video` is in it.
    pub fn playlist_membership(&self, owner: Uuid, video: Uuid) -> Result<Vec<PlaylistMembership>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.name,
                        EXISTS(SELECT 1 FROM playlist_videos pv
                               WHERE pv.playlist_id = p.id AND pv.video_id = ?2)
                 FROM playlists p
                 WHERE p.owner_id = ?1
                 ORDER BY p.created_at ASC, p.rowid ASC",
            )?;
            let rows = stmt
                .query_map(params![owner.to_string(), video.to_string()], |row| {
                    Ok(PlaylistMembership {
                        id: uuid_at(row, 0)?,
                        name: row.get(1)?,
                        contains_video: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn touch_playlist(conn: &Connection, id: Uuid) -> Result<()> {
    conn.execute(
        "UPDATE playlists SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = ?1",
        [id.to_string()],
    )?;
    Ok(())
}

fn query_playlist(conn: &Connection, id: Uuid) -> Result<Option<PlaylistRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = ?1"))?;
    let row = stmt.query_row([id.to_string()], playlist_from_row).optional()?;
    Ok(row)
}

/// The raw document: metadata plus every video id, in insertion order.
fn query_playlist_document(conn: &Connection, id: Uuid) -> Result<Option<Playlist>> {
    let Some(row) = query_playlist(conn, id)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT video_id FROM playlist_videos WHERE playlist_id = ?1 ORDER BY position ASC",
    )?;
    let videos = stmt
        .query_map([id.to_string()], |row| uuid_at(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(Playlist {
        id: row.id,
        owner: row.owner_id,
        name: row.name,
        description: row.description,
        videos,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

fn query_playlist_videos(conn: &Connection, id: Uuid) -> Result<Vec<VideoSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUMMARY_COLUMNS}
         FROM playlist_videos pv
         JOIN videos v ON v.id = pv.video_id
         JOIN users u ON u.id = v.owner_id
         WHERE pv.playlist_id = ?1 AND v.is_published = 1
         ORDER BY pv.position ASC"
    ))?;
    let videos = stmt
        .query_map([id.to_string()], summary_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(videos)
}

fn playlist_from_row(row: &Row<'_>) -> rusqlite::Result<PlaylistRow> {
    Ok(PlaylistRow {
        id: uuid_at(row, 0)?,
        owner_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn detail(row: PlaylistRow, videos: Vec<VideoSummary>) -> PlaylistDetail {
    PlaylistDetail {
        id: row.id,
        owner: row.owner_id,
        name: row.name,
        description: row.description,
        videos,
        updated_at: row.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::models::PlaylistAdd;
    use crate::queries::fixtures;

    #[test]
    fn new_playlist_is_empty_and_owned() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");

        let playlist = db.create_playlist(Uuid::new_v4(), alice, "Mix", "Songs").unwrap();
        assert_eq!(playlist.owner, alice);
        assert!(playlist.videos.is_empty());
    }

    #[test]
    fn add_keeps_order_and_rejects_duplicates() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let first = fixtures::video(&db, alice, "first");
        let second = fixtures::video(&db, alice, "second");
        let playlist = db.create_playlist(Uuid::new_v4(), alice, "Mix", "Songs").unwrap().id;

        let (outcome, _) = db.add_video_to_playlist(playlist, second).unwrap();
        assert_eq!(outcome, PlaylistAdd::Added);
        let (outcome, doc) = db.add_video_to_playlist(playlist, first).unwrap();
        assert_eq!(outcome, PlaylistAdd::Added);
        assert_eq!(doc.videos, vec![second, first]);

        let (outcome, doc) = db.add_video_to_playlist(playlist, second).unwrap();
        assert_eq!(outcome, PlaylistAdd::AlreadyPresent);
        assert_eq!(doc.videos, vec![second, first]);
    }

    #[test]
    fn remove_reports_missing_video() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let video = fixtures::video(&db, alice, "clip");
        let playlist = db.create_playlist(Uuid::new_v4(), alice, "Mix", "Songs").unwrap().id;

        assert!(db.remove_video_from_playlist(playlist, video).unwrap().is_none());
        db.add_video_to_playlist(playlist, video).unwrap();
        let doc = db.remove_video_from_playlist(playlist, video).unwrap().unwrap();
        assert!(doc.videos.is_empty());
    }

    #[test]
    fn detail_hides_unpublished_and_deleted_videos() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let keep = fixtures::video(&db, alice, "keep");
        let hide = fixtures::video(&db, alice, "hide");
        let drop = fixtures::video(&db, alice, "drop");
        let playlist = db.create_playlist(Uuid::new_v4(), alice, "Mix", "Songs").unwrap().id;
        for video in [keep, hide, drop] {
            db.add_video_to_playlist(playlist, video).unwrap();
        }

        db.toggle_video_published(hide).unwrap();
        db.delete_video(drop).unwrap();

        let detail = db.get_playlist_detail(playlist).unwrap().unwrap();
        let ids: Vec<_> = detail.videos.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![keep]);
    }

    #[test]
    fn user_playlists_include_empty_ones() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        db.create_playlist(Uuid::new_v4(), alice, "Empty", "Nothing yet").unwrap();
        db.create_playlist(Uuid::new_v4(), bob, "Other", "Not alice's").unwrap();

        let playlists = db.user_playlists(alice).unwrap();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].name, "Empty");
        assert!(playlists[0].videos.is_empty());
    }

    #[test]
    fn membership_flags_each_playlist() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let video = fixtures::video(&db, alice, "clip");
        let with = db.create_playlist(Uuid::new_v4(), alice, "With", "d").unwrap().id;
        db.create_playlist(Uuid::new_v4(), alice, "Without", "d").unwrap();
        db.add_video_to_playlist(with, video).unwrap();

        let membership = db.playlist_membership(alice, video).unwrap();
        assert_eq!(membership.len(), 2);
        assert!(membership[0].contains_video);
        assert!(!membership[1].contains_video);
    }

    #[test]
    fn update_and_delete() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let id = db.create_playlist(Uuid::new_v4(), alice, "Mix", "Songs").unwrap().id;

        let updated = db.update_playlist(id, None, Some("Better songs")).unwrap().unwrap();
        assert_eq!(updated.name, "Mix");
        assert_eq!(updated.description, "Better songs");

        assert!(db.delete_playlist(id).unwrap());
        assert!(db.get_playlist(id).unwrap().is_none());
        assert!(db.update_playlist(id, Some("x"), None).unwrap().is_none());
    }
}
