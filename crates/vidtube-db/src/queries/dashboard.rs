use anyhow::Result;
use uuid::Uuid;
use vidtube_types::api::{ChannelStats, DashboardVideo};

use super::{count_at, uuid_at};
use crate::Database;

impl Database {
    /// Totals across everything `owner` has uploaded, published or not.
    pub fn channel_stats(&self, owner: Uuid) -> Result<ChannelStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT (SELECT COUNT(*) FROM videos WHERE owner_id = ?1),
                        (SELECT COALESCE(SUM(views), 0) FROM videos WHERE owner_id = ?1),
                        (SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1),
                        (SELECT COUNT(*) FROM likes l
                         JOIN videos v ON v.id = l.video_id
                         WHERE v.owner_id = ?1)",
                [owner.to_string()],
                |row| {
                    Ok(ChannelStats {
                        total_videos: count_at(row, 0)?,
                        total_views: count_at(row, 1)?,
                        total_subscribers: count_at(row, 2)?,
                        total_likes: count_at(row, 3)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    /// Every video of `owner`: drafts first, then newest first.
    pub fn channel_dashboard_videos(&self, owner: Uuid) -> Result<Vec<DashboardVideo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT v.id, v.title, v.thumbnail, v.duration, v.views, v.is_published,
                        (SELECT COUNT(*) FROM likes l WHERE l.video_id = v.id),
                        (SELECT COUNT(*) FROM comments c WHERE c.video_id = v.id),
                        v.created_at, v.updated_at
                 FROM videos v
                 WHERE v.owner_id = ?1
                 ORDER BY v.is_published ASC, v.created_at DESC, v.rowid DESC",
            )?;
            let rows = stmt
                .query_map([owner.to_string()], |row| {
                    Ok(DashboardVideo {
                        id: uuid_at(row, 0)?,
                        title: row.get(1)?,
                        thumbnail: row.get(2)?,
                        duration: row.get(3)?,
                        views: count_at(row, 4)?,
                        is_published: row.get(5)?,
                        likes: count_at(row, 6)?,
                        comments: count_at(row, 7)?,
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::queries::fixtures;

    #[test]
    fn stats_cover_all_uploads() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let published = fixtures::video(&db, alice, "published");
        let draft = fixtures::video(&db, alice, "draft");
        db.toggle_video_published(draft).unwrap();

        db.increment_views(published).unwrap();
        db.increment_views(published).unwrap();
        db.toggle_video_like(published, bob).unwrap();
        db.toggle_subscription(bob, alice).unwrap();

        let stats = db.channel_stats(alice).unwrap();
        assert_eq!(stats.total_videos, 2);
        assert_eq!(stats.total_views, 2);
        assert_eq!(stats.total_subscribers, 1);
        assert_eq!(stats.total_likes, 1);
    }

    #[test]
    fn dashboard_lists_drafts_first() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let published = fixtures::video(&db, alice, "published");
        let draft = fixtures::video(&db, alice, "draft");
        let newest = fixtures::video(&db, alice, "newest");
        db.toggle_video_published(draft).unwrap();
        db.insert_comment(Uuid::new_v4(), published, alice, "nice").unwrap();

        let videos = db.channel_dashboard_videos(alice).unwrap();
        let ids: Vec<_> = videos.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![draft, newest, published]);
        assert_eq!(videos[2].comments, 1);
    }
}
