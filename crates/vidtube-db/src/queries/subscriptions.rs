use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;
use vidtube_types::api::{OwnerSummary, VideoSummary};

use super::{SUMMARY_COLUMNS, owner_at, summary_from_row};
use crate::Database;

impl Database {
    /// Subscribe if not subscribed, unsubscribe otherwise.
    /// Returns true when the subscription exists afterwards.
    pub fn toggle_subscription(&self, subscriber: Uuid, channel: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
                params![subscriber.to_string(), channel.to_string()],
            )?;
            if removed > 0 {
                return Ok(false);
            }

            conn.execute(
                "INSERT OR IGNORE INTO subscriptions (id, subscriber_id, channel_id) VALUES (?1, ?2, ?3)",
                params![
                    Uuid::new_v4().to_string(),
                    subscriber.to_string(),
                    channel.to_string()
                ],
            )?;
            Ok(true)
        })
    }

    pub fn is_subscribed(&self, subscriber: Uuid, channel: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2)",
                params![subscriber.to_string(), channel.to_string()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Users subscribed to `channel`, oldest subscription first.
    pub fn channel_subscribers(&self, channel: Uuid) -> Result<Vec<OwnerSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.full_name, u.avatar
                 FROM subscriptions s
                 JOIN users u ON u.id = s.subscriber_id
                 WHERE s.channel_id = ?1
                 ORDER BY s.created_at ASC, s.rowid ASC",
            )?;
            let rows = stmt
                .query_map([channel.to_string()], |row| owner_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Channels `subscriber` follows, oldest subscription first.
    pub fn subscribed_channels(&self, subscriber: Uuid) -> Result<Vec<OwnerSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.full_name, u.avatar
                 FROM subscriptions s
                 JOIN users u ON u.id = s.channel_id
                 WHERE s.subscriber_id = ?1
                 ORDER BY s.created_at ASC, s.rowid ASC",
            )?;
            let rows = stmt
                .query_map([subscriber.to_string()], |row| owner_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The newest published video of every channel `subscriber` follows,
    /// newest first. Channels without published videos contribute nothing.
    pub fn latest_from_subscriptions(&self, subscriber: Uuid) -> Result<Vec<VideoSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS}
                 FROM subscriptions s
                 JOIN videos v ON v.id = (
                     SELECT latest.id FROM videos latest
                     WHERE latest.owner_id = s.channel_id AND latest.is_published = 1
                     ORDER BY latest.created_at DESC, latest.rowid DESC
                     LIMIT 1
                 )
                 JOIN users u ON u.id = v.owner_id
                 WHERE s.subscriber_id = ?1
                 ORDER BY v.created_at DESC, v.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([subscriber.to_string()], summary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::fixtures;

    #[test]
    fn double_toggle_restores_state() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");

        assert!(!db.is_subscribed(bob, alice).unwrap());
        assert!(db.toggle_subscription(bob, alice).unwrap());
        assert!(db.is_subscribed(bob, alice).unwrap());
        assert!(!db.toggle_subscription(bob, alice).unwrap());
        assert!(!db.is_subscribed(bob, alice).unwrap());
    }

    #[test]
    fn toggle_only_touches_its_own_pair() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let carol = fixtures::user(&db, "carol");

        db.toggle_subscription(bob, alice).unwrap();
        db.toggle_subscription(bob, carol).unwrap();
        db.toggle_subscription(bob, alice).unwrap();

        let channels = db.subscribed_channels(bob).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, carol);
    }

    #[test]
    fn subscriber_list_names_subscribers() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let carol = fixtures::user(&db, "carol");

        db.toggle_subscription(bob, alice).unwrap();
        db.toggle_subscription(carol, alice).unwrap();

        let names: Vec<_> = db
            .channel_subscribers(alice)
            .unwrap()
            .into_iter()
            .map(|s| s.username)
            .collect();
        assert_eq!(names, ["bob", "carol"]);
    }

    #[test]
    fn latest_video_per_channel() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let carol = fixtures::user(&db, "carol");
        let viewer = fixtures::user(&db, "viewer");

        fixtures::video(&db, alice, "alice old");
        let alice_new = fixtures::video(&db, alice, "alice new");
        let bob_only = fixtures::video(&db, bob, "bob only");
        let draft = fixtures::video(&db, bob, "bob draft");
        db.toggle_video_published(draft).unwrap();

        db.toggle_subscription(viewer, alice).unwrap();
        db.toggle_subscription(viewer, bob).unwrap();
        db.toggle_subscription(viewer, carol).unwrap();

        let latest = db.latest_from_subscriptions(viewer).unwrap();
        let ids: Vec<_> = latest.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![bob_only, alice_new]);
    }
}
