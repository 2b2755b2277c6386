use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;
use vidtube_types::api::ChannelProfile;

use super::{count_at, uuid_at};
use crate::Database;
use crate::models::{NewUser, UserImage, UserRow};

const USER_COLUMNS: &str = "id, username, email, full_name, password, avatar, cover_image, \
     refresh_token_hash, email_verified, created_at, updated_at";

impl Database {
    pub fn create_user(&self, new: &NewUser<'_>) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, full_name, password, avatar, cover_image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    new.id.to_string(),
                    new.username,
                    new.email,
                    new.full_name,
                    new.password_hash,
                    new.avatar,
                    new.cover_image,
                ],
            )?;
            query_user_by_id(conn, new.id)?.ok_or_else(|| anyhow!("User vanished after insert: {}", new.id))
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_where(conn, "username = ?1", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_where(conn, "email = ?1", email))
    }

    /// Stores the hash of the user's current refresh token; `None` logs them out.
    pub fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET refresh_token_hash = ?2 WHERE id = ?1",
                params![id.to_string(), hash],
            )?;
            Ok(())
        })
    }

    /// Swaps the refresh token digest from `current` to `next` in one
    /// statement. Returns false if `current` was already rotated out.
    pub fn rotate_refresh_token_hash(&self, id: Uuid, current: &str, next: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET refresh_token_hash = ?3
                 WHERE id = ?1 AND refresh_token_hash = ?2",
                params![id.to_string(), current, next],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users
                 SET password = ?2, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1",
                params![id.to_string(), password_hash],
            )?;
            Ok(())
        })
    }

    pub fn update_account(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users
                 SET full_name = COALESCE(?2, full_name),
                     email_verified = CASE WHEN ?3 IS NULL OR ?3 = email
                                           THEN email_verified ELSE 0 END,
                     email = COALESCE(?3, email),
                     updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1",
                params![id.to_string(), full_name, email],
            )?;
            query_user_by_id(conn, id)
        })
    }

    pub fn mark_email_verified(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users
                 SET email_verified = 1, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(())
        })
    }

    /// Points an image column at a new URL and returns the URL it replaced,
    /// so the caller can clean up the old file.
    pub fn replace_user_image(
        &self,
        id: Uuid,
        image: UserImage,
        url: &str,
    ) -> Result<Option<String>> {
        let column = image.column();
        self.with_conn_mut(|conn| {
            let previous: Option<String> = conn
                .query_row(
                    &format!("SELECT {column} FROM users WHERE id = ?1"),
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();

            conn.execute(
                &format!(
                    "UPDATE users
                     SET {column} = ?2, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                     WHERE id = ?1"
                ),
                params![id.to_string(), url],
            )?;
            Ok(previous)
        })
    }

    /// Public channel page for `username`, as seen by `viewer`.
    pub fn get_channel_profile(&self, username: &str, viewer: Uuid) -> Result<Option<ChannelProfile>> {
        self.with_conn(|conn| {
            let profile = conn
                .query_row(
                    "SELECT u.id, u.username, u.full_name, u.avatar, u.cover_image, u.created_at,
                            (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id),
                            (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id),
                            EXISTS(SELECT 1 FROM subscriptions s
                                   WHERE s.channel_id = u.id AND s.subscriber_id = ?2)
                     FROM users u
                     WHERE u.username = ?1",
                    params![username, viewer.to_string()],
                    |row| {
                        Ok(ChannelProfile {
                            id: uuid_at(row, 0)?,
                            username: row.get(1)?,
                            full_name: row.get(2)?,
                            avatar: row.get(3)?,
                            cover_image: row.get(4)?,
                            created_at: row.get(5)?,
                            subscribers_count: count_at(row, 6)?,
                            channels_subscribed_to_count: count_at(row, 7)?,
                            is_subscribed: row.get(8)?,
                        })
                    },
                )
                .optional()?;
            Ok(profile)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>> {
    query_user_where(conn, "id = ?1", &id.to_string())
}

fn query_user_where(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}"))?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        password: row.get(4)?,
        avatar: row.get(5)?,
        cover_image: row.get(6)?,
        refresh_token_hash: row.get(7)?,
        email_verified: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::models::UserImage;
    use crate::queries::fixtures;

    #[test]
    fn users_are_found_by_each_key() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "alice");

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, id);
        let by_email = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected_by_schema() {
        let db = fixtures::db();
        fixtures::user(&db, "alice");
        let again = db.create_user(&crate::models::NewUser {
            id: uuid::Uuid::new_v4(),
            username: "alice",
            email: "other@example.com",
            full_name: "Other",
            password_hash: "hash",
            avatar: "a",
            cover_image: None,
        });
        assert!(crate::is_unique_violation(&again.err().unwrap()));

        let bob = fixtures::user(&db, "bob");
        let taken = db.update_account(bob, None, Some("alice@example.com"));
        assert!(crate::is_unique_violation(&taken.err().unwrap()));
        assert!(!crate::is_unique_violation(&anyhow::anyhow!("disk full")));
    }

    #[test]
    fn refresh_token_rotation_is_single_use() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "alice");
        db.set_refresh_token_hash(id, Some("first")).unwrap();

        assert!(db.rotate_refresh_token_hash(id, "first", "second").unwrap());
        assert!(!db.rotate_refresh_token_hash(id, "first", "third").unwrap());

        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.refresh_token_hash.as_deref(), Some("second"));

        db.set_refresh_token_hash(id, None).unwrap();
        assert!(!db.rotate_refresh_token_hash(id, "second", "fourth").unwrap());
    }

    #[test]
    fn update_account_keeps_unset_fields() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "alice");

        let updated = db.update_account(id, Some("Alice A."), None).unwrap().unwrap();
        assert_eq!(updated.full_name, "Alice A.");
        assert_eq!(updated.email, "alice@example.com");
    }

    #[test]
    fn changing_email_clears_verification() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "alice");
        assert!(!db.get_user_by_id(id).unwrap().unwrap().email_verified);

        db.mark_email_verified(id).unwrap();
        let same = db.update_account(id, None, Some("alice@example.com")).unwrap().unwrap();
        assert!(same.email_verified);

        let moved = db.update_account(id, None, Some("alice@elsewhere.example")).unwrap().unwrap();
        assert!(!moved.email_verified);
    }

    #[test]
    fn replace_user_image_returns_previous_url() {
        let db = fixtures::db();
        let id = fixtures::user(&db, "alice");

        let old = db.replace_user_image(id, UserImage::Avatar, "/media/new.png").unwrap();
        assert_eq!(old.as_deref(), Some("/media/avatar.png"));

        let old = db.replace_user_image(id, UserImage::CoverImage, "/media/cover.png").unwrap();
        assert_eq!(old, None);

        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.avatar, "/media/new.png");
        assert_eq!(user.cover_image.as_deref(), Some("/media/cover.png"));
    }

    #[test]
    fn channel_profile_counts_subscriptions() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let carol = fixtures::user(&db, "carol");

        db.toggle_subscription(bob, alice).unwrap();
        db.toggle_subscription(carol, alice).unwrap();
        db.toggle_subscription(alice, carol).unwrap();

        let profile = db.get_channel_profile("alice", bob).unwrap().unwrap();
        assert_eq!(profile.subscribers_count, 2);
        assert_eq!(profile.channels_subscribed_to_count, 1);
        assert!(profile.is_subscribed);

        let profile = db.get_channel_profile("alice", alice).unwrap().unwrap();
        assert!(!profile.is_subscribed);
    }
}
