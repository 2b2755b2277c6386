use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Timestamps are stored as "YYYY-MM-DD HH:MM:SS.SSS" UTC so that
        // rusqlite's chrono support reads them back directly.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                username            TEXT NOT NULL UNIQUE,
                email               TEXT NOT NULL UNIQUE,
                full_name           TEXT NOT NULL,
                password            TEXT NOT NULL,
                avatar              TEXT NOT NULL,
                cover_image         TEXT,
                refresh_token_hash  TEXT,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE videos (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                video_file      TEXT NOT NULL,
                thumbnail       TEXT NOT NULL,
                duration        REAL NOT NULL DEFAULT 0,
                views           INTEGER NOT NULL DEFAULT 0,
                is_published    INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_videos_owner ON videos(owner_id, created_at);
            CREATE INDEX idx_videos_published ON videos(is_published, created_at);

            CREATE TABLE playlists (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                description     TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_playlists_owner ON playlists(owner_id);

            -- The primary key is what keeps a playlist free of duplicates.
            CREATE TABLE playlist_videos (
                playlist_id     TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
                video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                position        INTEGER NOT NULL,
                added_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                PRIMARY KEY (playlist_id, video_id)
            );

            CREATE TABLE subscriptions (
                id              TEXT PRIMARY KEY,
                subscriber_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                channel_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                UNIQUE(subscriber_id, channel_id)
            );

            CREATE INDEX idx_subscriptions_channel ON subscriptions(channel_id);

            CREATE TABLE likes (
                id              TEXT PRIMARY KEY,
                video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                liked_by        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                UNIQUE(video_id, liked_by)
            );

            CREATE INDEX idx_likes_user ON likes(liked_by);

            CREATE TABLE comments (
                id              TEXT PRIMARY KEY,
                video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_comments_video ON comments(video_id, created_at);

            -- seq is a per-user counter; the highest seq is the most recent watch.
            CREATE TABLE watch_history (
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                seq             INTEGER NOT NULL,
                watched_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                PRIMARY KEY (user_id, video_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (email verification, password reset)");
        // Only digests of mailed tokens are stored; a row is deleted when used.
        conn.execute_batch(
            "
            ALTER TABLE users ADD COLUMN email_verified INTEGER NOT NULL DEFAULT 0;

            CREATE TABLE account_tokens (
                token_hash      TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                purpose         TEXT NOT NULL,
                expires_at      TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_account_tokens_user ON account_tokens(user_id, purpose);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
