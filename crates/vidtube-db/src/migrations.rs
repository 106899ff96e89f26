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
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                fullname        TEXT NOT NULL,
                password        TEXT NOT NULL,
                avatar          TEXT,
                cover_image     TEXT,
                refresh_token   TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE videos (
                id              TEXT PRIMARY KEY,
                video_file      TEXT NOT NULL,
                thumbnail       TEXT NOT NULL,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                duration        REAL NOT NULL DEFAULT 0,
                views           INTEGER NOT NULL DEFAULT 0,
                is_published    INTEGER NOT NULL DEFAULT 1,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_videos_owner ON videos(owner_id);

            CREATE TABLE subscriptions (
                id              TEXT PRIMARY KEY,
                subscriber_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                channel_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(subscriber_id, channel_id)
            );

            CREATE INDEX idx_subscriptions_channel ON subscriptions(channel_id);

            CREATE TABLE watch_history (
                position        INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                watched_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_watch_history_user ON watch_history(user_id, position);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
