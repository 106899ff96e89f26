use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use vidtube_types::models::{ChannelProfile, CreatedVideo, OwnerProfile, VideoOwner, WatchHistoryEntry};

use crate::Database;
use crate::models::{NewUser, NewVideo, UserDetailsUpdate, UserRow, VideoRow};

const USER_COLUMNS: &str = "id, username, email, fullname, password, avatar, cover_image, \
                            refresh_token, created_at, updated_at";

const VIDEO_COLUMNS: &str = "id, video_file, thumbnail, title, description, duration, views, \
                             is_published, owner_id, created_at, updated_at";

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, fullname, password, avatar, cover_image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.fullname,
                    user.password_hash,
                    user.avatar,
                    user.cover_image,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", params![id]))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", params![username]))
    }

    /// First user whose username or email matches either value. `None`
    /// values never match.
    pub fn find_user_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(
                conn,
                "(?1 IS NOT NULL AND username = ?1) OR (?2 IS NOT NULL AND email = ?2)",
                params![username, email],
            )
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id"))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns the number of rows removed (0 or 1). Videos, subscriptions and
    /// watch history of the user go with it.
    pub fn delete_user(&self, id: &str) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?))
    }

    pub fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("UPDATE users SET refresh_token = ?2, updated_at = {NOW} WHERE id = ?1"),
                params![id, token],
            )?;
            Ok(())
        })
    }

    /// Swap the stored refresh token only if it still equals `expected`.
    /// Returns false when another rotation or a logout got there first.
    pub fn replace_refresh_token(&self, id: &str, expected: &str, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE users SET refresh_token = ?3, updated_at = {NOW}
                     WHERE id = ?1 AND refresh_token = ?2"
                ),
                params![id, expected, token],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn set_password(&self, id: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("UPDATE users SET password = ?2, updated_at = {NOW} WHERE id = ?1"),
                params![id, password_hash],
            )?;
            Ok(())
        })
    }

    pub fn update_user_details(
        &self,
        id: &str,
        update: &UserDetailsUpdate<'_>,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "UPDATE users SET
                        username = COALESCE(?2, username),
                        fullname = COALESCE(?3, fullname),
                        email = COALESCE(?4, email),
                        updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![id, update.username, update.fullname, update.email],
            )?;
            query_user(conn, "id = ?1", params![id])
        })
    }

    pub fn set_avatar(&self, id: &str, url: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("UPDATE users SET avatar = ?2, updated_at = {NOW} WHERE id = ?1"),
                params![id, url],
            )?;
            query_user(conn, "id = ?1", params![id])
        })
    }

    pub fn set_cover_image(&self, id: &str, url: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("UPDATE users SET cover_image = ?2, updated_at = {NOW} WHERE id = ?1"),
                params![id, url],
            )?;
            query_user(conn, "id = ?1", params![id])
        })
    }

    // -- Channels & subscriptions --

    pub fn insert_subscription(&self, id: &str, subscriber_id: &str, channel_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO subscriptions (id, subscriber_id, channel_id) VALUES (?1, ?2, ?3)",
                params![id, subscriber_id, channel_id],
            )?;
            Ok(())
        })
    }

    /// Channel page for `username`, with `is_subscribed` computed for
    /// `viewer_id`.
    pub fn get_channel_profile(&self, username: &str, viewer_id: &str) -> Result<Option<ChannelProfile>> {
        self.with_conn(|conn| {
            let profile = conn
                .query_row(
                    "SELECT u.id, u.username, u.fullname, u.email, u.avatar, u.cover_image,
                            (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id),
                            (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id),
                            EXISTS(SELECT 1 FROM subscriptions s
                                   WHERE s.channel_id = u.id AND s.subscriber_id = ?2)
                     FROM users u
                     WHERE u.username = ?1",
                    params![username, viewer_id],
                    |row| {
                        Ok(ChannelProfile {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            fullname: row.get(2)?,
                            email: row.get(3)?,
                            avatar: row.get(4)?,
                            cover_image: row.get(5)?,
                            subscribers_count: row.get::<_, i64>(6)? as u64,
                            channels_subscribed_to_count: row.get::<_, i64>(7)? as u64,
                            is_subscribed: row.get(8)?,
                        })
                    },
                )
                .optional()?;
            Ok(profile)
        })
    }

    // -- Watch history --

    pub fn append_watch_history(&self, user_id: &str, video_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO watch_history (user_id, video_id) VALUES (?1, ?2)",
                params![user_id, video_id],
            )?;
            Ok(())
        })
    }

    /// Watched videos in the order they were watched, each with the owner's
    /// public profile joined in (single query, no N+1).
    pub fn get_watch_history(&self, user_id: &str) -> Result<Vec<WatchHistoryEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT v.id, v.video_file, v.thumbnail, v.title, v.description, v.duration,
                        v.views, v.is_published, v.created_at, v.updated_at,
                        o.id, o.username, o.fullname, o.avatar
                 FROM watch_history w
                 JOIN videos v ON v.id = w.video_id
                 JOIN users o ON o.id = v.owner_id
                 WHERE w.user_id = ?1
                 ORDER BY w.position",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(WatchHistoryEntry {
                        id: row.get(0)?,
                        video_file: row.get(1)?,
                        thumbnail: row.get(2)?,
                        title: row.get(3)?,
                        description: row.get(4)?,
                        duration: row.get(5)?,
                        views: row.get(6)?,
                        is_published: row.get(7)?,
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                        owner: OwnerProfile {
                            id: row.get(10)?,
                            username: row.get(11)?,
                            fullname: row.get(12)?,
                            avatar: row.get(13)?,
                        },
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Videos --

    pub fn create_video(&self, video: &NewVideo<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO videos
                    (id, video_file, thumbnail, title, description, duration, is_published, owner_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    video.id,
                    video.video_file,
                    video.thumbnail,
                    video.title,
                    video.description,
                    video.duration,
                    video.is_published,
                    video.owner_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_video(&self, id: &str) -> Result<Option<VideoRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
                    [id],
                    video_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// A video with its owner's username and email populated.
    pub fn get_video_with_owner(&self, id: &str) -> Result<Option<CreatedVideo>> {
        self.with_conn(|conn| {
            let video = conn
                .query_row(
                    "SELECT v.id, v.video_file, v.thumbnail, v.title, v.description, v.duration,
                            v.views, v.is_published, v.created_at, v.updated_at,
                            o.id, o.username, o.email
                     FROM videos v
                     JOIN users o ON o.id = v.owner_id
                     WHERE v.id = ?1",
                    [id],
                    |row| {
                        Ok(CreatedVideo {
                            id: row.get(0)?,
                            video_file: row.get(1)?,
                            thumbnail: row.get(2)?,
                            title: row.get(3)?,
                            description: row.get(4)?,
                            duration: row.get(5)?,
                            views: row.get(6)?,
                            is_published: row.get(7)?,
                            created_at: row.get(8)?,
                            updated_at: row.get(9)?,
                            owner: VideoOwner {
                                id: row.get(10)?,
                                username: row.get(11)?,
                                email: row.get(12)?,
                            },
                        })
                    },
                )
                .optional()?;
            Ok(video)
        })
    }

    pub fn list_videos_by_owner(&self, owner_id: &str) -> Result<Vec<VideoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos WHERE owner_id = ?1 ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([owner_id], video_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_video(&self, id: &str) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM videos WHERE id = ?1", [id])?))
    }
}

fn query_user(conn: &Connection, predicate: &str, params: impl rusqlite::Params) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate} LIMIT 1"))?;
    let row = stmt.query_row(params, user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        fullname: row.get(3)?,
        password: row.get(4)?,
        avatar: row.get(5)?,
        cover_image: row.get(6)?,
        refresh_token: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRow> {
    Ok(VideoRow {
        id: row.get(0)?,
        video_file: row.get(1)?,
        thumbnail: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        duration: row.get(5)?,
        views: row.get(6)?,
        is_published: row.get(7)?,
        owner_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
