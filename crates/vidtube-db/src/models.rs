//! Database row types. These map directly to SQLite rows and stay distinct
//! from the vidtube-types API models so secrets never leak by accident.

use vidtube_types::models::PublicUser;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserRow> for PublicUser {
    fn from(row: UserRow) -> Self {
        PublicUser {
            id: row.id,
            username: row.username,
            email: row.email,
            fullname: row.fullname,
            avatar: row.avatar,
            cover_image: row.cover_image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub fullname: &'a str,
    pub password_hash: &'a str,
    pub avatar: &'a str,
    pub cover_image: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct VideoRow {
    pub id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewVideo<'a> {
    pub id: &'a str,
    pub video_file: &'a str,
    pub thumbnail: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub duration: f64,
    pub is_published: bool,
    pub owner_id: &'a str,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct UserDetailsUpdate<'a> {
    pub username: Option<&'a str>,
    pub fullname: Option<&'a str>,
    pub email: Option<&'a str>,
}
