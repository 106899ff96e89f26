use serde::{Deserialize, Serialize};

/// A user as it may leave the server. Never carries the password hash or
/// the stored refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Owner fields embedded in a freshly created video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoOwner {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Owner fields embedded in a watch-history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video<O> {
    #[serde(rename = "_id")]
    pub id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner: O,
    pub created_at: String,
    pub updated_at: String,
}

/// Public channel page for a username, with subscription counts derived
/// from the subscriptions relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub subscribers_count: u64,
    pub channels_subscribed_to_count: u64,
    pub is_subscribed: bool,
}

pub type WatchHistoryEntry = Video<OwnerProfile>;
pub type CreatedVideo = Video<VideoOwner>;
