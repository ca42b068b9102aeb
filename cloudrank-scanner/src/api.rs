//! JSON shapes returned by the remote API.

use crate::result::{UserId, UserRecord};
use serde::{Deserialize, Serialize};

/// Paginated collections served by `/users/{id}/{kind}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Followings,
    Followers,
    Likes,
    Comments,
    Reposts,
    Tracks,
}

impl Collection {
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Followings => "followings",
            Collection::Followers => "followers",
            Collection::Likes => "likes",
            Collection::Comments => "comments",
            Collection::Reposts => "reposts",
            Collection::Tracks => "tracks",
        }
    }
}

/// One page of a collection. `next_href` is an absolute URL to the next page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub collection: Vec<T>,
    #[serde(default)]
    pub next_href: Option<String>,
}

impl<T> Page<T> {
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_href.as_deref().filter(|href| !href.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUser {
    pub id: UserId,
    pub username: String,
    pub permalink_url: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl From<ApiUser> for UserRecord {
    fn from(user: ApiUser) -> Self {
        UserRecord {
            avatar_url: user.avatar_url,
            country: user.country,
            city: user.city,
            ..UserRecord::new(user.id, user.username, user.permalink_url)
        }
    }
}

/// Entry of a followings/followers listing. Only the id matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
}

/// Entry of a likes or reposts listing: either a track or a playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub kind: String,
    pub id: u64,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl MediaItem {
    pub fn is_track(&self) -> bool {
        self.kind == "track"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiComment {
    pub id: u64,
    pub track_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTrack {
    pub id: u64,
    pub user_id: UserId,
    #[serde(default)]
    pub playback_count: Option<u64>,
    #[serde(default, alias = "favoritings_count")]
    pub likes_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
}

/// Keeps track entries, drops playlists.
pub fn tracks_only(items: Vec<MediaItem>) -> Vec<MediaItem> {
    items.into_iter().filter(MediaItem::is_track).collect()
}

/// Sums plays, likes and comments over a user's own tracks.
pub fn track_totals(tracks: &[ApiTrack]) -> (u64, u64, u64) {
    tracks.iter().fold((0, 0, 0), |(plays, likes, comments), track| {
        (
            plays + track.playback_count.unwrap_or(0),
            likes + track.likes_count.unwrap_or(0),
            comments + track.comment_count.unwrap_or(0),
        )
    })
}
