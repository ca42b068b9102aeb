use serde::{Deserialize, Serialize};

pub type UserId = u64;

/// A crawled user. Created once per crawl unit; a later crawl of the same user
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub profile_url: String,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub total_play_count: u64,
    pub total_like_count: u64,
    pub total_comment_count: u64,
}

impl UserRecord {
    pub fn new(id: UserId, username: impl Into<String>, profile_url: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            profile_url: profile_url.into(),
            avatar_url: None,
            country: None,
            city: None,
            total_play_count: 0,
            total_like_count: 0,
            total_comment_count: 0,
        }
    }

    /// Returns a copy carrying the given track aggregates.
    pub fn with_totals(self, plays: u64, likes: u64, comments: u64) -> Self {
        Self {
            total_play_count: plays,
            total_like_count: likes,
            total_comment_count: comments,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Following,
    Comment,
    Like,
    Repost,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::Following,
        EdgeKind::Comment,
        EdgeKind::Like,
        EdgeKind::Repost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Following => "following",
            EdgeKind::Comment => "comment",
            EdgeKind::Like => "like",
            EdgeKind::Repost => "repost",
        }
    }
}

/// Directed, typed relation between two users.
///
/// `via` is whatever produced the edge: the followed user for a following,
/// the track for a like or repost, the comment for a comment. Two edges with
/// the same source and `via` are the same edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub source: UserId,
    pub target: UserId,
    pub via: u64,
}

impl Edge {
    pub fn following(source: UserId, target: UserId) -> Self {
        Self {
            kind: EdgeKind::Following,
            source,
            target,
            via: target,
        }
    }

    pub fn via(kind: EdgeKind, source: UserId, target: UserId, via: u64) -> Self {
        Self {
            kind,
            source,
            target,
            via,
        }
    }

    pub fn unique_id(&self) -> String {
        format!("{}-{}", self.source, self.via)
    }
}

/// Everything one crawl unit learned about a user. Handed from a worker to
/// the persistence writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub user: UserRecord,
    pub followings: Vec<Edge>,
    pub comments: Vec<Edge>,
    pub likes: Vec<Edge>,
    pub reposts: Vec<Edge>,
    /// Discovery only, never persisted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub followers: Vec<UserId>,
}

impl CrawlResult {
    pub fn new(user: UserRecord) -> Self {
        Self {
            user,
            followings: Vec::new(),
            comments: Vec::new(),
            likes: Vec::new(),
            reposts: Vec::new(),
            followers: Vec::new(),
        }
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.followings
            .iter()
            .chain(&self.comments)
            .chain(&self.likes)
            .chain(&self.reposts)
    }

    pub fn edges_of(&self, kind: EdgeKind) -> &[Edge] {
        match kind {
            EdgeKind::Following => &self.followings,
            EdgeKind::Comment => &self.comments,
            EdgeKind::Like => &self.likes,
            EdgeKind::Repost => &self.reposts,
        }
    }

    /// Users worth visiting next: everyone followed, then every follower.
    pub fn discovered(&self) -> impl Iterator<Item = UserId> + '_ {
        self.followings
            .iter()
            .map(|edge| edge.target)
            .chain(self.followers.iter().copied())
    }
}
