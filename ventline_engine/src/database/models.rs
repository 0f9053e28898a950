use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub anonymous_name: String,
    pub display_tag: String,
    pub notifications_enabled: bool,
    pub privacy_public: bool,
    pub is_admin: bool,
    pub pending_action: PendingAction,
    pub created_at: String,
}

/// The single-slot intent describing how a user's next free-form message is
/// interpreted. Stored as tagged JSON in a TEXT column; exactly one per user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    #[default]
    None,
    AwaitingName,
    AwaitingPost {
        category: String,
    },
    /// `parent_comment_id` is the immediate parent at any depth; `None`
    /// means a top-level comment under the post.
    AwaitingComment {
        post_id: String,
        parent_comment_id: Option<String>,
    },
    AwaitingPrivateMessage {
        target_user_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Voice,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Voice => "voice",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "photo" => Some(MediaKind::Photo),
            "voice" => Some(MediaKind::Voice),
            _ => None,
        }
    }
}

/// Opaque reference to a media object held by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub category: String,
    pub media: Option<MediaRef>,
    pub created_at: String,
    pub approved: bool,
    pub approved_by: Option<String>,
    /// Reference to the published channel message whose comment-count control
    /// mirrors the thread. Set at most once, at approval time.
    pub mirror_handle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    /// `None` for top-level comments under the post.
    pub parent_comment_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub media: Option<MediaRef>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTally {
    pub likes: usize,
    pub dislikes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateMessageRecord {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: String,
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub anonymous_name: String,
    pub display_tag: String,
    pub score: i64,
}
