mod blocks;
mod comments;
mod follows;
mod posts;
mod private_messages;
mod rating;
mod reactions;
mod users;

use super::models::{
    CommentRecord, LeaderboardEntry, PendingAction, PostRecord, PrivateMessageRecord, ReactionKind,
    ReactionTally, UserRecord,
};
use anyhow::Result;
use rusqlite::Connection;

pub trait UserRepository {
    fn create(&self, record: &UserRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>>;
    fn get_by_name(&self, anonymous_name: &str) -> Result<Option<UserRecord>>;
    fn set_name(&self, id: &str, name: &str) -> Result<()>;
    fn set_display_tag(&self, id: &str, tag: &str) -> Result<()>;
    fn set_notifications_enabled(&self, id: &str, enabled: bool) -> Result<()>;
    fn set_privacy_public(&self, id: &str, public: bool) -> Result<()>;
    fn pending_action(&self, id: &str) -> Result<Option<PendingAction>>;
    fn store_pending_action(&self, id: &str, action: &PendingAction) -> Result<()>;
    /// Atomically replaces the pending-action slot and returns the previous
    /// value, so a message consumes the slot exactly once. Returns `None`
    /// when the user does not exist.
    fn swap_pending_action(
        &self,
        id: &str,
        next: &PendingAction,
    ) -> Result<Option<PendingAction>>;
    fn count(&self) -> Result<usize>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
    fn mark_approved(&self, id: &str, approved_by: &str) -> Result<()>;
    /// Records the mirror handle only if none is set yet. Returns `false`
    /// when a handle already exists (the handle is immutable once written).
    fn set_mirror_handle(&self, id: &str, handle: &str) -> Result<bool>;
    fn list_pending(&self, limit: usize) -> Result<Vec<PostRecord>>;
    fn list_recent_approved(&self, limit: usize) -> Result<Vec<PostRecord>>;
    fn count_pending(&self) -> Result<usize>;
    fn count_approved(&self) -> Result<usize>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<CommentRecord>>;
    /// Top-level comments of a post, newest first.
    fn list_top_level(&self, post_id: &str, limit: usize, offset: usize)
        -> Result<Vec<CommentRecord>>;
    /// Direct replies under a comment, oldest first (conversational order).
    fn list_replies(
        &self,
        parent_comment_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommentRecord>>;
    fn top_level_ids(&self, post_id: &str) -> Result<Vec<String>>;
    fn child_ids(&self, parent_comment_id: &str) -> Result<Vec<String>>;
    fn count_for_post(&self, post_id: &str) -> Result<usize>;
    fn count_total(&self) -> Result<usize>;
}

pub trait ReactionRepository {
    fn reaction_of(&self, comment_id: &str, user_id: &str) -> Result<Option<ReactionKind>>;
    /// Delete-then-insert in one transaction: removes any existing reaction
    /// by the user on the comment and inserts `kind` unless it matches the
    /// kind just removed (pure toggle-off). Returns the refreshed tally.
    fn toggle(
        &self,
        comment_id: &str,
        user_id: &str,
        kind: ReactionKind,
        created_at: &str,
    ) -> Result<ReactionTally>;
    fn tally(&self, comment_id: &str) -> Result<ReactionTally>;
}

pub trait FollowRepository {
    fn follow(&self, follower_id: &str, followed_id: &str) -> Result<()>;
    fn unfollow(&self, follower_id: &str, followed_id: &str) -> Result<()>;
    fn is_following(&self, follower_id: &str, followed_id: &str) -> Result<bool>;
    fn count_followers(&self, followed_id: &str) -> Result<usize>;
}

pub trait PrivateMessageRepository {
    fn create(&self, record: &PrivateMessageRecord) -> Result<()>;
    /// Messages for a receiver, newest first.
    fn list_for_receiver(
        &self,
        receiver_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PrivateMessageRecord>>;
    fn count_for_receiver(&self, receiver_id: &str) -> Result<usize>;
    fn count_unread(&self, receiver_id: &str) -> Result<usize>;
    fn mark_all_read(&self, receiver_id: &str) -> Result<()>;
    fn count_total(&self) -> Result<usize>;
}

pub trait BlockRepository {
    fn block(&self, blocker_id: &str, blocked_id: &str, created_at: &str) -> Result<()>;
    fn unblock(&self, blocker_id: &str, blocked_id: &str) -> Result<()>;
    fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool>;
}

pub trait RatingRepository {
    /// Approved posts authored plus comments authored (replies count the
    /// same as top-level comments).
    fn score(&self, user_id: &str) -> Result<i64>;
    /// 1-based position ordered by score descending, ties broken by user
    /// creation order.
    fn rank(&self, user_id: &str) -> Result<Option<usize>>;
    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn reactions(&self) -> impl ReactionRepository + '_ {
        reactions::SqliteReactionRepository { conn: self.conn }
    }

    pub fn follows(&self) -> impl FollowRepository + '_ {
        follows::SqliteFollowRepository { conn: self.conn }
    }

    pub fn private_messages(&self) -> impl PrivateMessageRepository + '_ {
        private_messages::SqlitePrivateMessageRepository { conn: self.conn }
    }

    pub fn blocks(&self) -> impl BlockRepository + '_ {
        blocks::SqliteBlockRepository { conn: self.conn }
    }

    pub fn rating(&self) -> impl RatingRepository + '_ {
        rating::SqliteRatingRepository { conn: self.conn }
    }
}
