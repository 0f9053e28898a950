use crate::database::models::{CommentRecord, MediaRef, ReactionKind, ReactionTally};
use crate::database::repositories::{CommentRepository, PostRepository, ReactionRepository};
use crate::database::Database;
use crate::error::{is_constraint_violation, EngineError, EngineResult};
use crate::utils::{now_utc_iso, MAX_CONTENT_LEN};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: String,
    /// `None` attaches the comment directly under the post.
    pub parent_comment_id: Option<String>,
    pub author_id: String,
    pub content: String,
    pub media: Option<MediaRef>,
}

/// Mutations and derived views over one post's discussion thread.
#[derive(Clone)]
pub struct CommentTree {
    database: Database,
}

impl CommentTree {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Inserts a comment after validating, inside the same unit of work, that
    /// the post exists and that any declared parent belongs to it.
    pub fn add_comment(&self, input: NewComment) -> EngineResult<CommentRecord> {
        let trimmed_len = input.content.trim().len();
        if trimmed_len == 0 && input.media.is_none() {
            return Err(EngineError::EmptyContent);
        }
        if input.content.len() > MAX_CONTENT_LEN {
            return Err(EngineError::OversizedInput {
                length: input.content.len(),
                limit: MAX_CONTENT_LEN,
            });
        }

        self.database
            .with_repositories(|repos| -> EngineResult<CommentRecord> {
                if repos.posts().get(&input.post_id)?.is_none() {
                    return Err(EngineError::PostNotFound(input.post_id.clone()));
                }
                if let Some(parent_id) = &input.parent_comment_id {
                    match repos.comments().get(parent_id)? {
                        Some(parent) if parent.post_id == input.post_id => {}
                        _ => {
                            return Err(EngineError::InvalidParent {
                                post_id: input.post_id.clone(),
                                parent_comment_id: parent_id.clone(),
                            })
                        }
                    }
                }
                let record = CommentRecord {
                    id: Uuid::new_v4().to_string(),
                    post_id: input.post_id.clone(),
                    parent_comment_id: input.parent_comment_id.clone(),
                    author_id: input.author_id.clone(),
                    content: input.content.clone(),
                    media: input.media.clone(),
                    created_at: now_utc_iso(),
                };
                repos.comments().create(&record)?;
                Ok(record)
            })
    }

    /// Toggles the user's reaction on a comment and returns refreshed counts.
    /// A constraint violation from a racing toggle is retried once by
    /// re-reading and reapplying; a second violation surfaces as `Conflict`.
    pub fn toggle_reaction(
        &self,
        comment_id: &str,
        user_id: &str,
        kind: ReactionKind,
    ) -> EngineResult<ReactionTally> {
        match self.try_toggle(comment_id, user_id, kind) {
            Err(EngineError::Repository(err)) if is_constraint_violation(&err) => {
                tracing::debug!(comment_id, user_id, "reaction toggle conflicted, retrying");
                match self.try_toggle(comment_id, user_id, kind) {
                    Err(EngineError::Repository(err)) if is_constraint_violation(&err) => {
                        Err(EngineError::Conflict)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    fn try_toggle(
        &self,
        comment_id: &str,
        user_id: &str,
        kind: ReactionKind,
    ) -> EngineResult<ReactionTally> {
        self.database
            .with_repositories(|repos| -> EngineResult<ReactionTally> {
                if repos.comments().get(comment_id)?.is_none() {
                    return Err(EngineError::CommentNotFound(comment_id.to_string()));
                }
                let tally = repos
                    .reactions()
                    .toggle(comment_id, user_id, kind, &now_utc_iso())?;
                Ok(tally)
            })
    }

    /// Total number of comments in the post's thread, at any depth. Always
    /// recomputed from current rows; the engine stores no counter that could
    /// drift.
    pub fn count_descendants(&self, post_id: &str) -> EngineResult<usize> {
        self.database
            .with_repositories(|repos| -> EngineResult<usize> {
                if repos.posts().get(post_id)?.is_none() {
                    return Err(EngineError::PostNotFound(post_id.to_string()));
                }
                let comments = repos.comments();
                let roots = comments.top_level_ids(post_id)?;
                Ok(walk_count(&comments, roots)?)
            })
    }

    /// Number of replies (at any depth) under one comment.
    pub fn count_descendants_of(&self, comment_id: &str) -> EngineResult<usize> {
        self.database
            .with_repositories(|repos| -> EngineResult<usize> {
                let comments = repos.comments();
                if comments.get(comment_id)?.is_none() {
                    return Err(EngineError::CommentNotFound(comment_id.to_string()));
                }
                let children = comments.child_ids(comment_id)?;
                Ok(walk_count(&comments, children)?)
            })
    }

    pub fn tally(&self, comment_id: &str) -> EngineResult<ReactionTally> {
        self.database
            .with_repositories(|repos| -> EngineResult<ReactionTally> {
                if repos.comments().get(comment_id)?.is_none() {
                    return Err(EngineError::CommentNotFound(comment_id.to_string()));
                }
                Ok(repos.reactions().tally(comment_id)?)
            })
    }

    /// One page of the thread. Top-level comments are newest first; replies
    /// under a comment are oldest first, preserving conversational order.
    /// `page` is 1-based.
    pub fn list_page(
        &self,
        post_id: &str,
        parent_comment_id: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> EngineResult<Vec<CommentRecord>> {
        let offset = page.saturating_sub(1) * page_size;
        self.database
            .with_repositories(|repos| -> EngineResult<Vec<CommentRecord>> {
                if repos.posts().get(post_id)?.is_none() {
                    return Err(EngineError::PostNotFound(post_id.to_string()));
                }
                let comments = repos.comments();
                match parent_comment_id {
                    None => Ok(comments.list_top_level(post_id, page_size, offset)?),
                    Some(parent_id) => {
                        match comments.get(parent_id)? {
                            Some(parent) if parent.post_id == post_id => {}
                            _ => {
                                return Err(EngineError::InvalidParent {
                                    post_id: post_id.to_string(),
                                    parent_comment_id: parent_id.to_string(),
                                })
                            }
                        }
                        Ok(comments.list_replies(parent_id, page_size, offset)?)
                    }
                }
            })
    }
}

/// Iterative depth-first count so arbitrarily deep threads cannot overflow
/// the call stack.
fn walk_count(comments: &impl CommentRepository, seed: Vec<String>) -> anyhow::Result<usize> {
    let mut total = 0;
    let mut stack = seed;
    while let Some(id) = stack.pop() {
        total += 1;
        stack.extend(comments.child_ids(&id)?);
    }
    Ok(total)
}
