use crate::comment_tree::CommentTree;
use crate::database::models::PostRecord;
use crate::database::repositories::PostRepository;
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::messenger::{Control, ControlUpdate, MessageHandle, Messenger};
use std::sync::Arc;

/// Builds the comment-count control attached to a published channel message.
/// The count is baked into the payload, which is what makes `refresh`
/// idempotent: pushing the same count twice is a no-op at the transport.
pub(crate) fn comment_counter_control(post_id: &str, total: usize) -> Control {
    Control {
        label: format!("💬 Comments ({total})"),
        action: format!("comments:{post_id}"),
    }
}

/// Result of one mirror refresh. `Failed` is a warning, not an error: the
/// thread data is already durably committed when a refresh runs, and a stale
/// counter is preferred over rolling back a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    Updated(usize),
    Unchanged(usize),
    /// The post has no mirror handle yet (not published).
    Skipped,
    Failed,
}

/// Keeps the externally rendered comment counter consistent with
/// `CommentTree::count_descendants` after thread mutations.
#[derive(Clone)]
pub struct MirrorSync {
    database: Database,
    comment_tree: CommentTree,
    messenger: Arc<dyn Messenger>,
}

impl MirrorSync {
    pub fn new(database: Database, comment_tree: CommentTree, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            database,
            comment_tree,
            messenger,
        }
    }

    /// Recomputes the thread total and pushes it to the post's mirror
    /// control. Safe to run concurrently for the same post: every run pushes
    /// the current recomputed count, so the last writer's value is correct
    /// regardless of ordering.
    pub async fn refresh(&self, post_id: &str) -> EngineResult<MirrorOutcome> {
        let post = self
            .database
            .with_repositories(|repos| -> EngineResult<PostRecord> {
                repos
                    .posts()
                    .get(post_id)?
                    .ok_or_else(|| EngineError::PostNotFound(post_id.to_string()))
            })?;
        let Some(handle) = post.mirror_handle else {
            return Ok(MirrorOutcome::Skipped);
        };

        let total = self.comment_tree.count_descendants(post_id)?;
        let controls = vec![comment_counter_control(post_id, total)];
        match self
            .messenger
            .update_control(&MessageHandle(handle), &controls)
            .await
        {
            Ok(ControlUpdate::Updated) => Ok(MirrorOutcome::Updated(total)),
            Ok(ControlUpdate::Unchanged) => Ok(MirrorOutcome::Unchanged(total)),
            Err(err) => {
                tracing::warn!(
                    post_id,
                    total,
                    error = %err,
                    "mirror refresh failed; thread data remains committed"
                );
                Ok(MirrorOutcome::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment_tree::NewComment;
    use crate::database::models::{PendingAction, UserRecord};
    use crate::database::repositories::UserRepository;
    use crate::messenger::RecordingMessenger;
    use crate::utils::now_utc_iso;

    fn setup(mirror_handle: Option<&str>) -> (Arc<RecordingMessenger>, MirrorSync, CommentTree) {
        let database = Database::open_in_memory().expect("in-memory db");
        database
            .with_repositories(|repos| {
                repos.users().create(&UserRecord {
                    id: "u1".into(),
                    anonymous_name: "Anonymous1".into(),
                    display_tag: String::new(),
                    notifications_enabled: true,
                    privacy_public: true,
                    is_admin: false,
                    pending_action: PendingAction::None,
                    created_at: now_utc_iso(),
                })?;
                repos.posts().create(&PostRecord {
                    id: "p1".into(),
                    author_id: "u1".into(),
                    content: "post".into(),
                    category: "Other".into(),
                    media: None,
                    created_at: now_utc_iso(),
                    approved: true,
                    approved_by: None,
                    mirror_handle: mirror_handle.map(Into::into),
                })
            })
            .expect("seed");

        let messenger = Arc::new(RecordingMessenger::new());
        let tree = CommentTree::new(database.clone());
        let sync = MirrorSync::new(database, tree.clone(), messenger.clone());
        (messenger, sync, tree)
    }

    async fn register_handle(messenger: &RecordingMessenger) -> MessageHandle {
        // The recording messenger only updates handles it has issued.
        messenger
            .send_message(
                &crate::messenger::Target::Channel,
                &crate::messenger::MessageContent::text("published post"),
                &[comment_counter_control("p1", 0)],
            )
            .await
            .expect("send")
    }

    #[tokio::test]
    async fn refresh_without_handle_is_skipped() {
        let (_messenger, sync, _tree) = setup(None);
        let outcome = sync.refresh("p1").await.unwrap();
        assert_eq!(outcome, MirrorOutcome::Skipped);
    }

    #[tokio::test]
    async fn repeated_refresh_with_no_mutation_is_a_no_op_success() {
        let (messenger, sync, tree) = setup(Some("msg-1"));
        register_handle(&messenger).await;

        tree.add_comment(NewComment {
            post_id: "p1".into(),
            parent_comment_id: None,
            author_id: "u1".into(),
            content: "hello".into(),
            media: None,
        })
        .unwrap();

        let first = sync.refresh("p1").await.unwrap();
        assert_eq!(first, MirrorOutcome::Updated(1));

        let second = sync.refresh("p1").await.unwrap();
        assert_eq!(second, MirrorOutcome::Unchanged(1));

        let controls = messenger
            .controls_for(&MessageHandle("msg-1".into()))
            .unwrap();
        assert_eq!(controls, vec![comment_counter_control("p1", 1)]);
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed_as_failed_outcome() {
        let (messenger, sync, _tree) = setup(Some("msg-1"));
        register_handle(&messenger).await;
        messenger.set_fail_updates(true);

        let outcome = sync.refresh("p1").await.unwrap();
        assert_eq!(outcome, MirrorOutcome::Failed);
    }

    #[tokio::test]
    async fn missing_post_is_a_validation_error() {
        let (_messenger, sync, _tree) = setup(None);
        let err = sync.refresh("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::PostNotFound(_)));
    }
}
