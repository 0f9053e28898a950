use crate::database::models::{MediaRef, PostRecord};
use crate::database::repositories::{
    CommentRepository, PostRepository, PrivateMessageRepository, UserRepository,
};
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::messenger::{MessageContent, Messenger, Target};
use crate::mirror::comment_counter_control;
use crate::notifications::Notifier;
use crate::utils::{now_utc_iso, MAX_CONTENT_LEN};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftPreview {
    pub content: String,
    pub category: String,
    pub media: Option<MediaRef>,
}

struct StoredDraft {
    content: String,
    category: String,
    media: Option<MediaRef>,
    staged_at: Instant,
}

/// Unconfirmed post drafts, keyed by user. Deliberately in-memory: a draft
/// lost to a process restart is an accepted tradeoff, unlike the armed
/// pending-action slot, which persists with the user row.
pub struct DraftStore {
    ttl: Duration,
    drafts: Mutex<HashMap<String, StoredDraft>>,
}

impl DraftStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            drafts: Mutex::new(HashMap::new()),
        }
    }

    fn put(&self, user_id: &str, draft: StoredDraft) {
        self.drafts
            .lock()
            .expect("draft store")
            .insert(user_id.to_string(), draft);
    }

    /// Removes and returns the user's draft. A stale draft is discarded and
    /// reported as expired rather than acted on.
    fn take(&self, user_id: &str) -> EngineResult<StoredDraft> {
        let draft = self
            .drafts
            .lock()
            .expect("draft store")
            .remove(user_id)
            .ok_or(EngineError::DraftMissing)?;
        if draft.staged_at.elapsed() > self.ttl {
            return Err(EngineError::DraftExpired);
        }
        Ok(draft)
    }

    fn discard(&self, user_id: &str) -> bool {
        self.drafts
            .lock()
            .expect("draft store")
            .remove(user_id)
            .is_some()
    }
}

/// Post submission: stages a confirmation draft from the user's message,
/// then turns a confirmed draft into an unapproved post in the moderation
/// queue.
#[derive(Clone)]
pub struct PostingService {
    database: Database,
    drafts: Arc<DraftStore>,
}

impl PostingService {
    pub fn new(database: Database, drafts: Arc<DraftStore>) -> Self {
        Self { database, drafts }
    }

    pub fn stage_draft(
        &self,
        user_id: &str,
        content: &str,
        category: &str,
        media: Option<MediaRef>,
    ) -> EngineResult<DraftPreview> {
        if content.trim().is_empty() && media.is_none() {
            return Err(EngineError::EmptyContent);
        }
        if content.len() > MAX_CONTENT_LEN {
            return Err(EngineError::OversizedInput {
                length: content.len(),
                limit: MAX_CONTENT_LEN,
            });
        }
        self.drafts.put(
            user_id,
            StoredDraft {
                content: content.to_string(),
                category: category.to_string(),
                media: media.clone(),
                staged_at: Instant::now(),
            },
        );
        Ok(DraftPreview {
            content: content.to_string(),
            category: category.to_string(),
            media,
        })
    }

    pub fn discard_draft(&self, user_id: &str) -> bool {
        self.drafts.discard(user_id)
    }

    /// Turns the user's staged draft into a post awaiting approval.
    pub fn confirm_draft(&self, user_id: &str) -> EngineResult<PostRecord> {
        let draft = self.drafts.take(user_id)?;
        self.database
            .with_repositories(|repos| -> EngineResult<PostRecord> {
                if repos.users().get(user_id)?.is_none() {
                    return Err(EngineError::UserNotFound(user_id.to_string()));
                }
                let record = PostRecord {
                    id: Uuid::new_v4().to_string(),
                    author_id: user_id.to_string(),
                    content: draft.content.clone(),
                    category: draft.category.clone(),
                    media: draft.media.clone(),
                    created_at: now_utc_iso(),
                    approved: false,
                    approved_by: None,
                    mirror_handle: None,
                };
                repos.posts().create(&record)?;
                Ok(record)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommunityStats {
    pub users: usize,
    pub approved_posts: usize,
    pub pending_posts: usize,
    pub comments: usize,
    pub private_messages: usize,
}

/// Approval and rejection transitions. The moderation UI lives outside the
/// engine; these are the state changes it invokes.
#[derive(Clone)]
pub struct ModerationService {
    database: Database,
    messenger: Arc<dyn Messenger>,
    notifier: Notifier,
}

impl ModerationService {
    pub fn new(database: Database, messenger: Arc<dyn Messenger>, notifier: Notifier) -> Self {
        Self {
            database,
            messenger,
            notifier,
        }
    }

    /// Publishes the post to the channel and marks it approved. The mirror
    /// handle returned by the transport is recorded exactly once; a post
    /// that already carries one cannot be published again.
    pub async fn approve(&self, admin_id: &str, post_id: &str) -> EngineResult<PostRecord> {
        let post = self
            .database
            .with_repositories(|repos| -> EngineResult<PostRecord> {
                require_admin(&repos.users(), admin_id)?;
                let post = repos
                    .posts()
                    .get(post_id)?
                    .ok_or_else(|| EngineError::PostNotFound(post_id.to_string()))?;
                if post.approved || post.mirror_handle.is_some() {
                    return Err(EngineError::AlreadyPublished);
                }
                Ok(post)
            })?;

        let content = MessageContent {
            text: format!("{}\n\n#{}", post.content, post.category),
            media: post.media.clone(),
        };
        let controls = vec![comment_counter_control(post_id, 0)];
        let handle = self
            .messenger
            .send_message(&Target::Channel, &content, &controls)
            .await?;

        let approved = self
            .database
            .with_repositories(|repos| -> EngineResult<PostRecord> {
                let posts = repos.posts();
                if !posts.set_mirror_handle(post_id, &handle.0)? {
                    // A racing approval published first; its handle stands.
                    return Err(EngineError::AlreadyPublished);
                }
                posts.mark_approved(post_id, admin_id)?;
                posts
                    .get(post_id)?
                    .ok_or_else(|| EngineError::PostNotFound(post_id.to_string()))
            })?;

        tracing::info!(post_id, admin_id, "post approved and published");
        self.notifier.post_approved(&approved.author_id).await;
        Ok(approved)
    }

    /// Rejects a pending post: the author is told, then the post row is
    /// removed (a terminal state).
    pub async fn reject(&self, admin_id: &str, post_id: &str) -> EngineResult<()> {
        let post = self
            .database
            .with_repositories(|repos| -> EngineResult<PostRecord> {
                require_admin(&repos.users(), admin_id)?;
                let post = repos
                    .posts()
                    .get(post_id)?
                    .ok_or_else(|| EngineError::PostNotFound(post_id.to_string()))?;
                if post.approved {
                    return Err(EngineError::AlreadyPublished);
                }
                Ok(post)
            })?;

        self.notifier.post_rejected(&post.author_id).await;
        self.database
            .with_repositories(|repos| -> EngineResult<()> {
                repos.posts().delete(post_id)?;
                Ok(())
            })?;
        tracing::info!(post_id, admin_id, "post rejected");
        Ok(())
    }

    pub fn list_pending(&self, admin_id: &str, limit: usize) -> EngineResult<Vec<PostRecord>> {
        self.database
            .with_repositories(|repos| -> EngineResult<Vec<PostRecord>> {
                require_admin(&repos.users(), admin_id)?;
                Ok(repos.posts().list_pending(limit)?)
            })
    }

    pub fn stats(&self, admin_id: &str) -> EngineResult<CommunityStats> {
        self.database
            .with_repositories(|repos| -> EngineResult<CommunityStats> {
                require_admin(&repos.users(), admin_id)?;
                Ok(CommunityStats {
                    users: repos.users().count()?,
                    approved_posts: repos.posts().count_approved()?,
                    pending_posts: repos.posts().count_pending()?,
                    comments: repos.comments().count_total()?,
                    private_messages: repos.private_messages().count_total()?,
                })
            })
    }
}

fn require_admin(users: &impl UserRepository, admin_id: &str) -> EngineResult<()> {
    let user = users
        .get(admin_id)?
        .ok_or_else(|| EngineError::UserNotFound(admin_id.to_string()))?;
    if !user.is_admin {
        return Err(EngineError::NotAuthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PendingAction, UserRecord};
    use crate::messenger::RecordingMessenger;
    use crate::notifications::StoredPreferencesPolicy;

    fn seed_user(database: &Database, id: &str, is_admin: bool) {
        database
            .with_repositories(|repos| {
                repos.users().create(&UserRecord {
                    id: id.into(),
                    anonymous_name: format!("Anonymous{id}"),
                    display_tag: String::new(),
                    notifications_enabled: true,
                    privacy_public: true,
                    is_admin,
                    pending_action: PendingAction::None,
                    created_at: now_utc_iso(),
                })
            })
            .expect("seed user");
    }

    fn setup(ttl: Duration) -> (Database, Arc<RecordingMessenger>, PostingService, ModerationService) {
        let database = Database::open_in_memory().unwrap();
        seed_user(&database, "author", false);
        seed_user(&database, "admin", true);

        let messenger = Arc::new(RecordingMessenger::new());
        let policy = Arc::new(StoredPreferencesPolicy::new(database.clone()));
        let notifier = Notifier::new(database.clone(), messenger.clone(), policy);
        let posting = PostingService::new(database.clone(), Arc::new(DraftStore::new(ttl)));
        let moderation = ModerationService::new(database.clone(), messenger.clone(), notifier);
        (database, messenger, posting, moderation)
    }

    #[test]
    fn draft_round_trip_and_expiry() {
        let (_db, _messenger, posting, _moderation) = setup(Duration::from_secs(300));

        assert!(matches!(
            posting.confirm_draft("author").unwrap_err(),
            EngineError::DraftMissing
        ));

        posting
            .stage_draft("author", "my thought", "WorkLife", None)
            .unwrap();
        let post = posting.confirm_draft("author").unwrap();
        assert_eq!(post.content, "my thought");
        assert_eq!(post.category, "WorkLife");
        assert!(!post.approved);
        assert!(post.mirror_handle.is_none());

        // Confirming again without a new draft fails.
        assert!(matches!(
            posting.confirm_draft("author").unwrap_err(),
            EngineError::DraftMissing
        ));
    }

    #[test]
    fn stale_drafts_are_rejected() {
        let (_db, _messenger, posting, _moderation) = setup(Duration::ZERO);
        posting
            .stage_draft("author", "too slow", "Other", None)
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            posting.confirm_draft("author").unwrap_err(),
            EngineError::DraftExpired
        ));
        // The stale draft was discarded, not left behind.
        assert!(matches!(
            posting.confirm_draft("author").unwrap_err(),
            EngineError::DraftMissing
        ));
    }

    #[test]
    fn cancel_discards_the_draft() {
        let (_db, _messenger, posting, _moderation) = setup(Duration::from_secs(300));
        posting
            .stage_draft("author", "changed my mind", "Other", None)
            .unwrap();
        assert!(posting.discard_draft("author"));
        assert!(!posting.discard_draft("author"));
    }

    #[tokio::test]
    async fn approval_publishes_once_and_records_the_handle() {
        let (_db, messenger, posting, moderation) = setup(Duration::from_secs(300));
        posting
            .stage_draft("author", "approve me", "Other", None)
            .unwrap();
        let post = posting.confirm_draft("author").unwrap();

        let approved = moderation.approve("admin", &post.id).await.unwrap();
        assert!(approved.approved);
        assert_eq!(approved.approved_by.as_deref(), Some("admin"));
        let handle = approved.mirror_handle.expect("mirror handle recorded");

        let sent = messenger.sent();
        let channel_posts: Vec<_> = sent
            .iter()
            .filter(|m| m.target == Target::Channel)
            .collect();
        assert_eq!(channel_posts.len(), 1);
        assert_eq!(channel_posts[0].handle.0, handle);
        assert!(channel_posts[0].content.text.contains("approve me"));
        assert!(channel_posts[0].content.text.contains("#Other"));
        assert_eq!(
            channel_posts[0].controls,
            vec![comment_counter_control(&post.id, 0)]
        );

        // The author was told.
        assert!(sent
            .iter()
            .any(|m| m.target == Target::User("author".into())));

        // A second approval is refused; the handle is immutable.
        assert!(matches!(
            moderation.approve("admin", &post.id).await.unwrap_err(),
            EngineError::AlreadyPublished
        ));
    }

    #[tokio::test]
    async fn moderation_requires_the_admin_flag() {
        let (_db, _messenger, posting, moderation) = setup(Duration::from_secs(300));
        posting
            .stage_draft("author", "post", "Other", None)
            .unwrap();
        let post = posting.confirm_draft("author").unwrap();

        assert!(matches!(
            moderation.approve("author", &post.id).await.unwrap_err(),
            EngineError::NotAuthorized
        ));
        assert!(matches!(
            moderation.reject("author", &post.id).await.unwrap_err(),
            EngineError::NotAuthorized
        ));
        assert!(matches!(
            moderation.list_pending("author", 10).unwrap_err(),
            EngineError::NotAuthorized
        ));
    }

    #[tokio::test]
    async fn rejection_is_terminal() {
        let (database, _messenger, posting, moderation) = setup(Duration::from_secs(300));
        posting
            .stage_draft("author", "reject me", "Other", None)
            .unwrap();
        let post = posting.confirm_draft("author").unwrap();

        moderation.reject("admin", &post.id).await.unwrap();
        let gone = database
            .with_repositories(|repos| repos.posts().get(&post.id))
            .unwrap();
        assert!(gone.is_none());

        let stats = moderation.stats("admin").unwrap();
        assert_eq!(stats.pending_posts, 0);
        assert_eq!(stats.users, 2);
    }
}
