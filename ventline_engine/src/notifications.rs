use crate::database::repositories::{BlockRepository, UserRepository};
use crate::database::Database;
use crate::messenger::{MessageContent, Messenger, Target};
use anyhow::Result;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    NewReply,
    NewPrivateMessage,
}

/// Decides whether a user should be notified about an event. The policy
/// reads the target's preference flags and the block table; it does not own
/// their storage semantics.
pub trait NotificationPolicy: Send + Sync {
    fn should_notify(
        &self,
        target_user_id: &str,
        sender_user_id: &str,
        event: NotificationEvent,
    ) -> Result<bool>;
}

/// Default policy backed by the repository: no self-notifications, nothing
/// to users who disabled notifications, nothing from senders the target has
/// blocked.
pub struct StoredPreferencesPolicy {
    database: Database,
}

impl StoredPreferencesPolicy {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl NotificationPolicy for StoredPreferencesPolicy {
    fn should_notify(
        &self,
        target_user_id: &str,
        sender_user_id: &str,
        _event: NotificationEvent,
    ) -> Result<bool> {
        if target_user_id == sender_user_id {
            return Ok(false);
        }
        self.database.with_repositories(|repos| {
            if repos.blocks().is_blocked(target_user_id, sender_user_id)? {
                return Ok(false);
            }
            let Some(target) = repos.users().get(target_user_id)? else {
                return Ok(false);
            };
            Ok(target.notifications_enabled)
        })
    }
}

/// Delivers best-effort notifications through the Messenger. Delivery
/// failures are logged and swallowed; a lost notification never fails the
/// mutation that triggered it.
#[derive(Clone)]
pub struct Notifier {
    database: Database,
    messenger: Arc<dyn Messenger>,
    policy: Arc<dyn NotificationPolicy>,
}

impl Notifier {
    pub fn new(
        database: Database,
        messenger: Arc<dyn Messenger>,
        policy: Arc<dyn NotificationPolicy>,
    ) -> Self {
        Self {
            database,
            messenger,
            policy,
        }
    }

    pub async fn reply_posted(&self, target_user_id: &str, sender_user_id: &str, preview: &str) {
        match self
            .policy
            .should_notify(target_user_id, sender_user_id, NotificationEvent::NewReply)
        {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                tracing::warn!(target_user_id, error = %err, "notification policy check failed");
                return;
            }
        }
        let sender_name = self.display_name(sender_user_id);
        let text = format!(
            "{} replied to your comment:\n{}",
            sender_name,
            truncate(preview, 100)
        );
        self.deliver(target_user_id, &text).await;
    }

    pub async fn private_message_received(
        &self,
        target_user_id: &str,
        sender_user_id: &str,
        preview: &str,
    ) {
        match self.policy.should_notify(
            target_user_id,
            sender_user_id,
            NotificationEvent::NewPrivateMessage,
        ) {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                tracing::warn!(target_user_id, error = %err, "notification policy check failed");
                return;
            }
        }
        let sender_name = self.display_name(sender_user_id);
        let text = format!(
            "New private message from {}:\n{}",
            sender_name,
            truncate(preview, 100)
        );
        self.deliver(target_user_id, &text).await;
    }

    /// Tells the configured admin that a post waits for review. Admin
    /// notifications bypass the preference policy.
    pub async fn post_awaiting_review(&self, admin_user_id: &str, author_id: &str, preview: &str) {
        let author_name = self.display_name(author_id);
        let text = format!(
            "New post awaiting approval from {}:\n{}",
            author_name,
            truncate(preview, 100)
        );
        self.deliver(admin_user_id, &text).await;
    }

    pub async fn post_approved(&self, author_id: &str) {
        self.deliver(author_id, "Your post has been approved and published!")
            .await;
    }

    pub async fn post_rejected(&self, author_id: &str) {
        self.deliver(author_id, "Your post was not approved.").await;
    }

    async fn deliver(&self, target_user_id: &str, text: &str) {
        let target = Target::User(target_user_id.to_string());
        if let Err(err) = self
            .messenger
            .send_message(&target, &MessageContent::text(text), &[])
            .await
        {
            tracing::warn!(target_user_id, error = %err, "notification delivery failed");
        }
    }

    fn display_name(&self, user_id: &str) -> String {
        self.database
            .with_repositories(|repos| repos.users().get(user_id))
            .ok()
            .flatten()
            .map(|user| user.anonymous_name)
            .unwrap_or_else(|| "Anonymous".to_string())
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PendingAction, UserRecord};
    use crate::messenger::RecordingMessenger;
    use crate::utils::now_utc_iso;

    fn seed_user(database: &Database, id: &str, notifications_enabled: bool) {
        database
            .with_repositories(|repos| {
                repos.users().create(&UserRecord {
                    id: id.into(),
                    anonymous_name: format!("Anonymous{id}"),
                    display_tag: String::new(),
                    notifications_enabled,
                    privacy_public: true,
                    is_admin: false,
                    pending_action: PendingAction::None,
                    created_at: now_utc_iso(),
                })
            })
            .expect("seed user");
    }

    fn setup() -> (Database, Arc<RecordingMessenger>, Notifier) {
        let database = Database::open_in_memory().unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        let policy = Arc::new(StoredPreferencesPolicy::new(database.clone()));
        let notifier = Notifier::new(database.clone(), messenger.clone(), policy);
        (database, messenger, notifier)
    }

    #[tokio::test]
    async fn policy_blocks_self_disabled_and_blocked_senders() {
        let (database, messenger, notifier) = setup();
        seed_user(&database, "target", true);
        seed_user(&database, "muted", false);
        seed_user(&database, "sender", true);

        notifier.reply_posted("target", "target", "self reply").await;
        assert!(messenger.sent().is_empty(), "no self-notification");

        notifier.reply_posted("muted", "sender", "hello").await;
        assert!(messenger.sent().is_empty(), "disabled notifications respected");

        database
            .with_repositories(|repos| repos.blocks().block("target", "sender", &now_utc_iso()))
            .unwrap();
        notifier
            .private_message_received("target", "sender", "hi")
            .await;
        assert!(messenger.sent().is_empty(), "blocked sender suppressed");
    }

    #[tokio::test]
    async fn reply_notification_reaches_an_open_target() {
        let (database, messenger, notifier) = setup();
        seed_user(&database, "target", true);
        seed_user(&database, "sender", true);

        notifier.reply_posted("target", "sender", "hi back").await;
        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, Target::User("target".into()));
        assert!(sent[0].content.text.contains("Anonymoussender"));
        assert!(sent[0].content.text.contains("hi back"));
    }
}
