use crate::database::models::PrivateMessageRecord;
use crate::database::repositories::{BlockRepository, PrivateMessageRepository, UserRepository};
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::utils::{now_utc_iso, MAX_CONTENT_LEN};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub message: PrivateMessageRecord,
    pub sender_name: String,
    pub sender_tag: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxPage {
    pub entries: Vec<InboxEntry>,
    pub unread: usize,
    pub total: usize,
    pub page: usize,
}

/// Anonymous user-to-user messages. The engine stores the rows; delivery
/// notifications go through the Notifier, invoked by the orchestrator.
#[derive(Clone)]
pub struct PrivateMessageService {
    database: Database,
}

impl PrivateMessageService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Stores a message unless the receiver has blocked the sender.
    pub fn send(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> EngineResult<PrivateMessageRecord> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(EngineError::EmptyContent);
        }
        if content.len() > MAX_CONTENT_LEN {
            return Err(EngineError::OversizedInput {
                length: content.len(),
                limit: MAX_CONTENT_LEN,
            });
        }

        self.database
            .with_repositories(|repos| -> EngineResult<PrivateMessageRecord> {
                if repos.users().get(receiver_id)?.is_none() {
                    return Err(EngineError::UserNotFound(receiver_id.to_string()));
                }
                if repos.blocks().is_blocked(receiver_id, sender_id)? {
                    return Err(EngineError::Blocked);
                }
                let record = PrivateMessageRecord {
                    id: Uuid::new_v4().to_string(),
                    sender_id: sender_id.to_string(),
                    receiver_id: receiver_id.to_string(),
                    content: trimmed.to_string(),
                    created_at: now_utc_iso(),
                    is_read: false,
                };
                repos.private_messages().create(&record)?;
                Ok(record)
            })
    }

    /// One page of the user's inbox, newest first. `page` is 1-based.
    pub fn inbox(&self, user_id: &str, page: usize, page_size: usize) -> EngineResult<InboxPage> {
        let offset = page.saturating_sub(1) * page_size;
        self.database
            .with_repositories(|repos| -> EngineResult<InboxPage> {
                if repos.users().get(user_id)?.is_none() {
                    return Err(EngineError::UserNotFound(user_id.to_string()));
                }
                let messages = repos.private_messages();
                let records = messages.list_for_receiver(user_id, page_size, offset)?;
                let unread = messages.count_unread(user_id)?;
                let total = messages.count_for_receiver(user_id)?;

                let users = repos.users();
                let mut entries = Vec::with_capacity(records.len());
                for message in records {
                    let sender = users.get(&message.sender_id)?;
                    let (sender_name, sender_tag) = sender
                        .map(|user| (user.anonymous_name, user.display_tag))
                        .unwrap_or_else(|| ("Anonymous".to_string(), String::new()));
                    entries.push(InboxEntry {
                        message,
                        sender_name,
                        sender_tag,
                    });
                }
                Ok(InboxPage {
                    entries,
                    unread,
                    total,
                    page: page.max(1),
                })
            })
    }

    pub fn mark_all_read(&self, user_id: &str) -> EngineResult<()> {
        self.database
            .with_repositories(|repos| -> EngineResult<()> {
                repos.private_messages().mark_all_read(user_id)?;
                Ok(())
            })
    }

    pub fn unread_count(&self, user_id: &str) -> EngineResult<usize> {
        self.database
            .with_repositories(|repos| -> EngineResult<usize> {
                Ok(repos.private_messages().count_unread(user_id)?)
            })
    }
}
