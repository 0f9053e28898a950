use crate::database::models::PendingAction;
use crate::database::repositories::{CommentRepository, PostRepository, UserRepository};
use crate::database::Database;
use crate::error::{EngineError, EngineResult};

/// Per-user single-slot state deciding what the user's next free-form
/// message means. Arming a state overwrites whatever was there before (last
/// action wins), so a user is never in two pending actions at once; `take`
/// consumes the slot so a message is interpreted exactly once.
///
/// The slot persists with the user row and survives process restarts. The
/// post-confirmation draft it can lead to does not (see `posting`).
#[derive(Clone)]
pub struct ConversationStateMachine {
    database: Database,
}

impl ConversationStateMachine {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn current(&self, user_id: &str) -> EngineResult<PendingAction> {
        self.database
            .with_repositories(|repos| -> EngineResult<PendingAction> {
                repos
                    .users()
                    .pending_action(user_id)?
                    .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))
            })
    }

    pub fn begin_post(&self, user_id: &str, category: &str) -> EngineResult<()> {
        self.arm(
            user_id,
            PendingAction::AwaitingPost {
                category: category.to_string(),
            },
        )
    }

    /// Arms a comment (or reply) target. The stored parent is the immediate
    /// parent at any depth; replying to a reply simply stores that reply's
    /// id. Target validity is checked now so a stale button press fails
    /// early rather than at message time.
    pub fn begin_comment(
        &self,
        user_id: &str,
        post_id: &str,
        parent_comment_id: Option<&str>,
    ) -> EngineResult<()> {
        self.database.with_repositories(|repos| -> EngineResult<()> {
            if repos.posts().get(post_id)?.is_none() {
                return Err(EngineError::PostNotFound(post_id.to_string()));
            }
            if let Some(parent_id) = parent_comment_id {
                match repos.comments().get(parent_id)? {
                    Some(parent) if parent.post_id == post_id => {}
                    _ => {
                        return Err(EngineError::InvalidParent {
                            post_id: post_id.to_string(),
                            parent_comment_id: parent_id.to_string(),
                        })
                    }
                }
            }
            store(
                &repos.users(),
                user_id,
                PendingAction::AwaitingComment {
                    post_id: post_id.to_string(),
                    parent_comment_id: parent_comment_id.map(Into::into),
                },
            )
        })
    }

    pub fn begin_name_change(&self, user_id: &str) -> EngineResult<()> {
        self.arm(user_id, PendingAction::AwaitingName)
    }

    pub fn begin_private_message(&self, user_id: &str, target_user_id: &str) -> EngineResult<()> {
        self.database.with_repositories(|repos| -> EngineResult<()> {
            if repos.users().get(target_user_id)?.is_none() {
                return Err(EngineError::UserNotFound(target_user_id.to_string()));
            }
            store(
                &repos.users(),
                user_id,
                PendingAction::AwaitingPrivateMessage {
                    target_user_id: target_user_id.to_string(),
                },
            )
        })
    }

    /// Atomically consumes the slot, resetting it to `None`, and returns what
    /// was armed. Two racing messages cannot both observe the same slot.
    pub fn take(&self, user_id: &str) -> EngineResult<PendingAction> {
        self.database
            .with_repositories(|repos| -> EngineResult<PendingAction> {
                repos
                    .users()
                    .swap_pending_action(user_id, &PendingAction::None)?
                    .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))
            })
    }

    fn arm(&self, user_id: &str, action: PendingAction) -> EngineResult<()> {
        self.database
            .with_repositories(|repos| -> EngineResult<()> {
                store(&repos.users(), user_id, action)
            })
    }
}

fn store(users: &impl UserRepository, user_id: &str, action: PendingAction) -> EngineResult<()> {
    if users.get(user_id)?.is_none() {
        return Err(EngineError::UserNotFound(user_id.to_string()));
    }
    users.store_pending_action(user_id, &action)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PostRecord, UserRecord};
    use crate::utils::now_utc_iso;

    fn setup() -> (Database, ConversationStateMachine) {
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
                repos.users().create(&UserRecord {
                    id: "u2".into(),
                    anonymous_name: "Anonymous2".into(),
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
                    mirror_handle: None,
                })
            })
            .expect("seed");
        let machine = ConversationStateMachine::new(database.clone());
        (database, machine)
    }

    #[test]
    fn arming_overwrites_and_take_consumes_once() {
        let (_database, machine) = setup();

        machine.begin_name_change("u1").unwrap();
        assert_eq!(machine.current("u1").unwrap(), PendingAction::AwaitingName);

        // Starting another action silently replaces the old one.
        machine.begin_post("u1", "Other").unwrap();
        assert_eq!(
            machine.current("u1").unwrap(),
            PendingAction::AwaitingPost {
                category: "Other".into()
            }
        );

        let taken = machine.take("u1").unwrap();
        assert_eq!(
            taken,
            PendingAction::AwaitingPost {
                category: "Other".into()
            }
        );
        // The slot is consumed: a second take sees nothing pending.
        assert_eq!(machine.take("u1").unwrap(), PendingAction::None);
    }

    #[test]
    fn comment_targets_are_validated_when_armed() {
        let (database, machine) = setup();

        machine.begin_comment("u1", "p1", None).unwrap();
        assert_eq!(
            machine.current("u1").unwrap(),
            PendingAction::AwaitingComment {
                post_id: "p1".into(),
                parent_comment_id: None,
            }
        );

        let err = machine.begin_comment("u1", "missing", None).unwrap_err();
        assert!(matches!(err, EngineError::PostNotFound(_)));

        let err = machine
            .begin_comment("u1", "p1", Some("missing"))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParent { .. }));

        // A reply target stores the immediate parent, however deep.
        database
            .with_repositories(|repos| {
                repos.comments().create(&crate::database::models::CommentRecord {
                    id: "c1".into(),
                    post_id: "p1".into(),
                    parent_comment_id: None,
                    author_id: "u1".into(),
                    content: "top".into(),
                    media: None,
                    created_at: now_utc_iso(),
                })
            })
            .unwrap();
        machine.begin_comment("u1", "p1", Some("c1")).unwrap();
        assert_eq!(
            machine.current("u1").unwrap(),
            PendingAction::AwaitingComment {
                post_id: "p1".into(),
                parent_comment_id: Some("c1".into()),
            }
        );
    }

    #[test]
    fn private_message_target_must_exist() {
        let (_database, machine) = setup();
        machine.begin_private_message("u1", "u2").unwrap();
        assert_eq!(
            machine.current("u1").unwrap(),
            PendingAction::AwaitingPrivateMessage {
                target_user_id: "u2".into()
            }
        );

        let err = machine.begin_private_message("u1", "ghost").unwrap_err();
        assert!(matches!(err, EngineError::UserNotFound(_)));
    }

    #[test]
    fn unknown_user_is_reported_distinctly() {
        let (_database, machine) = setup();
        assert!(matches!(
            machine.take("ghost").unwrap_err(),
            EngineError::UserNotFound(_)
        ));
        assert!(matches!(
            machine.begin_name_change("ghost").unwrap_err(),
            EngineError::UserNotFound(_)
        ));
    }
}
