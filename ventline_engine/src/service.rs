use crate::comment_tree::{CommentTree, NewComment};
use crate::config::VentlineConfig;
use crate::conversation::ConversationStateMachine;
use crate::database::models::{
    CommentRecord, MediaRef, PendingAction, PostRecord, ReactionKind, ReactionTally,
};
use crate::database::repositories::{CommentRepository, PostRepository};
use crate::database::Database;
use crate::error::EngineResult;
use crate::messages::PrivateMessageService;
use crate::messenger::Messenger;
use crate::mirror::{MirrorOutcome, MirrorSync};
use crate::notifications::{Notifier, StoredPreferencesPolicy};
use crate::posting::{DraftPreview, DraftStore, ModerationService, PostingService};
use crate::profiles::ProfileService;
use crate::rating::RatingEngine;
use std::sync::Arc;

/// A button-style action from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    StartPost {
        category: String,
    },
    WriteComment {
        post_id: String,
    },
    ReplyToComment {
        post_id: String,
        parent_comment_id: String,
    },
    ConfirmPost,
    CancelPost,
    EditName,
    ComposeMessage {
        target_user_id: String,
    },
    /// Sets the profile tag directly; unlike a name change there is no
    /// free-text step, so no pending state is involved.
    SetDisplayTag {
        tag: String,
    },
    ToggleReaction {
        comment_id: String,
        kind: ReactionKind,
    },
    Follow {
        user_id: String,
    },
    Unfollow {
        user_id: String,
    },
    Block {
        user_id: String,
    },
    Unblock {
        user_id: String,
    },
    ToggleNotifications,
    TogglePrivacy,
}

/// Free-form text or media sent by the user, interpreted against their
/// pending action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub text: String,
    pub media: Option<MediaRef>,
}

impl IncomingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Action(UserAction),
    Message(IncomingMessage),
}

/// Tagged success surface rendered by the presentation layer; failures are
/// the `EngineError` side of the result.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeEvent {
    /// An `Awaiting*` state was armed; the user's next message completes it.
    ActionArmed {
        pending: PendingAction,
    },
    DraftReady {
        preview: DraftPreview,
    },
    PostCancelled,
    PostSubmitted {
        post_id: String,
    },
    CommentAdded {
        post_id: String,
        comment_id: String,
        mirror: MirrorOutcome,
    },
    ReactionToggled {
        comment_id: String,
        tally: ReactionTally,
        mirror: MirrorOutcome,
    },
    MessageSent {
        message_id: String,
    },
    NameUpdated {
        name: String,
    },
    TagUpdated {
        tag: String,
    },
    NotificationsToggled {
        enabled: bool,
    },
    PrivacyToggled {
        public: bool,
    },
    FollowUpdated {
        followed: bool,
    },
    BlockUpdated {
        blocked: bool,
    },
    /// The message matched no pending action; the presentation layer shows
    /// its default menu.
    Unhandled,
}

/// Root orchestrator: one entry point per inbound user event. Each call is
/// an isolated unit of work; all cross-task coordination happens in the
/// repository.
#[derive(Clone)]
pub struct DiscussionService {
    database: Database,
    comment_tree: CommentTree,
    conversation: ConversationStateMachine,
    mirror: MirrorSync,
    rating: RatingEngine,
    posting: PostingService,
    moderation: ModerationService,
    messages: PrivateMessageService,
    profiles: ProfileService,
    notifier: Notifier,
    admin_user_id: Option<String>,
}

impl DiscussionService {
    pub fn new(database: Database, messenger: Arc<dyn Messenger>, config: &VentlineConfig) -> Self {
        let comment_tree = CommentTree::new(database.clone());
        let policy = Arc::new(StoredPreferencesPolicy::new(database.clone()));
        let notifier = Notifier::new(database.clone(), messenger.clone(), policy);
        let drafts = Arc::new(DraftStore::new(config.limits.draft_ttl));
        Self {
            conversation: ConversationStateMachine::new(database.clone()),
            mirror: MirrorSync::new(database.clone(), comment_tree.clone(), messenger.clone()),
            rating: RatingEngine::new(database.clone()),
            posting: PostingService::new(database.clone(), drafts),
            moderation: ModerationService::new(
                database.clone(),
                messenger,
                notifier.clone(),
            ),
            messages: PrivateMessageService::new(database.clone()),
            profiles: ProfileService::new(database.clone(), config.community.admin_user_id.clone()),
            notifier,
            comment_tree,
            database,
            admin_user_id: config.community.admin_user_id.clone(),
        }
    }

    pub async fn handle_user_input(
        &self,
        user_id: &str,
        input: UserInput,
    ) -> EngineResult<OutcomeEvent> {
        self.profiles.ensure_user(user_id)?;
        match input {
            UserInput::Action(action) => self.handle_action(user_id, action).await,
            UserInput::Message(message) => self.handle_message(user_id, message).await,
        }
    }

    async fn handle_action(&self, user_id: &str, action: UserAction) -> EngineResult<OutcomeEvent> {
        match action {
            UserAction::StartPost { category } => {
                self.conversation.begin_post(user_id, &category)?;
                self.armed(user_id)
            }
            UserAction::WriteComment { post_id } => {
                self.conversation.begin_comment(user_id, &post_id, None)?;
                self.armed(user_id)
            }
            UserAction::ReplyToComment {
                post_id,
                parent_comment_id,
            } => {
                self.conversation
                    .begin_comment(user_id, &post_id, Some(&parent_comment_id))?;
                self.armed(user_id)
            }
            UserAction::EditName => {
                self.conversation.begin_name_change(user_id)?;
                self.armed(user_id)
            }
            UserAction::ComposeMessage { target_user_id } => {
                self.conversation
                    .begin_private_message(user_id, &target_user_id)?;
                self.armed(user_id)
            }
            UserAction::ConfirmPost => {
                let post = self.posting.confirm_draft(user_id)?;
                if let Some(admin_id) = &self.admin_user_id {
                    self.notifier
                        .post_awaiting_review(admin_id, user_id, &post.content)
                        .await;
                }
                tracing::info!(user_id, post_id = %post.id, "post submitted for review");
                Ok(OutcomeEvent::PostSubmitted { post_id: post.id })
            }
            UserAction::CancelPost => {
                self.posting.discard_draft(user_id);
                Ok(OutcomeEvent::PostCancelled)
            }
            UserAction::SetDisplayTag { tag } => {
                self.profiles.set_display_tag(user_id, &tag)?;
                Ok(OutcomeEvent::TagUpdated { tag })
            }
            UserAction::ToggleReaction { comment_id, kind } => {
                let tally = self
                    .comment_tree
                    .toggle_reaction(&comment_id, user_id, kind)?;
                // The reaction cannot change the comment count, but the
                // refresh is idempotent and keeps the mirror honest after
                // any thread mutation.
                let mirror = match self.comment_record(&comment_id)? {
                    Some(comment) => self.refresh(&comment.post_id).await,
                    None => MirrorOutcome::Skipped,
                };
                Ok(OutcomeEvent::ReactionToggled {
                    comment_id,
                    tally,
                    mirror,
                })
            }
            UserAction::Follow { user_id: target } => {
                self.profiles.follow(user_id, &target)?;
                Ok(OutcomeEvent::FollowUpdated { followed: true })
            }
            UserAction::Unfollow { user_id: target } => {
                self.profiles.unfollow(user_id, &target)?;
                Ok(OutcomeEvent::FollowUpdated { followed: false })
            }
            UserAction::Block { user_id: target } => {
                self.profiles.block(user_id, &target)?;
                Ok(OutcomeEvent::BlockUpdated { blocked: true })
            }
            UserAction::Unblock { user_id: target } => {
                self.profiles.unblock(user_id, &target)?;
                Ok(OutcomeEvent::BlockUpdated { blocked: false })
            }
            UserAction::ToggleNotifications => {
                let enabled = self.profiles.toggle_notifications(user_id)?;
                Ok(OutcomeEvent::NotificationsToggled { enabled })
            }
            UserAction::TogglePrivacy => {
                let public = self.profiles.toggle_privacy(user_id)?;
                Ok(OutcomeEvent::PrivacyToggled { public })
            }
        }
    }

    /// Routes a free-form message by consuming the pending-action slot. The
    /// slot is consumed exactly once, whatever the outcome: a second message
    /// arrives against `None` and falls through to `Unhandled`.
    async fn handle_message(
        &self,
        user_id: &str,
        message: IncomingMessage,
    ) -> EngineResult<OutcomeEvent> {
        match self.conversation.take(user_id)? {
            PendingAction::None => Ok(OutcomeEvent::Unhandled),
            PendingAction::AwaitingName => {
                let user = self.profiles.rename(user_id, &message.text)?;
                Ok(OutcomeEvent::NameUpdated {
                    name: user.anonymous_name,
                })
            }
            PendingAction::AwaitingPost { category } => {
                let preview =
                    self.posting
                        .stage_draft(user_id, &message.text, &category, message.media)?;
                Ok(OutcomeEvent::DraftReady { preview })
            }
            PendingAction::AwaitingComment {
                post_id,
                parent_comment_id,
            } => {
                let comment = self.comment_tree.add_comment(NewComment {
                    post_id: post_id.clone(),
                    parent_comment_id: parent_comment_id.clone(),
                    author_id: user_id.to_string(),
                    content: message.text,
                    media: message.media,
                })?;
                let mirror = self.refresh(&post_id).await;
                if let Some(parent_id) = &parent_comment_id {
                    if let Some(parent) = self.comment_record(parent_id)? {
                        self.notifier
                            .reply_posted(&parent.author_id, user_id, &comment.content)
                            .await;
                    }
                }
                Ok(OutcomeEvent::CommentAdded {
                    post_id,
                    comment_id: comment.id,
                    mirror,
                })
            }
            PendingAction::AwaitingPrivateMessage { target_user_id } => {
                let record = self
                    .messages
                    .send(user_id, &target_user_id, &message.text)?;
                self.notifier
                    .private_message_received(&target_user_id, user_id, &record.content)
                    .await;
                Ok(OutcomeEvent::MessageSent {
                    message_id: record.id,
                })
            }
        }
    }

    /// Mirror refresh is best-effort at this level: the mutation is already
    /// durably committed, so any refresh failure degrades to `Failed`.
    async fn refresh(&self, post_id: &str) -> MirrorOutcome {
        match self.mirror.refresh(post_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(post_id, error = %err, "mirror refresh errored after mutation");
                MirrorOutcome::Failed
            }
        }
    }

    /// Recently published posts, newest first.
    pub fn recent_posts(&self, limit: usize) -> EngineResult<Vec<PostRecord>> {
        self.database
            .with_repositories(|repos| -> EngineResult<Vec<PostRecord>> {
                Ok(repos.posts().list_recent_approved(limit)?)
            })
    }

    fn comment_record(&self, comment_id: &str) -> EngineResult<Option<CommentRecord>> {
        self.database
            .with_repositories(|repos| -> EngineResult<Option<CommentRecord>> {
                Ok(repos.comments().get(comment_id)?)
            })
    }

    fn armed(&self, user_id: &str) -> EngineResult<OutcomeEvent> {
        Ok(OutcomeEvent::ActionArmed {
            pending: self.conversation.current(user_id)?,
        })
    }

    // Read surface for the presentation layer.

    pub fn comment_tree(&self) -> &CommentTree {
        &self.comment_tree
    }

    pub fn rating(&self) -> &RatingEngine {
        &self.rating
    }

    pub fn messages(&self) -> &PrivateMessageService {
        &self.messages
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    pub fn moderation(&self) -> &ModerationService {
        &self.moderation
    }

    pub fn mirror(&self) -> &MirrorSync {
        &self.mirror
    }
}
