use crate::config::VentlineConfig;
use crate::database::models::ReactionKind;
use crate::error::EngineError;
use crate::messenger::{
    Control, ControlUpdate, MessageContent, MessageHandle, Messenger, MessengerError, Target,
};
use crate::service::{DiscussionService, IncomingMessage, OutcomeEvent, UserAction, UserInput};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Messenger that renders the shared channel and user chats on stdout.
/// Handles behave like the real transport's: control updates against the
/// same content report `Unchanged`.
#[derive(Default)]
pub struct ConsoleMessenger {
    state: Mutex<ConsoleState>,
}

#[derive(Default)]
struct ConsoleState {
    controls: HashMap<String, Vec<Control>>,
    next_id: u64,
}

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn send_message(
        &self,
        target: &Target,
        content: &MessageContent,
        controls: &[Control],
    ) -> Result<MessageHandle, MessengerError> {
        let mut state = self.state.lock().expect("console state");
        state.next_id += 1;
        let handle = MessageHandle(format!("console-{}", state.next_id));
        state.controls.insert(handle.0.clone(), controls.to_vec());

        let where_to = match target {
            Target::Channel => "[channel]".to_string(),
            Target::User(id) => format!("[dm -> {id}]"),
        };
        println!("{where_to} ({}) {}", handle.0, content.text);
        for control in controls {
            println!("    [{}]", control.label);
        }
        Ok(handle)
    }

    async fn update_control(
        &self,
        handle: &MessageHandle,
        controls: &[Control],
    ) -> Result<ControlUpdate, MessengerError> {
        let mut state = self.state.lock().expect("console state");
        let existing = state
            .controls
            .get(&handle.0)
            .ok_or_else(|| MessengerError::UnknownHandle(handle.0.clone()))?;
        if existing.as_slice() == controls {
            return Ok(ControlUpdate::Unchanged);
        }
        state.controls.insert(handle.0.clone(), controls.to_vec());
        for control in controls {
            println!("[channel] ({}) control now [{}]", handle.0, control.label);
        }
        Ok(ControlUpdate::Updated)
    }
}

/// Runs the interactive REPL that drives the discussion service end to end.
/// Unrecognized lines are delivered as the acting user's free-form message,
/// which is exactly how the chat transport feeds the engine.
pub async fn run_cli(service: DiscussionService, config: VentlineConfig) -> Result<()> {
    let mut session = CliSession {
        service,
        page_size: config.limits.page_size,
        acting_user: "local".to_string(),
    };

    println!("Ventline CLI ready. Type 'help' for a list of commands.");
    println!("Acting as user '{}'. Switch with: user <id>", session.acting_user);

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        print!("ventline> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            println!("Exiting");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let tokens = match shell_words::split(trimmed) {
            Ok(tokens) if !tokens.is_empty() => tokens,
            Ok(_) => continue,
            Err(err) => {
                println!("Unable to parse command: {err}");
                continue;
            }
        };

        match session.handle_command(trimmed, &tokens).await {
            Ok(LoopAction::Continue) => {}
            Ok(LoopAction::Exit) => break,
            Err(err) => {
                println!("Error: {err:#}");
            }
        }
    }

    Ok(())
}

struct CliSession {
    service: DiscussionService,
    page_size: usize,
    acting_user: String,
}

enum LoopAction {
    Continue,
    Exit,
}

impl CliSession {
    async fn handle_command(&mut self, raw: &str, tokens: &[String]) -> Result<LoopAction> {
        let command = tokens[0].as_str();
        match command {
            "help" => {
                self.print_help();
                Ok(LoopAction::Continue)
            }
            "exit" | "quit" => Ok(LoopAction::Exit),
            "user" => {
                if tokens.len() < 2 {
                    println!("Usage: user <id>");
                    return Ok(LoopAction::Continue);
                }
                self.acting_user = tokens[1].clone();
                self.service.profiles().ensure_user(&self.acting_user)?;
                println!("Now acting as '{}'", self.acting_user);
                Ok(LoopAction::Continue)
            }
            "ask" => {
                if tokens.len() < 2 {
                    println!("Usage: ask <category>");
                    return Ok(LoopAction::Continue);
                }
                self.dispatch(UserInput::Action(UserAction::StartPost {
                    category: tokens[1].clone(),
                }))
                .await
            }
            "confirm" => self.dispatch(UserInput::Action(UserAction::ConfirmPost)).await,
            "cancel" => self.dispatch(UserInput::Action(UserAction::CancelPost)).await,
            "comment" => {
                if tokens.len() < 2 {
                    println!("Usage: comment <post_id>");
                    return Ok(LoopAction::Continue);
                }
                self.dispatch(UserInput::Action(UserAction::WriteComment {
                    post_id: tokens[1].clone(),
                }))
                .await
            }
            "reply" => {
                if tokens.len() < 3 {
                    println!("Usage: reply <post_id> <comment_id>");
                    return Ok(LoopAction::Continue);
                }
                self.dispatch(UserInput::Action(UserAction::ReplyToComment {
                    post_id: tokens[1].clone(),
                    parent_comment_id: tokens[2].clone(),
                }))
                .await
            }
            "like" | "dislike" => {
                if tokens.len() < 2 {
                    println!("Usage: {command} <comment_id>");
                    return Ok(LoopAction::Continue);
                }
                let kind = if command == "like" {
                    ReactionKind::Like
                } else {
                    ReactionKind::Dislike
                };
                self.dispatch(UserInput::Action(UserAction::ToggleReaction {
                    comment_id: tokens[1].clone(),
                    kind,
                }))
                .await
            }
            "name" => self.dispatch(UserInput::Action(UserAction::EditName)).await,
            "tag" => {
                if tokens.len() < 2 {
                    println!("Usage: tag <value>");
                    return Ok(LoopAction::Continue);
                }
                self.dispatch(UserInput::Action(UserAction::SetDisplayTag {
                    tag: tokens[1].clone(),
                }))
                .await
            }
            "msg" => {
                if tokens.len() < 2 {
                    println!("Usage: msg <user_id>");
                    return Ok(LoopAction::Continue);
                }
                self.dispatch(UserInput::Action(UserAction::ComposeMessage {
                    target_user_id: tokens[1].clone(),
                }))
                .await
            }
            "follow" | "unfollow" | "block" | "unblock" => {
                if tokens.len() < 2 {
                    println!("Usage: {command} <user_id>");
                    return Ok(LoopAction::Continue);
                }
                let target = tokens[1].clone();
                let action = match command {
                    "follow" => UserAction::Follow { user_id: target },
                    "unfollow" => UserAction::Unfollow { user_id: target },
                    "block" => UserAction::Block { user_id: target },
                    _ => UserAction::Unblock { user_id: target },
                };
                self.dispatch(UserInput::Action(action)).await
            }
            "notifications" => {
                self.dispatch(UserInput::Action(UserAction::ToggleNotifications))
                    .await
            }
            "privacy" => {
                self.dispatch(UserInput::Action(UserAction::TogglePrivacy))
                    .await
            }
            "posts" => {
                let limit = tokens.get(1).and_then(|v| v.parse().ok()).unwrap_or(10);
                let posts = self.service.recent_posts(limit)?;
                if posts.is_empty() {
                    println!("No published posts yet");
                }
                for post in posts {
                    let total = self.service.comment_tree().count_descendants(&post.id)?;
                    println!(
                        "{} [{}] {} ({} comments)",
                        post.id, post.category, post.content, total
                    );
                }
                Ok(LoopAction::Continue)
            }
            "thread" => {
                if tokens.len() < 2 {
                    println!("Usage: thread <post_id> [page]");
                    return Ok(LoopAction::Continue);
                }
                let page = tokens.get(2).and_then(|v| v.parse().ok()).unwrap_or(1);
                self.print_thread(&tokens[1], None, page)?;
                Ok(LoopAction::Continue)
            }
            "replies" => {
                if tokens.len() < 3 {
                    println!("Usage: replies <post_id> <comment_id> [page]");
                    return Ok(LoopAction::Continue);
                }
                let page = tokens.get(3).and_then(|v| v.parse().ok()).unwrap_or(1);
                self.print_thread(&tokens[1], Some(&tokens[2]), page)?;
                Ok(LoopAction::Continue)
            }
            "profile" => {
                let target = tokens.get(1).cloned().unwrap_or_else(|| self.acting_user.clone());
                let profile = self.service.profiles().profile(&target)?;
                let rank = self.service.rating().rank(&target)?;
                println!(
                    "{} {} - {} followers, score {}{}",
                    profile.anonymous_name,
                    profile.display_tag,
                    profile.followers,
                    profile.score,
                    rank.map(|r| format!(", rank #{r}")).unwrap_or_default()
                );
                Ok(LoopAction::Continue)
            }
            "leaderboard" => {
                let limit = tokens.get(1).and_then(|v| v.parse().ok()).unwrap_or(10);
                for (index, entry) in self
                    .service
                    .rating()
                    .leaderboard(limit)?
                    .into_iter()
                    .enumerate()
                {
                    println!(
                        "{}. {} {} - {} contributions",
                        index + 1,
                        entry.anonymous_name,
                        entry.display_tag,
                        entry.score
                    );
                }
                Ok(LoopAction::Continue)
            }
            "inbox" => {
                let page = tokens.get(1).and_then(|v| v.parse().ok()).unwrap_or(1);
                let inbox = self
                    .service
                    .messages()
                    .inbox(&self.acting_user, page, self.page_size)?;
                println!(
                    "Inbox page {} ({} unread, {} total)",
                    inbox.page, inbox.unread, inbox.total
                );
                for entry in &inbox.entries {
                    let status = if entry.message.is_read { " " } else { "*" };
                    println!(
                        "{status} {} ({}): {}",
                        entry.sender_name, entry.message.created_at, entry.message.content
                    );
                }
                self.service.messages().mark_all_read(&self.acting_user)?;
                Ok(LoopAction::Continue)
            }
            "pending" => {
                let posts = self
                    .service
                    .moderation()
                    .list_pending(&self.acting_user, 10)?;
                if posts.is_empty() {
                    println!("No pending posts");
                }
                for post in posts {
                    println!("{} [{}] {}", post.id, post.category, post.content);
                }
                Ok(LoopAction::Continue)
            }
            "approve" | "reject" => {
                if tokens.len() < 2 {
                    println!("Usage: {command} <post_id>");
                    return Ok(LoopAction::Continue);
                }
                if command == "approve" {
                    let post = self
                        .service
                        .moderation()
                        .approve(&self.acting_user, &tokens[1])
                        .await?;
                    println!("Approved and published post {}", post.id);
                } else {
                    self.service
                        .moderation()
                        .reject(&self.acting_user, &tokens[1])
                        .await?;
                    println!("Rejected post {}", tokens[1]);
                }
                Ok(LoopAction::Continue)
            }
            "stats" => {
                let stats = self.service.moderation().stats(&self.acting_user)?;
                println!(
                    "users {} / approved {} / pending {} / comments {} / messages {}",
                    stats.users,
                    stats.approved_posts,
                    stats.pending_posts,
                    stats.comments,
                    stats.private_messages
                );
                Ok(LoopAction::Continue)
            }
            // Anything else is the acting user's free-form message.
            _ => {
                self.dispatch(UserInput::Message(IncomingMessage::text(raw)))
                    .await
            }
        }
    }

    async fn dispatch(&self, input: UserInput) -> Result<LoopAction> {
        match self
            .service
            .handle_user_input(&self.acting_user, input)
            .await
        {
            Ok(outcome) => self.print_outcome(outcome),
            Err(err) if err.is_validation() => println!("Rejected: {err}"),
            Err(err) => println!("Something went wrong, please try again ({err})"),
        }
        Ok(LoopAction::Continue)
    }

    fn print_outcome(&self, outcome: OutcomeEvent) {
        match outcome {
            OutcomeEvent::ActionArmed { pending } => {
                println!("Waiting for your next message ({pending:?})")
            }
            OutcomeEvent::DraftReady { preview } => {
                println!(
                    "Draft [{}]: {}\nType 'confirm' to submit or 'cancel' to drop it.",
                    preview.category, preview.content
                );
            }
            OutcomeEvent::PostCancelled => println!("Post cancelled"),
            OutcomeEvent::PostSubmitted { post_id } => {
                println!("Post {post_id} submitted for approval")
            }
            OutcomeEvent::CommentAdded {
                comment_id, mirror, ..
            } => println!("Comment {comment_id} added (mirror: {mirror:?})"),
            OutcomeEvent::ReactionToggled {
                comment_id, tally, ..
            } => println!(
                "Reactions on {comment_id}: {} likes / {} dislikes",
                tally.likes, tally.dislikes
            ),
            OutcomeEvent::MessageSent { message_id } => println!("Message {message_id} sent"),
            OutcomeEvent::NameUpdated { name } => println!("Name updated to {name}"),
            OutcomeEvent::TagUpdated { tag } => println!("Tag updated to {tag}"),
            OutcomeEvent::NotificationsToggled { enabled } => {
                println!("Notifications {}", if enabled { "on" } else { "off" })
            }
            OutcomeEvent::PrivacyToggled { public } => {
                println!("Profile is now {}", if public { "public" } else { "private" })
            }
            OutcomeEvent::FollowUpdated { followed } => {
                println!("{}", if followed { "Following" } else { "Unfollowed" })
            }
            OutcomeEvent::BlockUpdated { blocked } => {
                println!("{}", if blocked { "Blocked" } else { "Unblocked" })
            }
            OutcomeEvent::Unhandled => println!("Nothing pending; use a command (try 'help')"),
        }
    }

    fn print_thread(
        &self,
        post_id: &str,
        parent_comment_id: Option<&str>,
        page: usize,
    ) -> Result<()> {
        let comments = match self.service.comment_tree().list_page(
            post_id,
            parent_comment_id,
            page,
            self.page_size,
        ) {
            Ok(comments) => comments,
            Err(err @ EngineError::PostNotFound(_))
            | Err(err @ EngineError::InvalidParent { .. }) => {
                println!("Rejected: {err}");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        if comments.is_empty() {
            println!("No comments on this page");
            return Ok(());
        }
        for comment in comments {
            let tally = self.service.comment_tree().tally(&comment.id)?;
            let replies = self
                .service
                .comment_tree()
                .count_descendants_of(&comment.id)?;
            println!(
                "{} ({}): {} [+{} / -{} / {} replies]",
                comment.id,
                comment.author_id,
                comment.content,
                tally.likes,
                tally.dislikes,
                replies
            );
        }
        Ok(())
    }

    fn print_help(&self) {
        println!(
            r#"Commands:
  user <id>                     switch the acting user
  ask <category>                start a post (next line becomes the draft)
  confirm | cancel              act on the staged draft
  comment <post_id>             arm a top-level comment
  reply <post_id> <comment_id>  arm a reply (works at any depth)
  like/dislike <comment_id>     toggle a reaction
  name                          arm a name change
  tag <value>                   set the profile tag
  msg <user_id>                 arm a private message
  follow/unfollow <user_id>     follow bookkeeping
  block/unblock <user_id>       refuse private messages from a user
  notifications | privacy       toggle preferences
  posts [limit]                 recently published posts
  thread <post_id> [page]       show top-level comments (newest first)
  replies <post> <comment> [p]  show replies (oldest first)
  profile [user_id]             profile with followers and score
  leaderboard [limit]           top contributors
  inbox [page]                  private messages (marks them read)
  pending | approve | reject    moderation (admin only)
  stats                         community statistics (admin only)
  exit

Any other line is sent as your free-form message and interpreted
against your pending action."#
        );
    }
}
