//! Boundary to the chat transport. The engine never assumes delivery
//! succeeds; it only requires `update_control` to be idempotent and to
//! report "unchanged" distinctly from a hard failure.

use crate::database::models::MediaRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Where a message goes: the shared community channel or a single user's
/// private chat. User identifiers are opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Channel,
    User(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    pub text: String,
    pub media: Option<MediaRef>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
        }
    }
}

/// One interactive control attached to a message (rendered by the transport,
/// e.g. as an inline button). `action` is an opaque callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub label: String,
    pub action: String,
}

/// Opaque reference to a previously sent message, used to update its
/// controls later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlUpdate {
    Updated,
    /// The transport rejected the update because the controls already carry
    /// the same content. Callers treat this as success.
    Unchanged,
}

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("unknown message handle: {0}")]
    UnknownHandle(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(
        &self,
        target: &Target,
        content: &MessageContent,
        controls: &[Control],
    ) -> Result<MessageHandle, MessengerError>;

    async fn update_control(
        &self,
        handle: &MessageHandle,
        controls: &[Control],
    ) -> Result<ControlUpdate, MessengerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub handle: MessageHandle,
    pub target: Target,
    pub content: MessageContent,
    pub controls: Vec<Control>,
}

/// In-memory messenger used by tests and the local CLI. Mirrors the real
/// transport's contract: handles are stable, repeated control updates with
/// identical content report `Unchanged`, and updates can be forced to fail.
#[derive(Default)]
pub struct RecordingMessenger {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    sent: Vec<SentMessage>,
    controls: HashMap<String, Vec<Control>>,
    next_id: u64,
    fail_updates: bool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `update_control` fail with a transport error.
    pub fn set_fail_updates(&self, fail: bool) {
        self.state.lock().expect("messenger state").fail_updates = fail;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().expect("messenger state").sent.clone()
    }

    pub fn controls_for(&self, handle: &MessageHandle) -> Option<Vec<Control>> {
        self.state
            .lock()
            .expect("messenger state")
            .controls
            .get(&handle.0)
            .cloned()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        target: &Target,
        content: &MessageContent,
        controls: &[Control],
    ) -> Result<MessageHandle, MessengerError> {
        let mut state = self.state.lock().expect("messenger state");
        state.next_id += 1;
        let handle = MessageHandle(format!("msg-{}", state.next_id));
        state
            .controls
            .insert(handle.0.clone(), controls.to_vec());
        state.sent.push(SentMessage {
            handle: handle.clone(),
            target: target.clone(),
            content: content.clone(),
            controls: controls.to_vec(),
        });
        Ok(handle)
    }

    async fn update_control(
        &self,
        handle: &MessageHandle,
        controls: &[Control],
    ) -> Result<ControlUpdate, MessengerError> {
        let mut state = self.state.lock().expect("messenger state");
        if state.fail_updates {
            return Err(MessengerError::Transport("update rejected".into()));
        }
        let existing = state
            .controls
            .get(&handle.0)
            .ok_or_else(|| MessengerError::UnknownHandle(handle.0.clone()))?;
        if existing.as_slice() == controls {
            return Ok(ControlUpdate::Unchanged);
        }
        state.controls.insert(handle.0.clone(), controls.to_vec());
        Ok(ControlUpdate::Updated)
    }
}
