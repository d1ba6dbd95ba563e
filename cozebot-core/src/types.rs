//! Core types: reply, session context, reply event, and the Decorator trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind tag on an outgoing reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyKind {
    /// Plain text; the only kind decorators rewrite.
    Text,
    /// An image referenced by URL; the channel downloads and delivers it.
    ImageUrl,
}

/// A single outgoing reply: a kind tag plus its content (text or URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub kind: ReplyKind,
    pub content: String,
}

impl Reply {
    /// Creates a text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Text,
            content: content.into(),
        }
    }

    /// Creates an image reply referenced by URL.
    pub fn image_url(url: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::ImageUrl,
            content: url.into(),
        }
    }
}

/// Delivery context handed to [`Channel::send`]: where the reply goes.
///
/// [`Channel::send`]: crate::channel::Channel::send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    /// Transport-specific receiver id (user or group).
    pub receiver: String,
    pub is_group: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionContext {
    /// Creates a direct (non-group) session created now.
    pub fn direct(session_id: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            receiver: receiver.into(),
            is_group: false,
            created_at: Utc::now(),
        }
    }
}

/// Chain control flag a decorator leaves on the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Later decorators in the chain still run.
    Continue,
    /// Skip the rest of the chain; the reply is delivered as-is.
    BreakPass,
}

/// The "reply about to be sent" event. Decorators mutate `reply` in place or
/// install a brand-new reply, and set `action` to steer the chain.
#[derive(Debug, Clone)]
pub struct ReplyEvent {
    pub reply: Reply,
    pub action: EventAction,
}

impl ReplyEvent {
    /// Wraps a reply with the default `Continue` action.
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            action: EventAction::Continue,
        }
    }
}

/// Decorate-reply extension point: invoked once per outgoing reply, before
/// delivery. Implementations may emit derived replies through the channel
/// (e.g. extracted images) and rewrite the event's reply text.
#[async_trait]
pub trait Decorator: Send + Sync {
    async fn decorate(
        &self,
        event: &mut ReplyEvent,
        channel: &dyn crate::channel::Channel,
        session: &SessionContext,
    ) -> crate::error::Result<()>;
}
