//! Channel abstraction for delivering replies.
//!
//! [`Channel`] is transport-agnostic; the host plugs in its messaging
//! transport (WeChat bridge, Telegram, ...). [`LogChannel`] only logs,
//! for local wiring and tests.

use crate::error::Result;
use crate::types::{Reply, SessionContext};
use async_trait::async_trait;
use tracing::info;

/// Abstraction for delivering one reply immediately. Decorators treat a send
/// as fire-and-forget; the return value is consulted only for logging.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Delivers one reply to the session's receiver.
    async fn send(&self, reply: Reply, session: &SessionContext) -> Result<()>;
}

/// Channel that logs sends instead of delivering them.
pub struct LogChannel;

#[async_trait]
impl Channel for LogChannel {
    async fn send(&self, reply: Reply, session: &SessionContext) -> Result<()> {
        info!(
            receiver = %session.receiver,
            kind = ?reply.kind,
            content = %reply.content,
            "LogChannel send"
        );
        Ok(())
    }
}
