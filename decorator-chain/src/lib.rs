//! # Decorator chain
//!
//! Runs registered reply decorators over an outgoing reply event, highest
//! priority first. A decorator that sets `BreakPass` stops the chain; the
//! reply is delivered with whatever text the decorators left on the event.

use cozebot_core::{Channel, Decorator, EventAction, ReplyEvent, Result, SessionContext};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Ordered set of reply decorators: run in descending priority, stable for
/// ties (registration order). The host registers this against its
/// decorate-reply event.
#[derive(Clone)]
pub struct DecoratorChain {
    decorators: Vec<(i32, Arc<dyn Decorator>)>,
}

impl DecoratorChain {
    /// Creates an empty chain (no decorators).
    pub fn new() -> Self {
        Self {
            decorators: Vec::new(),
        }
    }

    /// Registers a decorator with the given priority (higher runs earlier).
    pub fn add_decorator(mut self, priority: i32, decorator: Arc<dyn Decorator>) -> Self {
        self.decorators.push((priority, decorator));
        // Stable sort keeps registration order for equal priorities.
        self.decorators.sort_by_key(|(p, _)| std::cmp::Reverse(*p));
        self
    }

    /// Runs all decorators over the event; stops early on `BreakPass`.
    /// Returns the final action so the host knows whether later handlers run.
    #[instrument(skip(self, event, channel, session))]
    pub async fn decorate(
        &self,
        event: &mut ReplyEvent,
        channel: &dyn Channel,
        session: &SessionContext,
    ) -> Result<EventAction> {
        info!(
            session_id = %session.session_id,
            receiver = %session.receiver,
            reply_kind = ?event.reply.kind,
            "step: decorator_chain started"
        );

        for (priority, decorator) in &self.decorators {
            let decorator_name = std::any::type_name_of_val(decorator.as_ref());
            info!(
                session_id = %session.session_id,
                decorator = %decorator_name,
                priority = priority,
                "step: decorator processing"
            );
            decorator.decorate(event, channel, session).await?;
            debug!(
                decorator = %decorator_name,
                action = ?event.action,
                reply_len = event.reply.content.len(),
                "Decorator processed"
            );

            if event.action == EventAction::BreakPass {
                info!(
                    session_id = %session.session_id,
                    decorator = %decorator_name,
                    "step: decorator chain stopped by decorator"
                );
                break;
            }
        }

        info!(
            session_id = %session.session_id,
            action = ?event.action,
            "step: decorator_chain finished"
        );

        Ok(event.action)
    }
}

// Unit/integration tests live in tests/decorator_chain_test.rs
