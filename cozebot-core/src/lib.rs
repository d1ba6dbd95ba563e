//! # cozebot-core
//!
//! Core types and traits for the reply pipeline: [`Reply`], [`Decorator`],
//! [`Channel`], session context, and tracing initialization.
//! Transport-agnostic; used by decorator-chain and link-decorators.

pub mod channel;
pub mod error;
pub mod logger;
pub mod types;

pub use channel::{Channel, LogChannel};
pub use error::{CozebotError, DecoratorError, Result};
pub use logger::init_tracing;
pub use types::{Decorator, EventAction, Reply, ReplyEvent, ReplyKind, SessionContext};
