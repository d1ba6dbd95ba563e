//! # Link decorators for the cozebot pipeline
//!
//! This crate provides reply decorators that rewrite outgoing text: extracting
//! Coze image links into separate image replies and fixing URL rendering.

mod coze_url_decorator;

pub use coze_url_decorator::{
    rewrite_links, CozeUrlDecorator, RewriteResult, TextOutcome, COZE_URL_PRIORITY,
};
