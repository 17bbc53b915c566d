//! Transport contract — posts the composed reply back to the platform.
//!
//! A failed post is logged and forgotten: it never blocks other messages
//! in the page and never stops the loop.

use async_trait::async_trait;

use crate::feed::MessageId;

/// Errors from posting a reply. Always non-fatal to the ingestion loop.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("reply post failed: {0}")]
    Post(String),
}

/// Reply sink for the ingestion loop.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post `text` as a reply to the given message.
    async fn post_reply(&self, in_reply_to: &MessageId, text: &str) -> Result<(), TransportError>;
}
