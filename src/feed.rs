//! Feed contract — the message source the ingestion loop consumes.
//!
//! The loop depends on this trait, not on any concrete API client, so
//! tests drive it with scripted pages. `FeedError` splits recoverable
//! signals (back off and refetch) from fatal ones (stop and let the
//! supervisor decide).

use async_trait::async_trait;

/// Opaque message identifier, monotonically increasing upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One reply message from the watched conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    /// Account id of the author (stable, used for the self-filter).
    pub author_id: String,
    /// Author handle used when composing the reply.
    pub author: String,
    pub text: String,
}

/// A page of messages in feed order (oldest first) plus the cursor to
/// resume from. `next_cursor` is `None` when the page carried nothing new.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub messages: Vec<Message>,
    pub next_cursor: Option<MessageId>,
}

/// Errors surfaced by a feed fetch.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("feed connection lost: {0}")]
    Disconnected(String),

    #[error("feed authentication rejected (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("feed request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl FeedError {
    /// Transient errors trigger backoff-and-retry; everything else ends
    /// the loop instance and is handed to the supervisor.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::RateLimited { .. } | FeedError::Disconnected(_)
        )
    }
}

/// Message source for the ingestion loop.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Fetch messages newer than `since`, or the most recent window when
    /// no cursor exists yet. Page size is bounded by the feed itself.
    async fn fetch_messages(&self, since: Option<&MessageId>) -> Result<FeedPage, FeedError>;
}
