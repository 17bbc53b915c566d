//! X API v2 adapters for the feed and transport contracts.
//!
//! `XFeed` polls the watched conversation through recent search and
//! `XTransport` posts replies. Everything downstream speaks the
//! platform-neutral traits in `feed` and `transport`.

pub mod client;
pub mod types;

pub use client::{XApiClient, XApiError};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::feed::{Feed, FeedError, FeedPage, Message, MessageId};
use crate::transport::{Transport, TransportError};
use types::SearchResponse;

/// Polls replies in one conversation via `GET /2/tweets/search/recent`.
pub struct XFeed {
    client: XApiClient,
    query: String,
    page_size: u32,
}

impl XFeed {
    pub fn new(client: XApiClient, conversation_id: &str, page_size: u32) -> Self {
        Self {
            client,
            query: format!("conversation_id:{conversation_id}"),
            page_size,
        }
    }
}

#[async_trait]
impl Feed for XFeed {
    async fn fetch_messages(&self, since: Option<&MessageId>) -> Result<FeedPage, FeedError> {
        let response = self
            .client
            .search_recent(&self.query, since.map(MessageId::as_str), self.page_size)
            .await
            .map_err(feed_error)?;
        Ok(page_from_response(response))
    }
}

/// Posts replies through `POST /2/tweets`.
pub struct XTransport {
    client: XApiClient,
}

impl XTransport {
    pub fn new(client: XApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for XTransport {
    async fn post_reply(&self, in_reply_to: &MessageId, text: &str) -> Result<(), TransportError> {
        self.client
            .post_tweet(text, in_reply_to.as_str())
            .await
            .map_err(|error| TransportError::Post(error.to_string()))?;
        Ok(())
    }
}

fn page_from_response(response: SearchResponse) -> FeedPage {
    let usernames: HashMap<String, String> = response
        .includes
        .map(|includes| {
            includes
                .users
                .into_iter()
                .map(|user| (user.id, user.username))
                .collect()
        })
        .unwrap_or_default();

    // Search returns newest first; the loop processes in feed order.
    let messages = response
        .data
        .into_iter()
        .rev()
        .map(|tweet| {
            let author_id = tweet.author_id.unwrap_or_default();
            let author = usernames
                .get(&author_id)
                .cloned()
                .unwrap_or_else(|| author_id.clone());
            Message {
                id: MessageId::new(tweet.id),
                author_id,
                author,
                text: tweet.text,
            }
        })
        .collect();

    FeedPage {
        messages,
        next_cursor: response
            .meta
            .and_then(|meta| meta.newest_id)
            .map(MessageId::new),
    }
}

/// Map client errors onto the loop's transient/fatal split.
fn feed_error(error: XApiError) -> FeedError {
    match error {
        XApiError::RateLimited { retry_after } => FeedError::RateLimited { retry_after },
        XApiError::Http(error) => FeedError::Disconnected(error.to_string()),
        XApiError::Api { status, message } if status == 401 || status == 403 => {
            FeedError::Auth { status, message }
        }
        XApiError::Api { status, message } if status >= 500 => {
            FeedError::Disconnected(format!("status {status}: {message}"))
        }
        XApiError::Api { status, message } => FeedError::Rejected { status, message },
        XApiError::InvalidResponse(message) => FeedError::Disconnected(message),
    }
}
