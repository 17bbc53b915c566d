//! Wire types for the X API v2 endpoints the bot uses.
//!
//! Serde-shaped to mirror the JSON; the rest of the crate stays on its
//! own Rust-native types.

use serde::{Deserialize, Serialize};

/// Response body for `GET /2/tweets/search/recent`.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    /// Absent entirely when the query matches nothing.
    #[serde(default)]
    pub data: Vec<Tweet>,
    pub includes: Option<Includes>,
    pub meta: Option<SearchMeta>,
}

/// One tweet as returned by the search endpoint, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
}

/// Expanded objects requested alongside the tweets.
#[derive(Debug, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<User>,
}

/// Author record from the `author_id` expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// Pagination metadata for a search page.
#[derive(Debug, Deserialize)]
pub struct SearchMeta {
    pub newest_id: Option<String>,
    pub result_count: Option<u32>,
    pub next_token: Option<String>,
}

/// Request body for `POST /2/tweets`.
#[derive(Debug, Serialize)]
pub struct PostTweetRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyTarget>,
}

/// Marks the posted tweet as a reply.
#[derive(Debug, Serialize)]
pub struct ReplyTarget {
    pub in_reply_to_tweet_id: String,
}

/// Response body for `POST /2/tweets`.
#[derive(Debug, Deserialize)]
pub struct PostTweetResponse {
    pub data: Option<CreatedTweet>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedTweet {
    pub id: String,
    pub text: String,
}
