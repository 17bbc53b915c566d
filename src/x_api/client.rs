//! Raw HTTP client for the X API v2.
//!
//! No loop awareness — just makes API calls via reqwest.

use reqwest::Client;

use super::types::{PostTweetRequest, PostTweetResponse, ReplyTarget, SearchResponse};

/// Errors from X API operations.
#[derive(Debug, thiserror::Error)]
pub enum XApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Raw HTTP client for the X API v2.
#[derive(Debug, Clone)]
pub struct XApiClient {
    http: Client,
    bearer_token: String,
    base_url: String,
}

impl XApiClient {
    /// Create a client with the default base URL (https://api.twitter.com).
    pub fn new(bearer_token: String) -> Self {
        Self::with_base_url(bearer_token, "https://api.twitter.com".into())
    }

    /// Create a client with a custom base URL (for testing with mock servers).
    pub fn with_base_url(bearer_token: String, base_url: String) -> Self {
        Self {
            http: Client::new(),
            bearer_token,
            base_url,
        }
    }

    /// Fetch recent tweets matching `query`, restricted to ids newer than
    /// `since_id` when given. Authors come back via the `author_id`
    /// expansion.
    pub async fn search_recent(
        &self,
        query: &str,
        since_id: Option<&str>,
        max_results: u32,
    ) -> Result<SearchResponse, XApiError> {
        let url = format!("{}/2/tweets/search/recent", self.base_url);
        let max_results = max_results.to_string();

        let mut request = self.http.get(&url).bearer_auth(&self.bearer_token).query(&[
            ("query", query),
            ("max_results", max_results.as_str()),
            ("tweet.fields", "author_id"),
            ("expansions", "author_id"),
            ("user.fields", "username"),
        ]);
        if let Some(since_id) = since_id {
            request = request.query(&[("since_id", since_id)]);
        }

        let response = request.send().await?;
        read_json(response).await
    }

    /// Post `text` as a reply to the given tweet id.
    pub async fn post_tweet(
        &self,
        text: &str,
        in_reply_to: &str,
    ) -> Result<PostTweetResponse, XApiError> {
        let url = format!("{}/2/tweets", self.base_url);
        let body = PostTweetRequest {
            text: text.to_string(),
            reply: Some(ReplyTarget {
                in_reply_to_tweet_id: in_reply_to.to_string(),
            }),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, XApiError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(XApiError::RateLimited { retry_after });
    }

    if status >= 400 {
        let body = response.text().await.unwrap_or_else(|_| "(no body)".into());
        return Err(XApiError::Api {
            status,
            message: body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| XApiError::InvalidResponse(format!("failed to parse response: {e}")))
}
