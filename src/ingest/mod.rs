//! Ingestion loop — drives messages from the feed through the registry
//! and out to the transport.
//!
//! Each pass fetches messages newer than the cursor, attempts every
//! message in feed order, and advances the cursor only once the whole
//! page has been attempted. Transient feed errors back off and refetch
//! without moving the cursor; fatal ones end the loop instance and are
//! handed to the caller's supervisor.

pub mod backoff;

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::address;
use crate::feed::{Feed, FeedError, FeedPage, Message, MessageId};
use crate::registry::{CodeStore, Registry, RegistryError};
use crate::transport::{Transport, TransportError};

/// Static knobs for one loop instance.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// The bot's own account id; its messages are never processed.
    pub bot_user_id: String,
    /// Base URL the `/referral/{code}` path is appended to.
    pub referral_base_url: String,
    /// Idle wait between successful polls.
    pub poll_interval: Duration,
}

/// What a single fetch-and-process pass did.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Page fetched and attempted; carries the number of replies posted.
    Processed { replied: usize },
    /// Transient feed error; wait this long before refetching.
    Backoff(Duration),
}

/// Failures while handling one message. Logged and contained; never
/// stops the page.
#[derive(Debug, thiserror::Error)]
enum ProcessError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct IngestLoop<F, T, S> {
    feed: F,
    transport: T,
    registry: Registry<S>,
    options: LoopOptions,
    cursor: Option<MessageId>,
    consecutive_errors: u32,
}

impl<F: Feed, T: Transport, S: CodeStore> IngestLoop<F, T, S> {
    pub fn new(feed: F, transport: T, registry: Registry<S>, options: LoopOptions) -> Self {
        Self {
            feed,
            transport,
            registry,
            options,
            cursor: None,
            consecutive_errors: 0,
        }
    }

    /// Last successfully processed message id, if any.
    pub fn cursor(&self) -> Option<&MessageId> {
        self.cursor.as_ref()
    }

    /// One fetch → process → advance-cursor pass. Never sleeps; [`run`]
    /// owns all waiting, so tests can drive passes directly.
    ///
    /// [`run`]: IngestLoop::run
    pub async fn fetch_and_process(&mut self) -> Result<Step, FeedError> {
        let page = match self.feed.fetch_messages(self.cursor.as_ref()).await {
            Ok(page) => page,
            Err(error) if error.is_transient() => {
                self.consecutive_errors += 1;
                let wait = backoff::delay_for(self.consecutive_errors);
                warn!(
                    "transient feed error ({error}), backing off {}s",
                    wait.as_secs()
                );
                return Ok(Step::Backoff(wait));
            }
            Err(error) => return Err(error),
        };

        self.consecutive_errors = 0;
        let replied = self.process_page(&page).await;

        if let Some(next) = page.next_cursor {
            debug!("cursor advanced to {next}");
            self.cursor = Some(next);
        }

        Ok(Step::Processed { replied })
    }

    /// Attempt every message in feed order. A failed message is logged
    /// and skipped; it never blocks the rest of the page.
    async fn process_page(&self, page: &FeedPage) -> usize {
        let mut replied = 0;
        for message in &page.messages {
            if message.author_id == self.options.bot_user_id {
                continue;
            }
            match self.process_message(message).await {
                Ok(true) => replied += 1,
                Ok(false) => {}
                Err(error) => {
                    warn!("message {} skipped: {error}", message.id);
                }
            }
        }
        replied
    }

    /// Returns `Ok(true)` when a reply was posted, `Ok(false)` when the
    /// message carried no valid address.
    async fn process_message(&self, message: &Message) -> Result<bool, ProcessError> {
        let Some(candidate) = address::extract_candidate(&message.text) else {
            return Ok(false);
        };
        if !address::is_valid(candidate) {
            debug!("message {}: candidate address fails checksum", message.id);
            return Ok(false);
        }

        let identity = address::normalize(candidate);
        let code = self.registry.get_or_create_code(&identity).await?;
        let text = compose_reply(&message.author, &self.options.referral_base_url, &code);
        self.transport.post_reply(&message.id, &text).await?;
        info!("replied to {} (@{})", message.id, message.author);
        Ok(true)
    }

    /// Drive the loop until shutdown or a fatal feed error.
    ///
    /// `Ok(())` means shutdown was requested. An in-flight pass always
    /// finishes first, so the cursor never runs ahead of the work.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), FeedError> {
        info!("ingestion loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let wait = match self.fetch_and_process().await? {
                Step::Processed { replied } => {
                    debug!("pass complete, {replied} replies posted");
                    self.options.poll_interval
                }
                Step::Backoff(wait) => wait,
            };

            if wait_or_shutdown(wait, &mut shutdown).await {
                break;
            }
        }
        info!("ingestion loop stopped");
        Ok(())
    }
}

/// Sleep for `wait`, returning `true` early if shutdown is requested
/// first. A dropped sender counts as shutdown.
pub async fn wait_or_shutdown(wait: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(wait) => false,
        _ = shutdown.wait_for(|stop| *stop) => true,
    }
}

/// Reply text for a registered identity.
pub fn compose_reply(author: &str, base_url: &str, code: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("@{author} Thank you! Here is your referral link: {base}/referral/{code}")
}
