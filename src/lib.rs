//! Referral-code reply bot.
//!
//! Watches one conversation thread for replies carrying a checksummed
//! wallet address and answers each with a persistent, unique referral
//! link. The registry owns the identity → code mapping and stays
//! correct under concurrent callers; the ingestion loop polls the feed,
//! rides out rate limits with exponential backoff, and resumes from the
//! last processed message.

pub mod address;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod registry;
pub mod transport;
pub mod x_api;
