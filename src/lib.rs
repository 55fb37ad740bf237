#![forbid(unsafe_code)]

//! Resumable YouTube comment scraping: cursor walks with bounded retry,
//! per-video aggregation of comment threads and replies, and per-channel
//! checkpoints persisted as JSON blobs.

pub mod aggregate;
pub mod api;
pub mod checkpoint;
pub mod collection;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod paging;
pub mod prompt;
pub mod retry;
pub mod run;
pub mod source;
pub mod store;
pub mod youtube;

#[cfg(test)]
mod testing;
