#![forbid(unsafe_code)]

//! Error types shared by the traversal engine.
//!
//! Library seams return these typed errors so callers can tell a skippable
//! lookup failure from one that has to stop the whole run. Binary glue and
//! configuration keep using `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

/// Reasons the API reports when the daily quota is gone. Retrying or skipping
/// cannot fix those, so they halt a run instead of failing one item.
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded"];

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}{}: {message}", reason_suffix(.reason))]
    Status {
        status: u16,
        reason: Option<String>,
        message: String,
    },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("response is missing {0}")]
    Missing(&'static str),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|reason| format!(" ({reason})"))
        .unwrap_or_default()
}

impl FetchError {
    /// True when the failure is about credentials or quota rather than the
    /// request itself.
    pub fn halts_run(&self) -> bool {
        match self {
            FetchError::Status { status: 401, .. } => true,
            FetchError::Status {
                status: 403,
                reason: Some(reason),
                ..
            } => QUOTA_REASONS.contains(&reason.as_str()),
            _ => false,
        }
    }
}

/// The first page of a cursor walk could not be fetched, so there is nothing
/// to return.
#[derive(Debug, Error)]
#[error("first page of {what} failed: {source}")]
pub struct WalkError {
    pub what: String,
    #[source]
    pub source: FetchError,
}

/// Per-video failure raised by the aggregator.
#[derive(Debug, Error)]
pub enum ItemError {
    /// A required lookup failed; the video is skipped and the run continues.
    #[error("lookup failed for {video_id}: {reason}")]
    Lookup { video_id: String, reason: String },
    /// A failure no later item can avoid (bad credentials, quota).
    #[error("run halted while processing {video_id}: {source}")]
    Halt {
        video_id: String,
        #[source]
        source: FetchError,
    },
}

impl ItemError {
    pub(crate) fn from_fetch(video_id: &str, what: &str, err: FetchError) -> Self {
        if err.halts_run() {
            ItemError::Halt {
                video_id: video_id.to_owned(),
                source: err,
            }
        } else {
            ItemError::Lookup {
                video_id: video_id.to_owned(),
                reason: format!("{what}: {err}"),
            }
        }
    }

    pub(crate) fn from_walk(video_id: &str, err: WalkError) -> Self {
        let what = err.what.clone();
        Self::from_fetch(video_id, &what, err.source)
    }
}

/// The checkpoint's last completed id no longer appears in the traversal
/// list fetched for this run.
#[derive(Debug, Error)]
#[error(
    "channel {channel_id}: last completed video {last_completed} is not in the current upload list \
     ({list_len} videos); the upload order changed or the video was removed"
)]
pub struct StateDriftError {
    pub channel_id: String,
    pub last_completed: String,
    pub list_len: usize,
}

/// Persistence failure that survived local recovery.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid blob name {0:?}")]
    InvalidName(String),
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("serializing {name}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
