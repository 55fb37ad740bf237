#![forbid(unsafe_code)]

//! Per-channel progress that lets a long channel scrape span many sessions.
//!
//! The checkpoint stores the id of the last finished video, never a list
//! offset: uploads prepend between runs, so the resume position is recomputed
//! against the list fetched by the current run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::StateDriftError;

/// Blob name of the channel-state map.
pub const SCRAPED_CHANNELS: &str = "scraped_channels";

/// `[checkpoint]` table. `every = 0` saves only when the run ends.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckpointSettings {
    pub every: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Progress {
    InProgress { last_completed: Option<String> },
    /// The whole list, as fetched by the run that set this, was walked.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelScrapeState {
    pub channel_id: String,
    pub category: String,
    /// Blob name of the collection this channel feeds.
    pub save_name: String,
    pub progress: Progress,
    #[serde(default)]
    pub scrape_dates: Vec<NaiveDate>,
}

impl ChannelScrapeState {
    pub fn new(channel_id: &str, category: &str, save_name: &str) -> Self {
        Self {
            channel_id: channel_id.to_owned(),
            category: category.to_owned(),
            save_name: save_name.to_owned(),
            progress: Progress::InProgress {
                last_completed: None,
            },
            scrape_dates: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.progress, Progress::Complete)
    }

    pub fn last_completed(&self) -> Option<&str> {
        match &self.progress {
            Progress::InProgress { last_completed } => last_completed.as_deref(),
            Progress::Complete => None,
        }
    }

    pub fn mark_processed(&mut self, video_id: &str) {
        self.progress = Progress::InProgress {
            last_completed: Some(video_id.to_owned()),
        };
    }

    pub fn mark_complete(&mut self) {
        self.progress = Progress::Complete;
    }

    /// Forgets the position so the next walk starts from the top.
    pub fn restart(&mut self) {
        self.progress = Progress::InProgress {
            last_completed: None,
        };
    }

    /// Adds `date` unless it is already recorded. Returns whether it was new.
    pub fn record_scrape_date(&mut self, date: NaiveDate) -> bool {
        if self.scrape_dates.contains(&date) {
            return false;
        }
        self.scrape_dates.push(date);
        true
    }

    /// Index in `videos` of the first video still to process.
    pub fn resume_position(&self, videos: &[String]) -> Result<usize, StateDriftError> {
        let Some(last) = self.last_completed() else {
            return Ok(0);
        };
        videos
            .iter()
            .position(|id| id == last)
            .map(|index| index + 1)
            .ok_or_else(|| StateDriftError {
                channel_id: self.channel_id.clone(),
                last_completed: last.to_owned(),
                list_len: videos.len(),
            })
    }
}

/// Channel id to state, persisted as the `scraped_channels` blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScrapedChannels {
    channels: BTreeMap<String, ChannelScrapeState>,
}

impl ScrapedChannels {
    pub fn get(&self, channel_id: &str) -> Option<&ChannelScrapeState> {
        self.channels.get(channel_id)
    }

    pub fn insert(&mut self, state: ChannelScrapeState) {
        self.channels.insert(state.channel_id.clone(), state);
    }
}
