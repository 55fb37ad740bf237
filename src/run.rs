#![forbid(unsafe_code)]

//! Session driver for every scrape mode.
//!
//! All modes share one item loop: check for cancellation, aggregate the
//! video, count the outcome. The channel mode wraps that loop in checkpoint
//! handling so a later session picks up after the last processed video.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use tracing::{error, info, warn};

use crate::aggregate::{Aggregator, ItemOutcome};
use crate::api::ResourceApi;
use crate::checkpoint::{ChannelScrapeState, SCRAPED_CHANNELS, ScrapedChannels};
use crate::collection::Collection;
use crate::config::Tuning;
use crate::error::ItemError;
use crate::filter::ScrapeWindow;
use crate::prompt::{Prompter, save_name};
use crate::source::Source;
use crate::store::BlobStore;

/// Shared stop flag. Only the item loop looks at it, between videos.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a channel scrape starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSeed {
    /// Any video uploaded by the channel.
    Video(String),
    Channel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Cancelled,
    Halted(String),
    AlreadyComplete,
    NothingToDo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub save_name: String,
    /// Videos this run set out to process.
    pub listed: usize,
    pub processed: usize,
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_entries: usize,
    pub last_processed: Option<String>,
    pub stop: StopReason,
}

impl RunReport {
    fn new(save_name: &str, listed: usize) -> Self {
        Self {
            save_name: save_name.to_owned(),
            listed,
            processed: 0,
            added: 0,
            skipped: 0,
            failed: 0,
            total_entries: 0,
            last_processed: None,
            stop: StopReason::NothingToDo,
        }
    }

    pub fn reached_completion(&self) -> bool {
        matches!(self.stop, StopReason::Completed | StopReason::NothingToDo)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Collected {} new videos into {} ({} in total).",
            self.added, self.save_name, self.total_entries
        )?;
        writeln!(
            f,
            "Processed {} of {} listed videos: {} skipped, {} failed.",
            self.processed, self.listed, self.skipped, self.failed
        )?;
        let last = self.last_processed.as_deref().unwrap_or("none");
        match &self.stop {
            StopReason::Completed => write!(f, "Traversal complete, last video {last}."),
            StopReason::NothingToDo => write!(f, "Traversal complete, nothing left to scrape."),
            StopReason::Cancelled => write!(f, "Stopped early: cancelled after video {last}."),
            StopReason::Halted(reason) => {
                write!(f, "Stopped early after video {last}: {reason}.")
            }
            StopReason::AlreadyComplete => {
                write!(f, "Channel was already fully scraped; nothing was scraped.")
            }
        }
    }
}

pub struct Session<A, S> {
    api: A,
    store: S,
    tuning: Tuning,
    window: ScrapeWindow,
    cancel: CancelToken,
}

impl<A: ResourceApi, S: BlobStore> Session<A, S> {
    pub fn new(api: A, store: S, tuning: Tuning, cancel: CancelToken) -> Self {
        let window = ScrapeWindow::now(&tuning.filter);
        Self {
            api,
            store,
            tuning,
            window,
            cancel,
        }
    }

    pub fn with_window(mut self, window: ScrapeWindow) -> Self {
        self.window = window;
        self
    }

    fn source(&self) -> Source<'_, A> {
        Source::new(&self.api, &self.tuning.retry, &self.tuning.paging)
    }

    /// Full channel flow: list uploads, resume from the checkpoint, scrape,
    /// then save the collection and the checkpoint in that order.
    pub fn scrape_channel(
        &self,
        seed: &ChannelSeed,
        prompter: &impl Prompter,
        restart: bool,
    ) -> Result<RunReport> {
        let source = self.source();
        let channel_id = match seed {
            ChannelSeed::Video(video_id) => source
                .channel_id_for_video(video_id)
                .with_context(|| format!("finding the channel of video {video_id}"))?,
            ChannelSeed::Channel(channel_id) => channel_id.clone(),
        };
        let uploads = source
            .uploads_playlist_for_channel(&channel_id)
            .with_context(|| format!("finding the uploads of channel {channel_id}"))?;
        let videos = source
            .video_ids_in_playlist(&uploads, self.tuning.paging.channel_cap)
            .with_context(|| format!("listing the uploads of channel {channel_id}"))?;
        info!(%channel_id, videos = videos.len(), "upload list fetched");

        let mut channels: ScrapedChannels = self
            .store
            .load(SCRAPED_CHANNELS)
            .context("loading channel state")?
            .unwrap_or_default();
        let mut state = match channels.get(&channel_id) {
            Some(existing) => {
                let mut state = existing.clone();
                info!(%channel_id, save_name = %state.save_name, "channel seen before");
                if state.is_complete() && !restart && !prompter.confirm_rescrape(&state)? {
                    let mut report = RunReport::new(&state.save_name, 0);
                    report.total_entries = self.load_collection(&state.save_name)?.len();
                    report.stop = StopReason::AlreadyComplete;
                    return Ok(report);
                }
                if state.is_complete() || restart {
                    state.restart();
                }
                state
            }
            None => {
                let category = prompter.category(&channel_id)?;
                let name = prompter.channel_name(&channel_id)?;
                ChannelScrapeState::new(&channel_id, &category, &save_name(&category, &name))
            }
        };

        let start = state.resume_position(&videos)?;
        if let Some(last) = state.last_completed() {
            info!(%channel_id, %last, remaining = videos.len() - start, "resuming after last completed video");
        }
        let mut collection = self.load_collection(&state.save_name)?;
        let remaining = &videos[start..];
        let mut report = RunReport::new(&state.save_name, remaining.len());
        let every = self.tuning.checkpoint.every;

        self.process(&mut collection, remaining, &mut report, |video_id, processed, collection| {
            state.mark_processed(video_id);
            if every > 0
                && processed % every == 0
                && let Err(err) = self.save_checkpoint(collection, &mut channels, &state)
            {
                warn!(error = %format!("{err:#}"), "periodic checkpoint failed");
            }
        });

        if report.reached_completion() {
            state.mark_complete();
        }
        state.record_scrape_date(self.window.scraped_at.date_naive());
        report.total_entries = collection.len();
        self.save_checkpoint(&collection, &mut channels, &state)?;
        Ok(report)
    }

    /// Scrapes an explicit list of videos into `save_name`. No checkpoint.
    pub fn scrape_videos(&self, video_ids: &[String], save_name: &str) -> Result<RunReport> {
        let mut collection = self.load_collection(save_name)?;
        let mut report = RunReport::new(save_name, video_ids.len());
        let every = self.tuning.checkpoint.every;

        self.process(&mut collection, video_ids, &mut report, |_, processed, collection| {
            if every > 0
                && processed % every == 0
                && let Err(err) = self.save_collection(save_name, collection)
            {
                warn!(error = %format!("{err:#}"), "periodic save failed");
            }
        });

        report.total_entries = collection.len();
        self.save_collection(save_name, &collection)?;
        Ok(report)
    }

    pub fn scrape_playlist(
        &self,
        playlist_id: &str,
        save_name: &str,
        cap: Option<usize>,
    ) -> Result<RunReport> {
        let cap = cap.unwrap_or(self.tuning.paging.playlist_cap);
        let videos = self
            .source()
            .video_ids_in_playlist(playlist_id, cap)
            .with_context(|| format!("listing playlist {playlist_id}"))?;
        self.scrape_videos(&videos, save_name)
    }

    pub fn scrape_channel_playlists(
        &self,
        channel_id: &str,
        save_name: &str,
        cap: Option<usize>,
    ) -> Result<RunReport> {
        let cap = cap.unwrap_or(self.tuning.paging.channel_playlists_cap);
        let videos = self
            .source()
            .video_ids_from_channel_playlists(channel_id, cap)
            .with_context(|| format!("listing the playlists of channel {channel_id}"))?;
        self.scrape_videos(&videos, save_name)
    }

    /// Ids of the videos already stored in a collection.
    pub fn collected_video_ids(&self, save_name: &str) -> Result<Vec<String>> {
        let Some(collection) = self
            .store
            .load::<Collection>(save_name)
            .with_context(|| format!("loading {save_name}"))?
        else {
            bail!("no collection saved as {save_name}");
        };
        Ok(collection.video_ids())
    }

    fn process(
        &self,
        collection: &mut Collection,
        videos: &[String],
        report: &mut RunReport,
        mut after_item: impl FnMut(&str, usize, &Collection),
    ) {
        if videos.is_empty() {
            report.stop = StopReason::NothingToDo;
            return;
        }
        let aggregator = Aggregator::new(&self.api, &self.tuning.retry, &self.tuning.paging);
        let total = videos.len();

        for (index, video_id) in videos.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(processed = report.processed, "cancellation requested, stopping");
                report.stop = StopReason::Cancelled;
                return;
            }
            info!("video {} out of {}: {video_id}", index + 1, total);
            match aggregator.add_video(collection, video_id, &self.window) {
                Ok(ItemOutcome::Added { .. }) => report.added += 1,
                Ok(ItemOutcome::Skipped(_)) => report.skipped += 1,
                Err(ItemError::Halt { source, .. }) => {
                    error!(%video_id, error = %source, "cannot continue");
                    report.stop = StopReason::Halted(format!("{video_id}: {source}"));
                    return;
                }
                Err(err) => {
                    warn!(error = %err, "skipping video");
                    report.failed += 1;
                }
            }
            report.processed += 1;
            report.last_processed = Some(video_id.clone());
            after_item(video_id, report.processed, collection);
        }
        report.stop = StopReason::Completed;
    }

    fn load_collection(&self, save_name: &str) -> Result<Collection> {
        Ok(self
            .store
            .load(save_name)
            .with_context(|| format!("loading {save_name}"))?
            .unwrap_or_default())
    }

    /// Saves the collection; if that fails, tries a rescue copy so the
    /// in-memory data is not lost.
    fn save_collection(&self, save_name: &str, collection: &Collection) -> Result<()> {
        let Err(err) = self.store.save(save_name, collection) else {
            return Ok(());
        };
        let rescue = format!(
            "rescue/{}_{}",
            save_name.replace('/', "_"),
            self.window.scraped_at.format("%Y%m%dT%H%M%SZ")
        );
        let context = match self.store.save(&rescue, collection) {
            Ok(()) => format!("saving {save_name}; the collection was written to {rescue} instead"),
            Err(rescue_err) => format!("saving {save_name} (rescue copy failed too: {rescue_err})"),
        };
        Err(anyhow::Error::new(err).context(context))
    }

    /// Collection first, then state. State is left alone when the
    /// collection could not be written.
    fn save_checkpoint(
        &self,
        collection: &Collection,
        channels: &mut ScrapedChannels,
        state: &ChannelScrapeState,
    ) -> Result<()> {
        self.save_collection(&state.save_name, collection)?;
        channels.insert(state.clone());
        self.store
            .save(SCRAPED_CHANNELS, channels)
            .context("saving channel state")?;
        Ok(())
    }
}
