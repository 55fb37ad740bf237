#![forbid(unsafe_code)]

//! Builds one collection entry per video out of three remote resources: the
//! video lookup, its comment threads and the replies of every thread.

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{
    CommentItem, CommentSnippet, CommentThreadItem, Counter, Page, Resource, ResourceApi,
    VideoDetails, decode,
};
use crate::collection::{
    Collection, CollectionEntry, Comment, CommentRecord, MetadataTuple, watch_url,
};
use crate::error::{FetchError, ItemError};
use crate::filter::{ScrapeWindow, SkipReason, skip_reason};
use crate::paging::{PagingSettings, WalkEnd, WalkOptions, walk_pages};
use crate::retry::RetryPolicy;

/// What happened to one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Added {
        title: String,
        threads: usize,
        comments: usize,
    },
    Skipped(SkipReason),
}

impl From<CommentSnippet> for Comment {
    fn from(snippet: CommentSnippet) -> Self {
        Comment {
            author: snippet.author_display_name,
            published_at: snippet.published_at,
            like_count: snippet.like_count,
            text: snippet.text_display,
        }
    }
}

pub struct Aggregator<'a, A> {
    api: &'a A,
    policy: &'a RetryPolicy,
    paging: &'a PagingSettings,
}

impl<'a, A: ResourceApi> Aggregator<'a, A> {
    pub fn new(api: &'a A, policy: &'a RetryPolicy, paging: &'a PagingSettings) -> Self {
        Self {
            api,
            policy,
            paging,
        }
    }

    /// Scrapes `video_id` into `collection` unless one of the filter guards
    /// rejects it. Nothing is persisted here.
    pub fn add_video(
        &self,
        collection: &mut Collection,
        video_id: &str,
        window: &ScrapeWindow,
    ) -> Result<ItemOutcome, ItemError> {
        let video = self.video_details(video_id)?;
        let snippet = &video.snippet;
        let published_at =
            DateTime::parse_from_rfc3339(&snippet.published_at).map_err(|err| ItemError::Lookup {
                video_id: video_id.to_owned(),
                reason: format!("unreadable publish time {:?}: {err}", snippet.published_at),
            })?;

        if let Some(reason) = skip_reason(
            collection,
            &snippet.title,
            published_at,
            &snippet.published_at,
            window,
        ) {
            info!(%video_id, %reason, "skipping video");
            return Ok(ItemOutcome::Skipped(reason));
        }

        let threads = self.comment_threads(video_id)?;
        let mut comments = Vec::with_capacity(threads.len());
        for thread in threads {
            comments.push(self.comment_record(video_id, thread)?);
        }

        let entry = CollectionEntry {
            title: snippet.title.clone(),
            url: watch_url(video_id),
            comments,
            metadata: metadata_tuple(&video, window),
        };
        let collected = entry.comment_total();
        let threads = entry.comments.len();
        if let Some(reported) = video.statistics.comment_count.as_ref().map(Counter::value)
            && reported != collected as u64
        {
            warn!(
                %video_id,
                collected,
                reported,
                "collected comment count differs from the reported total"
            );
        }

        let title = entry.title.clone();
        collection.insert_new(entry);
        info!(%video_id, %title, threads, comments = collected, "video scraped");
        Ok(ItemOutcome::Added {
            title,
            threads,
            comments: collected,
        })
    }

    fn video_details(&self, video_id: &str) -> Result<VideoDetails, ItemError> {
        let raw = self
            .api
            .get_by_id(Resource::Videos, video_id)
            .map_err(|err| ItemError::from_fetch(video_id, "video lookup", err))?;
        let Some(raw) = raw else {
            return Err(ItemError::Lookup {
                video_id: video_id.to_owned(),
                reason: "video not found".into(),
            });
        };
        decode(raw).map_err(|err| ItemError::from_fetch(video_id, "video lookup", err))
    }

    fn comment_threads(&self, video_id: &str) -> Result<Vec<CommentThreadItem>, ItemError> {
        let what = format!("comment threads of {video_id}");
        let filter = [("videoId", video_id), ("order", "relevance")];
        let walk = walk_pages(
            &what,
            self.policy,
            WalkOptions::uncapped(self.paging.comment_page_size),
            |token, size| {
                self.api
                    .list_page(Resource::CommentThreads, &filter, token, size)
                    .map(|page| decode_items::<CommentThreadItem>(page, &what))
            },
        )
        .map_err(|err| ItemError::from_walk(video_id, err))?;
        if let WalkEnd::Truncated { attempts, error } = &walk.end {
            warn!(%video_id, attempts, %error, kept = walk.items.len(), "comment threads truncated");
        }
        Ok(walk.items)
    }

    /// Top-level comment plus every reply. A reply list whose first page
    /// fails leaves the thread without replies unless the failure halts the
    /// run.
    fn comment_record(
        &self,
        video_id: &str,
        thread: CommentThreadItem,
    ) -> Result<CommentRecord, ItemError> {
        let CommentThreadItem { id, snippet } = thread;
        let original = Comment::from(snippet.top_level_comment.snippet);
        if snippet.total_reply_count == Some(0) {
            return Ok(CommentRecord {
                original,
                replies: Vec::new(),
            });
        }

        let what = format!("replies to {id}");
        let filter = [("parentId", id.as_str())];
        let walk = walk_pages(
            &what,
            self.policy,
            WalkOptions::uncapped(self.paging.reply_page_size),
            |token, size| {
                self.api
                    .list_page(Resource::Comments, &filter, token, size)
                    .map(|page| decode_items::<CommentItem>(page, &what))
            },
        );
        let replies = match walk {
            Ok(walk) => {
                debug!(thread = %id, replies = walk.items.len(), pages = walk.pages, "replies collected");
                walk.items
                    .into_iter()
                    .map(|item| Comment::from(item.snippet))
                    .collect()
            }
            Err(err) if err.source.halts_run() => return Err(ItemError::from_walk(video_id, err)),
            Err(err) => {
                warn!(%video_id, thread = %id, error = %err, "keeping thread without replies");
                Vec::new()
            }
        };
        Ok(CommentRecord { original, replies })
    }
}

fn metadata_tuple(video: &VideoDetails, window: &ScrapeWindow) -> MetadataTuple {
    let stats = &video.statistics;
    MetadataTuple {
        published_at: video.snippet.published_at.clone(),
        channel_title: video.snippet.channel_title.clone(),
        duration: video.content_details.duration.clone(),
        view_count: stats.view_count.value(),
        like_count: stats.like_count.value(),
        dislike_count: stats.dislike_count.value(),
        favorite_count: stats.favorite_count.value(),
        scraped_at: window.scraped_at,
    }
}

/// Decodes every item of a page, dropping (and logging) the malformed ones.
pub(crate) fn decode_items<T: DeserializeOwned>(page: Page<Value>, what: &str) -> Page<T> {
    page.filter_map(|raw| {
        decode(raw)
            .map_err(|err: FetchError| warn!(%what, error = %err, "dropping malformed item"))
            .ok()
    })
}
