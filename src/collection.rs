#![forbid(unsafe_code)]

//! Records accumulated by a scrape and the collection that holds them.
//!
//! A collection maps a video title to everything scraped for that video. The
//! title doubles as the identity key: it is assumed unique within one
//! collection, which the upstream service does not guarantee. Entries are
//! written once and never updated; a later run that meets the same title
//! skips it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of the canonical watch URL stored with every entry.
pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL}{video_id}")
}

/// Author, time, likes and text of a single comment or reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub published_at: String,
    pub like_count: u64,
    pub text: String,
}

/// A top-level comment and its replies. Replies never nest further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub original: Comment,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

impl CommentRecord {
    /// Number of comments this record contributes, the original included.
    pub fn comment_count(&self) -> usize {
        1 + self.replies.len()
    }
}

/// Video-level metadata captured at scrape time. Counters the service hides
/// are stored as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTuple {
    pub published_at: String,
    pub channel_title: String,
    /// ISO-8601 duration as reported upstream, e.g. `PT4M13S`.
    pub duration: String,
    pub view_count: u64,
    pub like_count: u64,
    pub dislike_count: u64,
    pub favorite_count: u64,
    pub scraped_at: DateTime<Utc>,
}

/// Everything scraped for one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub title: String,
    pub url: String,
    pub comments: Vec<CommentRecord>,
    pub metadata: MetadataTuple,
}

impl CollectionEntry {
    /// Video id recovered from the canonical URL, when it has that shape.
    pub fn video_id(&self) -> Option<&str> {
        self.url
            .strip_prefix(WATCH_URL)
            .filter(|id| !id.is_empty())
    }

    /// Top-level comments plus replies.
    pub fn comment_total(&self) -> usize {
        self.comments.iter().map(CommentRecord::comment_count).sum()
    }
}

/// Title-keyed set of scraped videos, persisted as one blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection {
    entries: BTreeMap<String, CollectionEntry>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.entries.contains_key(title)
    }

    pub fn get(&self, title: &str) -> Option<&CollectionEntry> {
        self.entries.get(title)
    }

    /// Adds an entry unless its title is already present. Returns whether the
    /// entry was added; an existing entry is never touched.
    pub fn insert_new(&mut self, entry: CollectionEntry) -> bool {
        if self.entries.contains_key(&entry.title) {
            return false;
        }
        self.entries.insert(entry.title.clone(), entry);
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = &CollectionEntry> {
        self.entries.values()
    }

    /// Ids of every video in the collection whose URL is a watch URL.
    pub fn video_ids(&self) -> Vec<String> {
        self.entries()
            .filter_map(CollectionEntry::video_id)
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn sample_entry(title: &str, video_id: &str) -> CollectionEntry {
        let comment = |author: &str, text: &str| Comment {
            author: author.into(),
            published_at: "2020-01-02T00:00:00Z".into(),
            like_count: 1,
            text: text.into(),
        };
        CollectionEntry {
            title: title.into(),
            url: watch_url(video_id),
            comments: vec![CommentRecord {
                original: comment("alice", "first"),
                replies: vec![comment("bob", "reply")],
            }],
            metadata: MetadataTuple {
                published_at: "2020-01-01T00:00:00Z".into(),
                channel_title: "Channel".into(),
                duration: "PT1M".into(),
                view_count: 10,
                like_count: 2,
                dislike_count: 0,
                favorite_count: 0,
                scraped_at: Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap(),
            },
        }
    }

    #[test]
    fn insert_new_skips_existing_titles() {
        let mut collection = Collection::new();
        assert!(collection.insert_new(sample_entry("A", "v1")));
        let mut replacement = sample_entry("A", "v2");
        replacement.comments.clear();
        assert!(!collection.insert_new(replacement));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get("A").unwrap().url, watch_url("v1"));
    }

    #[test]
    fn video_ids_come_from_watch_urls() {
        let mut collection = Collection::new();
        collection.insert_new(sample_entry("A", "v1"));
        let mut odd = sample_entry("B", "v2");
        odd.url = "https://example.com/elsewhere".into();
        collection.insert_new(odd);
        assert_eq!(collection.video_ids(), vec!["v1".to_string()]);
    }

    #[test]
    fn comment_total_counts_replies() {
        assert_eq!(sample_entry("A", "v1").comment_total(), 2);
    }

    #[test]
    fn serializes_as_title_keyed_map() {
        let mut collection = Collection::new();
        collection.insert_new(sample_entry("A", "v1"));
        let value = serde_json::to_value(&collection).unwrap();
        assert_eq!(value["A"]["url"], watch_url("v1"));
        assert_eq!(value["A"]["metadata"]["view_count"], 10);
        let back: Collection = serde_json::from_value(value).unwrap();
        assert_eq!(back, collection);
    }
}
