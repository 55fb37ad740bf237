#![forbid(unsafe_code)]

//! The remote resource contract and typed views over its JSON items.
//!
//! Everything the traversal engine needs from the remote service goes through
//! [`ResourceApi`]: one paginated list call and one single-item lookup. The
//! engine never holds a global client; the capability object is passed in,
//! which is what lets tests swap in a scripted double.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::FetchError;

/// Remote resource families the traversal touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Videos,
    Channels,
    Playlists,
    PlaylistItems,
    CommentThreads,
    Comments,
}

impl Resource {
    /// Path segment of the resource under the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Resource::Videos => "videos",
            Resource::Channels => "channels",
            Resource::Playlists => "playlists",
            Resource::PlaylistItems => "playlistItems",
            Resource::CommentThreads => "commentThreads",
            Resource::Comments => "comments",
        }
    }
}

/// Filter parameter for a list call, e.g. `("videoId", "abc")`.
pub type Filter<'a> = (&'a str, &'a str);

/// One page of a cursor-paginated list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_page_token: self.next_page_token,
        }
    }

    /// Converts every item, dropping the ones `f` rejects.
    pub fn filter_map<U>(self, f: impl FnMut(T) -> Option<U>) -> Page<U> {
        Page {
            items: self.items.into_iter().filter_map(f).collect(),
            next_page_token: self.next_page_token,
        }
    }
}

/// Capability object for the remote service.
pub trait ResourceApi {
    /// Fetches one page of `resource` matching `filter`.
    fn list_page(
        &self,
        resource: Resource,
        filter: &[Filter<'_>],
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<Value>, FetchError>;

    /// Looks up a single item by id. `Ok(None)` means the service answered
    /// but has no such item.
    fn get_by_id(&self, resource: Resource, id: &str) -> Result<Option<Value>, FetchError>;
}

impl<A: ResourceApi + ?Sized> ResourceApi for &A {
    fn list_page(
        &self,
        resource: Resource,
        filter: &[Filter<'_>],
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<Value>, FetchError> {
        (**self).list_page(resource, filter, page_token, page_size)
    }

    fn get_by_id(&self, resource: Resource, id: &str) -> Result<Option<Value>, FetchError> {
        (**self).get_by_id(resource, id)
    }
}

/// Decodes a raw item into one of the typed views below.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, FetchError> {
    serde_json::from_value(value).map_err(|err| FetchError::Decode(err.to_string()))
}

/// Counters arrive as decimal strings (`"1234"`), sometimes as numbers, and
/// are left out entirely when the owner hides them.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(untagged)]
pub enum Counter {
    Text(String),
    Number(u64),
    #[default]
    Absent,
}

impl Counter {
    pub fn value(&self) -> u64 {
        match self {
            Counter::Text(text) => text.trim().parse().unwrap_or(0),
            Counter::Number(value) => *value,
            Counter::Absent => 0,
        }
    }
}

/// `videos` item with `snippet,statistics,contentDetails`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub id: String,
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: VideoStatistics,
    #[serde(default)]
    pub content_details: VideoContentDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub published_at: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    #[serde(default)]
    pub view_count: Counter,
    #[serde(default)]
    pub like_count: Counter,
    #[serde(default)]
    pub dislike_count: Counter,
    #[serde(default)]
    pub favorite_count: Counter,
    #[serde(default)]
    pub comment_count: Option<Counter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoContentDetails {
    #[serde(default)]
    pub duration: String,
}

/// `channels` item with `contentDetails`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDetails {
    pub id: String,
    pub content_details: ChannelContentDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

/// `playlistItems` item with `contentDetails`. Deleted or private entries may
/// come back without a video id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    #[serde(default)]
    pub content_details: Option<PlaylistItemDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemDetails {
    pub video_id: Option<String>,
}

impl PlaylistItem {
    pub fn video_id(self) -> Option<String> {
        self.content_details?.video_id
    }
}

/// `playlists` item; only the id matters here.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
}

/// `commentThreads` item with `snippet`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadItem {
    pub id: String,
    pub snippet: CommentThreadSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadSnippet {
    pub top_level_comment: CommentItem,
    #[serde(default)]
    pub total_reply_count: Option<u64>,
}

/// `comments` item with `snippet`; also the shape of a thread's top-level
/// comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentItem {
    #[serde(default)]
    pub id: String,
    pub snippet: CommentSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnippet {
    #[serde(default)]
    pub author_display_name: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub text_display: String,
}
