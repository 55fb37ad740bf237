#![forbid(unsafe_code)]

//! Scripted API and in-memory store used by the unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::api::{Filter, Page, Resource, ResourceApi};
use crate::error::{FetchError, StoreError};
use crate::filter::{FilterSettings, ScrapeWindow};
use crate::store::BlobStore;

pub(crate) const FAKE_CHANNEL: &str = "UCfake";

/// Window starting 2024-03-15T12:00Z with the default two-week cutoff.
pub(crate) fn fixed_window() -> ScrapeWindow {
    let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
    ScrapeWindow::starting_at(now, &FilterSettings::default())
}

#[derive(Default)]
struct Fixtures {
    videos: HashMap<String, Value>,
    channels: HashMap<String, Value>,
    threads: HashMap<String, Vec<Value>>,
    replies: HashMap<String, Vec<Value>>,
    playlist_items: HashMap<String, Vec<Value>>,
    channel_playlists: HashMap<String, Vec<Value>>,
    lookup_failures: HashMap<String, fn() -> FetchError>,
    list_failures: HashMap<String, fn() -> FetchError>,
    later_page_failures: HashMap<String, fn() -> FetchError>,
    list_calls: HashMap<Resource, usize>,
    lookups: Vec<String>,
}

type LookupHook = Box<dyn Fn(&str)>;

/// Serves fixtures through [`ResourceApi`], at most `page_limit` items per
/// page, with tokens of the form `o<offset>`.
pub(crate) struct FakeApi {
    page_limit: usize,
    fixtures: RefCell<Fixtures>,
    on_video_lookup: RefCell<Option<LookupHook>>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::with_page_limit(100)
    }

    pub(crate) fn with_page_limit(page_limit: usize) -> Self {
        Self {
            page_limit: page_limit.max(1),
            fixtures: RefCell::new(Fixtures::default()),
            on_video_lookup: RefCell::new(None),
        }
    }

    pub(crate) fn quota_error() -> FetchError {
        FetchError::Status {
            status: 403,
            reason: Some("quotaExceeded".into()),
            message: "quota".into(),
        }
    }

    pub(crate) fn comments_disabled() -> FetchError {
        FetchError::Status {
            status: 403,
            reason: Some("commentsDisabled".into()),
            message: "disabled".into(),
        }
    }

    pub(crate) fn not_found() -> FetchError {
        FetchError::Status {
            status: 404,
            reason: Some("notFound".into()),
            message: "gone".into(),
        }
    }

    pub(crate) fn add_video(&self, id: &str, title: &str, published_at: &str) {
        self.add_video_in(FAKE_CHANNEL, id, title, published_at);
    }

    pub(crate) fn add_video_in(&self, channel_id: &str, id: &str, title: &str, published_at: &str) {
        let video = json!({
            "id": id,
            "snippet": {
                "title": title,
                "publishedAt": published_at,
                "channelId": channel_id,
                "channelTitle": "Fake Channel",
            },
            "statistics": {"viewCount": "100", "likeCount": "5", "favoriteCount": "0"},
            "contentDetails": {"duration": "PT3M2S"},
        });
        self.fixtures.borrow_mut().videos.insert(id.to_owned(), video);
    }

    pub(crate) fn add_thread(&self, video_id: &str, thread_id: &str, text: &str, replies: &[&str]) {
        let comment = |id: &str, text: &str| {
            json!({
                "id": id,
                "snippet": {
                    "authorDisplayName": format!("author-{id}"),
                    "publishedAt": "2024-01-02T00:00:00Z",
                    "likeCount": 1,
                    "textDisplay": text,
                },
            })
        };
        let thread = json!({
            "id": thread_id,
            "snippet": {
                "topLevelComment": comment(thread_id, text),
                "totalReplyCount": replies.len(),
            },
        });
        let reply_items = replies
            .iter()
            .enumerate()
            .map(|(n, text)| comment(&format!("{thread_id}.{n}"), text))
            .collect();
        let mut fixtures = self.fixtures.borrow_mut();
        fixtures
            .threads
            .entry(video_id.to_owned())
            .or_default()
            .push(thread);
        fixtures.replies.insert(thread_id.to_owned(), reply_items);
    }

    /// Channel whose uploads playlist (`UU<channel>`) lists `video_ids`.
    pub(crate) fn add_uploads(&self, channel_id: &str, video_ids: &[&str]) {
        let uploads = format!("UU{channel_id}");
        let channel = json!({
            "id": channel_id,
            "contentDetails": {"relatedPlaylists": {"uploads": uploads}},
        });
        self.fixtures
            .borrow_mut()
            .channels
            .insert(channel_id.to_owned(), channel);
        self.add_playlist(None, &uploads, video_ids);
    }

    pub(crate) fn add_playlist(&self, channel_id: Option<&str>, playlist_id: &str, video_ids: &[&str]) {
        let items = video_ids
            .iter()
            .map(|id| json!({"contentDetails": {"videoId": id}}))
            .collect();
        let mut fixtures = self.fixtures.borrow_mut();
        fixtures
            .playlist_items
            .insert(playlist_id.to_owned(), items);
        if let Some(channel_id) = channel_id {
            fixtures
                .channel_playlists
                .entry(channel_id.to_owned())
                .or_default()
                .push(json!({"id": playlist_id}));
        }
    }

    pub(crate) fn fail_lookup(&self, id: &str, error: fn() -> FetchError) {
        self.fixtures
            .borrow_mut()
            .lookup_failures
            .insert(id.to_owned(), error);
    }

    /// Every list call filtered by `key` (a video, thread, playlist or
    /// channel id) fails, the first page included.
    pub(crate) fn fail_list(&self, key: &str) {
        self.fixtures
            .borrow_mut()
            .list_failures
            .insert(key.to_owned(), Self::not_found);
    }

    pub(crate) fn fail_threads(&self, video_id: &str) {
        self.fixtures
            .borrow_mut()
            .list_failures
            .insert(video_id.to_owned(), Self::comments_disabled);
    }

    /// List calls filtered by `key` serve the first page, then fail with
    /// `error` on every continuation.
    pub(crate) fn fail_after_first_page(&self, key: &str, error: fn() -> FetchError) {
        self.fixtures
            .borrow_mut()
            .later_page_failures
            .insert(key.to_owned(), error);
    }

    /// Runs `hook` with the id of every video lookup, before answering it.
    pub(crate) fn on_video_lookup(&self, hook: impl Fn(&str) + 'static) {
        *self.on_video_lookup.borrow_mut() = Some(Box::new(hook));
    }

    pub(crate) fn list_calls(&self, resource: Resource) -> usize {
        self.fixtures
            .borrow()
            .list_calls
            .get(&resource)
            .copied()
            .unwrap_or(0)
    }

    /// Ids passed to video lookups, in call order.
    pub(crate) fn video_lookups(&self) -> Vec<String> {
        self.fixtures.borrow().lookups.clone()
    }
}

fn filter_value<'a>(filter: &[Filter<'a>], key: &str) -> Option<&'a str> {
    filter
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}

impl ResourceApi for FakeApi {
    fn list_page(
        &self,
        resource: Resource,
        filter: &[Filter<'_>],
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<Value>, FetchError> {
        let mut fixtures = self.fixtures.borrow_mut();
        *fixtures.list_calls.entry(resource).or_default() += 1;
        let filter_key = match resource {
            Resource::CommentThreads => "videoId",
            Resource::Comments => "parentId",
            Resource::PlaylistItems => "playlistId",
            Resource::Playlists => "channelId",
            Resource::Videos | Resource::Channels => {
                return Err(FetchError::Missing("a list fixture"));
            }
        };
        let key = filter_value(filter, filter_key).ok_or(FetchError::Missing("a filter"))?;
        if let Some(error) = fixtures.list_failures.get(key) {
            return Err(error());
        }
        if page_token.is_some()
            && let Some(error) = fixtures.later_page_failures.get(key)
        {
            return Err(error());
        }
        let source = match resource {
            Resource::CommentThreads => &fixtures.threads,
            Resource::Comments => &fixtures.replies,
            Resource::PlaylistItems => &fixtures.playlist_items,
            _ => &fixtures.channel_playlists,
        };
        let items = source.get(key).map(Vec::as_slice).unwrap_or_default();

        let offset: usize = match page_token {
            Some(token) => token
                .strip_prefix('o')
                .and_then(|raw| raw.parse().ok())
                .ok_or(FetchError::Decode(format!("bad token {token}")))?,
            None => 0,
        };
        let size = (page_size as usize).clamp(1, self.page_limit);
        let end = (offset + size).min(items.len());
        let page_items = items.get(offset..end).unwrap_or_default().to_vec();
        Ok(Page {
            items: page_items,
            next_page_token: (end < items.len()).then(|| format!("o{end}")),
        })
    }

    fn get_by_id(&self, resource: Resource, id: &str) -> Result<Option<Value>, FetchError> {
        if resource == Resource::Videos {
            if let Some(hook) = self.on_video_lookup.borrow().as_ref() {
                hook(id);
            }
            self.fixtures.borrow_mut().lookups.push(id.to_owned());
        }
        let fixtures = self.fixtures.borrow();
        if let Some(error) = fixtures.lookup_failures.get(id) {
            return Err(error());
        }
        let found = match resource {
            Resource::Videos => fixtures.videos.get(id),
            Resource::Channels => fixtures.channels.get(id),
            _ => None,
        };
        Ok(found.cloned())
    }
}

/// Blobs kept as JSON values, with injectable save failures.
#[derive(Default)]
pub(crate) struct MemoryStore {
    blobs: RefCell<BTreeMap<String, Value>>,
    failing: RefCell<Vec<String>>,
    saves: RefCell<HashMap<String, usize>>,
}

impl MemoryStore {
    pub(crate) fn fail_saves(&self, name: &str) {
        self.failing.borrow_mut().push(name.to_owned());
    }

    pub(crate) fn save_count(&self, name: &str) -> usize {
        self.saves.borrow().get(name).copied().unwrap_or(0)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.blobs.borrow().contains_key(name)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.blobs.borrow().keys().cloned().collect()
    }
}

impl BlobStore for MemoryStore {
    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        self.blobs
            .borrow()
            .get(name)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|source| StoreError::Parse {
                path: PathBuf::from(name),
                source,
            })
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        if self.failing.borrow().iter().any(|failing| failing == name) {
            return Err(StoreError::Write {
                path: PathBuf::from(name),
                source: io::Error::other("injected failure"),
            });
        }
        let value = serde_json::to_value(value).map_err(|source| StoreError::Serialize {
            name: name.to_owned(),
            source,
        })?;
        self.blobs.borrow_mut().insert(name.to_owned(), value);
        *self.saves.borrow_mut().entry(name.to_owned()).or_default() += 1;
        Ok(())
    }
}
