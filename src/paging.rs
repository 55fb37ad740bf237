#![forbid(unsafe_code)]

//! Cursor page walker shared by every paginated traversal.
//!
//! A walk keeps asking for pages until the service stops handing out a
//! continuation token or the caller's cap is reached. The cap is checked
//! after each whole page, so the last page is never cut short. The first
//! page is fatal: later pages go through the retry policy and, if that gives
//! up, the walk ends early with what it already has. A failure that halts the
//! run is fatal on any page, since partial results would be stored as if
//! they were whole.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::Page;
use crate::error::{FetchError, WalkError};
use crate::retry::{RetryOutcome, RetryPolicy};

/// `[paging]` table: page sizes per resource and the soft caps of each
/// traversal mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagingSettings {
    pub comment_page_size: u32,
    pub reply_page_size: u32,
    pub playlist_page_size: u32,
    pub channel_cap: usize,
    pub playlist_cap: usize,
    pub channel_playlists_cap: usize,
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            comment_page_size: 100,
            reply_page_size: 100,
            playlist_page_size: 50,
            channel_cap: 750,
            playlist_cap: 200,
            channel_playlists_cap: 100,
        }
    }
}

/// Page size and optional soft cap of a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    pub page_size: u32,
    pub cap: Option<usize>,
}

impl WalkOptions {
    pub fn uncapped(page_size: u32) -> Self {
        Self {
            page_size,
            cap: None,
        }
    }

    pub fn capped(page_size: u32, cap: usize) -> Self {
        Self {
            page_size,
            cap: Some(cap),
        }
    }
}

/// Why a walk stopped.
#[derive(Debug)]
pub enum WalkEnd {
    /// The last page carried no continuation token.
    Exhausted,
    /// The accumulated item count reached the cap.
    CapReached,
    /// A later page kept failing until the retry bound ran out.
    Truncated { attempts: u32, error: FetchError },
}

/// Items gathered by a walk, in the order the pages returned them.
#[derive(Debug)]
pub struct Walk<T> {
    pub items: Vec<T>,
    pub pages: usize,
    pub end: WalkEnd,
}

/// Walks every page produced by `fetch`. `fetch` gets the continuation token
/// (none for the first page) and the page size to request.
pub fn walk_pages<T>(
    what: &str,
    policy: &RetryPolicy,
    options: WalkOptions,
    mut fetch: impl FnMut(Option<&str>, u32) -> Result<Page<T>, FetchError>,
) -> Result<Walk<T>, WalkError> {
    let first = fetch(None, options.page_size).map_err(|source| WalkError {
        what: what.to_owned(),
        source,
    })?;

    let mut items = first.items;
    let mut pages = 1usize;
    let mut next = first.next_page_token;
    let mut seen_tokens = HashSet::new();

    let end = loop {
        if options.cap.is_some_and(|cap| items.len() >= cap) {
            break WalkEnd::CapReached;
        }
        let Some(token) = next.take() else {
            break WalkEnd::Exhausted;
        };
        if !seen_tokens.insert(token.clone()) {
            warn!(%what, %token, "continuation token repeated; treating list as exhausted");
            break WalkEnd::Exhausted;
        }

        match policy.run(what, options.page_size, |size| fetch(Some(&token), size)) {
            RetryOutcome::Fetched { value: page, .. } => {
                pages += 1;
                debug!(%what, page = pages, items = page.items.len(), "page collected");
                items.extend(page.items);
                next = page.next_page_token;
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(
                    %what,
                    collected = items.len(),
                    attempts,
                    "giving up on remaining pages, continuing with partial results"
                );
                break WalkEnd::Truncated {
                    attempts,
                    error: last_error,
                };
            }
            RetryOutcome::Halted { error, .. } => {
                return Err(WalkError {
                    what: what.to_owned(),
                    source: error,
                });
            }
        }
    };

    Ok(Walk { items, pages, end })
}
