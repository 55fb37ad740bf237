#![forbid(unsafe_code)]

//! Per-video guards evaluated before any comment is fetched.
//!
//! Both guards only ever decide "skip and move on": a video whose title is
//! already collected, and a video too young for its engagement counts to have
//! settled.

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde::Deserialize;

use crate::collection::Collection;

pub const DEFAULT_MIN_AGE_DAYS: i64 = 14;

/// `[filter]` table of the tuning file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSettings {
    pub min_age_days: i64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_age_days: DEFAULT_MIN_AGE_DAYS,
        }
    }
}

impl FilterSettings {
    /// Publish cutoff for a run starting at `now`. `None` when
    /// `min_age_days` reaches past the representable range.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        TimeDelta::try_days(self.min_age_days.max(0)).and_then(|age| now.checked_sub_signed(age))
    }
}

/// The two instants a run is measured against: when it scraped, and the
/// publish cutoff after which videos are left for a later run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeWindow {
    pub scraped_at: DateTime<Utc>,
    pub older_than: DateTime<Utc>,
}

impl ScrapeWindow {
    pub fn starting_at(scraped_at: DateTime<Utc>, settings: &FilterSettings) -> Self {
        Self {
            scraped_at,
            older_than: settings
                .cutoff(scraped_at)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn now(settings: &FilterSettings) -> Self {
        Self::starting_at(Utc::now(), settings)
    }
}

/// Why a video was skipped rather than scraped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyCollected { title: String },
    TooRecent { published_at: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyCollected { title } => write!(f, "already collected as {title:?}"),
            SkipReason::TooRecent { published_at } => {
                write!(f, "published {published_at}, not old enough yet")
            }
        }
    }
}

pub fn is_already_collected(collection: &Collection, title: &str) -> bool {
    collection.contains_title(title)
}

pub fn is_too_recent(published_at: DateTime<FixedOffset>, window: &ScrapeWindow) -> bool {
    published_at.with_timezone(&Utc) > window.older_than
}

/// Applies both guards, dedup first.
pub fn skip_reason(
    collection: &Collection,
    title: &str,
    published_at: DateTime<FixedOffset>,
    raw_published_at: &str,
    window: &ScrapeWindow,
) -> Option<SkipReason> {
    if is_already_collected(collection, title) {
        return Some(SkipReason::AlreadyCollected {
            title: title.to_owned(),
        });
    }
    if is_too_recent(published_at, window) {
        return Some(SkipReason::TooRecent {
            published_at: raw_published_at.to_owned(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::tests::sample_entry;
    use chrono::TimeZone;

    fn window() -> ScrapeWindow {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        ScrapeWindow::starting_at(now, &FilterSettings::default())
    }

    fn ts(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    #[test]
    fn cutoff_is_two_weeks_before_start() {
        let window = window();
        assert_eq!(
            window.older_than,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn oversized_min_age_does_not_overflow() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let settings = FilterSettings {
            min_age_days: 99_999_999_999,
        };
        assert_eq!(settings.cutoff(now), None);
        let window = ScrapeWindow::starting_at(now, &settings);
        assert_eq!(window.older_than, DateTime::<Utc>::MIN_UTC);
        assert!(is_too_recent(ts("1990-01-01T00:00:00Z"), &window));
    }

    #[test]
    fn recent_videos_are_skipped() {
        let window = window();
        assert!(is_too_recent(ts("2024-03-10T00:00:00Z"), &window));
        assert!(!is_too_recent(ts("2024-02-01T00:00:00Z"), &window));
        assert!(!is_too_recent(ts("2024-03-01T12:00:00Z"), &window));
    }

    #[test]
    fn offsets_are_compared_in_utc() {
        let window = window();
        // 2024-03-01T13:00+02:00 is 11:00 UTC, before the cutoff.
        assert!(!is_too_recent(ts("2024-03-01T13:00:00+02:00"), &window));
    }

    #[test]
    fn dedup_wins_over_recency() {
        let mut collection = Collection::new();
        collection.insert_new(sample_entry("Known", "v1"));
        let reason = skip_reason(
            &collection,
            "Known",
            ts("2024-03-14T00:00:00Z"),
            "2024-03-14T00:00:00Z",
            &window(),
        );
        assert_eq!(
            reason,
            Some(SkipReason::AlreadyCollected {
                title: "Known".into()
            })
        );
        assert!(
            skip_reason(
                &collection,
                "Fresh title",
                ts("2020-01-01T00:00:00Z"),
                "2020-01-01T00:00:00Z",
                &window()
            )
            .is_none()
        );
    }
}
