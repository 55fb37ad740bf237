#![forbid(unsafe_code)]

//! Producers of the video id lists the session walks: a channel's uploads, a
//! single playlist, or every playlist a channel owns.

use tracing::{info, warn};

use crate::aggregate::decode_items;
use crate::api::{
    ChannelDetails, PlaylistItem, PlaylistSummary, Resource, ResourceApi, VideoDetails, decode,
};
use crate::error::{FetchError, WalkError};
use crate::paging::{PagingSettings, WalkEnd, WalkOptions, walk_pages};
use crate::retry::RetryPolicy;

pub struct Source<'a, A> {
    api: &'a A,
    policy: &'a RetryPolicy,
    paging: &'a PagingSettings,
}

impl<'a, A: ResourceApi> Source<'a, A> {
    pub fn new(api: &'a A, policy: &'a RetryPolicy, paging: &'a PagingSettings) -> Self {
        Self {
            api,
            policy,
            paging,
        }
    }

    /// Channel that uploaded `video_id`.
    pub fn channel_id_for_video(&self, video_id: &str) -> Result<String, FetchError> {
        let raw = self
            .api
            .get_by_id(Resource::Videos, video_id)?
            .ok_or(FetchError::Missing("the seed video"))?;
        let video: VideoDetails = decode(raw)?;
        if video.snippet.channel_id.is_empty() {
            return Err(FetchError::Missing("the channel id of the seed video"));
        }
        Ok(video.snippet.channel_id)
    }

    /// Playlist holding every upload of the channel, newest first.
    pub fn uploads_playlist_for_channel(&self, channel_id: &str) -> Result<String, FetchError> {
        let raw = self
            .api
            .get_by_id(Resource::Channels, channel_id)?
            .ok_or(FetchError::Missing("the channel"))?;
        let channel: ChannelDetails = decode(raw)?;
        channel
            .content_details
            .related_playlists
            .uploads
            .ok_or(FetchError::Missing("the uploads playlist"))
    }

    /// Video ids of a playlist in playlist order, stopping after the page
    /// that reaches `cap`.
    pub fn video_ids_in_playlist(
        &self,
        playlist_id: &str,
        cap: usize,
    ) -> Result<Vec<String>, WalkError> {
        let what = format!("playlist {playlist_id}");
        let filter = [("playlistId", playlist_id)];
        let walk = walk_pages(
            &what,
            self.policy,
            WalkOptions::capped(self.paging.playlist_page_size, cap),
            |token, size| {
                self.api
                    .list_page(Resource::PlaylistItems, &filter, token, size)
                    .map(|page| {
                        decode_items::<PlaylistItem>(page, &what).filter_map(PlaylistItem::video_id)
                    })
            },
        )?;
        if let WalkEnd::Truncated { attempts, error } = &walk.end {
            warn!(%playlist_id, attempts, %error, kept = walk.items.len(), "playlist listing truncated");
        }
        info!(%playlist_id, videos = walk.items.len(), "playlist listed");
        Ok(walk.items)
    }

    pub fn playlists_for_channel(&self, channel_id: &str) -> Result<Vec<String>, WalkError> {
        let what = format!("playlists of {channel_id}");
        let filter = [("channelId", channel_id)];
        let walk = walk_pages(
            &what,
            self.policy,
            WalkOptions::uncapped(self.paging.playlist_page_size),
            |token, size| {
                self.api
                    .list_page(Resource::Playlists, &filter, token, size)
                    .map(|page| {
                        decode_items::<PlaylistSummary>(page, &what).map(|playlist| playlist.id)
                    })
            },
        )?;
        info!(%channel_id, playlists = walk.items.len(), "channel playlists listed");
        Ok(walk.items)
    }

    /// Concatenated video ids of every playlist on the channel. Stops once
    /// more than `cap` ids are gathered; a playlist that cannot be listed is
    /// skipped unless the failure halts the run.
    pub fn video_ids_from_channel_playlists(
        &self,
        channel_id: &str,
        cap: usize,
    ) -> Result<Vec<String>, WalkError> {
        let playlists = self.playlists_for_channel(channel_id)?;
        let mut ids = Vec::new();
        for playlist_id in &playlists {
            match self.video_ids_in_playlist(playlist_id, self.paging.playlist_cap) {
                Ok(found) => ids.extend(found),
                Err(err) if err.source.halts_run() => return Err(err),
                Err(err) => {
                    warn!(%playlist_id, error = %err, "skipping playlist");
                    continue;
                }
            }
            if ids.len() > cap {
                break;
            }
        }
        info!(%channel_id, videos = ids.len(), "videos gathered from channel playlists");
        Ok(ids)
    }
}
