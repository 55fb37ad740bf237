#![forbid(unsafe_code)]

//! Blocking YouTube Data API v3 client behind [`ResourceApi`].

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::api::{Filter, Page, Resource, ResourceApi};
use crate::error::FetchError;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// `[http]` table of the tuning file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    AccessToken(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(..)"),
            Credentials::AccessToken(_) => f.write_str("AccessToken(..)"),
        }
    }
}

/// `part` requested for each resource.
fn part_for(resource: Resource) -> &'static str {
    match resource {
        Resource::Videos => "snippet,statistics,contentDetails",
        Resource::Channels | Resource::PlaylistItems => "contentDetails",
        Resource::Playlists | Resource::CommentThreads | Resource::Comments => "snippet",
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<Value>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

/// Turns a non-2xx answer into a [`FetchError::Status`], keeping the API's
/// error reason when the body carries one.
fn status_error(status: u16, body: &str) -> FetchError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => FetchError::Status {
            status,
            reason: envelope
                .error
                .errors
                .into_iter()
                .find_map(|detail| detail.reason),
            message: envelope.error.message,
        },
        Err(_) => FetchError::Status {
            status,
            reason: None,
            message: body.chars().take(200).collect(),
        },
    }
}

pub struct YoutubeClient {
    agent: ureq::Agent,
    base: String,
    credentials: Credentials,
}

impl YoutubeClient {
    pub fn new(base: &str, credentials: Credentials, http: &HttpSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(http.connect_timeout_secs))
            .timeout_read(Duration::from_secs(http.read_timeout_secs))
            .user_agent(concat!("ytcomments-tools/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base: base.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn call(&self, resource: Resource, params: &[Filter<'_>]) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base, resource.path());
        let mut request = self
            .agent
            .get(&url)
            .query("part", part_for(resource));
        for (key, value) in params {
            request = request.query(key, value);
        }
        request = match &self.credentials {
            Credentials::ApiKey(key) => request.query("key", key),
            Credentials::AccessToken(token) => {
                request.set("Authorization", &format!("Bearer {token}"))
            }
        };
        debug!(resource = resource.path(), ?params, "api request");

        match request.call() {
            Ok(response) => response
                .into_json::<Value>()
                .map_err(|err| FetchError::Decode(err.to_string())),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(status_error(status, &body))
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(FetchError::Transport(transport.to_string()))
            }
        }
    }
}

impl ResourceApi for YoutubeClient {
    fn list_page(
        &self,
        resource: Resource,
        filter: &[Filter<'_>],
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<Value>, FetchError> {
        let max_results = page_size.to_string();
        let mut params: Vec<Filter<'_>> = filter.to_vec();
        params.push(("maxResults", max_results.as_str()));
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let body = self.call(resource, &params)?;
        let list: ListResponse =
            serde_json::from_value(body).map_err(|err| FetchError::Decode(err.to_string()))?;
        Ok(Page {
            items: list.items,
            next_page_token: list.next_page_token.filter(|token| !token.is_empty()),
        })
    }

    fn get_by_id(&self, resource: Resource, id: &str) -> Result<Option<Value>, FetchError> {
        let body = self.call(resource, &[("id", id)])?;
        let list: ListResponse =
            serde_json::from_value(body).map_err(|err| FetchError::Decode(err.to_string()))?;
        Ok(list.items.into_iter().next())
    }
}
