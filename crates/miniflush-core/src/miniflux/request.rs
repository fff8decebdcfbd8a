use url::Url;

use crate::config::TargetKind;
use crate::{Error, Result};

/// Fixed filter for every entries query: oldest unread first
pub const BASE_PARAMS: [(&str, &str); 3] = [
    ("direction", "asc"),
    ("order", "published_at"),
    ("status", "unread"),
];

/// A filtered entries query against one category or feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntriesRequest {
    pub endpoint: String,
    pub params: Vec<(&'static str, String)>,
}

impl EntriesRequest {
    /// `{base_url}/v1/{categories|feeds}/{target}/entries` with the base
    /// filter and `before=<unix timestamp>`. `target` is percent-encoded as a
    /// single path segment.
    pub fn new(base_url: &str, kind: TargetKind, target: &str, before: &str) -> Result<Self> {
        let mut url = Url::parse(base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig(format!("'{}' cannot be a base URL", base_url)))?
            .pop_if_empty()
            .extend(["v1", kind.path_segment(), target, "entries"]);

        let mut params: Vec<(&'static str, String)> = BASE_PARAMS
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect();
        params.push(("before", before.to_string()));

        Ok(Self {
            endpoint: url.to_string(),
            params,
        })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Query parameters for one page
    pub fn page(&self, limit: u32, offset: u64) -> Vec<(&'static str, String)> {
        let mut params = self.params.clone();
        params.push(("limit", limit.to_string()));
        params.push(("offset", offset.to_string()));
        params
    }
}
