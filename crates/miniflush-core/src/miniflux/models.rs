use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed item as returned by `/v1/.../entries`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub feed_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    pub status: EntryStatus,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Unread,
    Read,
    Removed,
}

/// One page of entries plus the server-side total for the filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryResultSet {
    pub total: u64,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub category: Option<Category>,
}

/// The authenticated user (`/v1/me`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// Body of `PUT /v1/entries`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateEntriesRequest<'a> {
    pub entry_ids: &'a [i64],
    pub status: EntryStatus,
}

/// Error body Miniflux sends with non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error_message: Option<String>,
}
