use std::time::Duration;

use reqwest::{Client, Method, Proxy, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{
    ApiErrorBody, Category, EntryResultSet, EntryStatus, Feed, UpdateEntriesRequest, User,
};
use super::request::EntriesRequest;
use crate::config::AppConfig;
use crate::{Error, Result};

const INITIAL_RETRY_DELAY_MS: u64 = 500;
const USER_AGENT: &str = concat!("miniflush/", env!("CARGO_PKG_VERSION"));

/// Operations the sweeper needs from a reader service
#[async_trait::async_trait]
pub trait ReaderApi: Send + Sync {
    /// The authenticated user, used to verify credentials
    async fn me(&self) -> Result<User>;

    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn list_feeds(&self) -> Result<Vec<Feed>>;

    /// One page of entries matching `request`
    async fn entries(
        &self,
        request: &EntriesRequest,
        limit: u32,
        offset: u64,
    ) -> Result<EntryResultSet>;

    async fn mark_entries_read(&self, entry_ids: &[i64]) -> Result<()>;
}

/// Miniflux REST client authenticated with an API token
pub struct MinifluxClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl MinifluxClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Self::build_client(config)?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            max_retries: config.http.max_retries.max(1),
            retry_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
        })
    }

    /// Build HTTP client with auth header, timeout and optional proxy
    fn build_client(config: &AppConfig) -> Result<Client> {
        let mut builder = Client::builder()
            .default_headers(config.auth_headers()?)
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .gzip(true);

        if let Some(ref proxy) = config.http.proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::InvalidConfig(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for Miniflux requests");
        }

        builder.build().map_err(Error::Http)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send with exponential backoff on transport errors and 429/502/503/504
    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = None;
        let mut delay = self.retry_delay;

        for attempt in 0..self.max_retries {
            let last_attempt = attempt + 1 == self.max_retries;

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if is_retryable(status) && !last_attempt {
                        tracing::warn!(
                            "Received {} from {}, retrying after {}ms...",
                            status,
                            response.url(),
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                        continue;
                    }
                    return check_status(response).await;
                }
                Err(e) => {
                    tracing::warn!("Request failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(Error::Http(e));
                }
            }

            if !last_attempt {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Api {
            status: 0,
            reason: format!("request failed after {} attempts", self.max_retries),
        }))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        tracing::debug!("Calling {} with {:?}", url, query);
        let response = self
            .send_with_retry(|| self.client.request(Method::GET, url).query(query))
            .await?;
        Ok(response.json().await?)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Turn a non-2xx response into `Error::Api`, preferring the server's
/// `error_message`
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        reason: error_reason(status, &body),
    })
}

fn error_reason(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error_message)
        .unwrap_or_else(|| format!("status_code={}", status.as_u16()))
}

#[async_trait::async_trait]
impl ReaderApi for MinifluxClient {
    async fn me(&self) -> Result<User> {
        self.get_json(&self.url("v1/me"), &[]).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.get_json(&self.url("v1/categories"), &[]).await
    }

    async fn list_feeds(&self) -> Result<Vec<Feed>> {
        self.get_json(&self.url("v1/feeds"), &[]).await
    }

    async fn entries(
        &self,
        request: &EntriesRequest,
        limit: u32,
        offset: u64,
    ) -> Result<EntryResultSet> {
        self.get_json(&request.endpoint, &request.page(limit, offset)).await
    }

    async fn mark_entries_read(&self, entry_ids: &[i64]) -> Result<()> {
        if entry_ids.is_empty() {
            return Ok(());
        }

        let url = self.url("v1/entries");
        let body = UpdateEntriesRequest {
            entry_ids,
            status: EntryStatus::Read,
        };

        tracing::debug!("Marking {} entries as read", entry_ids.len());
        self.send_with_retry(|| self.client.request(Method::PUT, &url).json(&body))
            .await?;
        Ok(())
    }
}
