//! Remote blob service client.
//!
//! Speaks the REST dialect of hosted blob services such as Vercel Blob:
//!
//! - `PUT {api}/{pathname}` creates a blob (bearer token, `x-api-version`,
//!   `x-add-random-suffix: 0`, `x-allow-overwrite`, `x-content-type`)
//! - `GET {api}?prefix=..&limit=..&cursor=..` lists blobs page by page
//! - `POST {api}/delete` with `{"urls": [...]}` deletes a batch
//! - content is fetched from the blob's public URL
//!
//! Public blob URLs sit behind a CDN. A [`Freshness::Revalidate`] fetch sends
//! `no-cache` directives and appends a random query parameter so that no
//! cache layer can answer with bytes captured before a later write.

use async_trait::async_trait;
use blobver_types::BlobMeta;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderValue, AUTHORIZATION, CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{StoreError, StoreResult};
use crate::object::{Freshness, PutOptions};
use crate::traits::ObjectStore;

/// Default API endpoint.
pub const DEFAULT_API_URL: &str = "https://blob.vercel-storage.com";

/// Default value of the `x-api-version` header.
pub const DEFAULT_API_VERSION: &str = "7";

/// Default environment variable holding the read/write token.
pub const DEFAULT_TOKEN_ENV: &str = "BLOB_READ_WRITE_TOKEN";

/// Query parameter appended to revalidating fetches.
pub const CACHE_BUST_PARAM: &str = "__blobver_cb";

/// Page size requested from the list endpoint.
const LIST_PAGE_LIMIT: u32 = 1000;

/// Connection settings for [`HttpObjectStore`].
#[derive(Clone)]
pub struct HttpStoreConfig {
    pub api_url: String,
    pub api_version: String,
    pub token: String,
}

impl HttpStoreConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: token.into(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Read the token from the environment variable `var`.
    pub fn from_env(var: &str) -> StoreResult<Self> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new(token)),
            _ => Err(StoreError::MissingCredential(format!(
                "environment variable {var} is not set"
            ))),
        }
    }
}

impl std::fmt::Debug for HttpStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStoreConfig")
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Object store client for a remote blob service.
#[derive(Clone)]
pub struct HttpObjectStore {
    api_url: String,
    api_version: String,
    token: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    url: String,
    pathname: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    blobs: Vec<BlobMeta>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    urls: Vec<&'a str>,
}

impl HttpObjectStore {
    /// Build a client. Fails with [`StoreError::MissingCredential`] on an
    /// empty token.
    pub fn new(config: HttpStoreConfig) -> StoreResult<Self> {
        if config.token.trim().is_empty() {
            return Err(StoreError::MissingCredential("empty object store token".into()));
        }
        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_version: config.api_version,
            token: config.token,
            http: Client::new(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// The blob URL with a fresh cache-busting query parameter.
    fn cache_busted(url: &str) -> StoreResult<Url> {
        let mut url = Url::parse(url)
            .map_err(|e| StoreError::Serialization(format!("invalid blob url {url:?}: {e}")))?;
        let nonce = format!("{:016x}", rand::random::<u64>());
        url.query_pairs_mut().append_pair(CACHE_BUST_PARAM, &nonce);
        Ok(url)
    }

    /// Whether a rejected create-only PUT failed because the pathname is taken.
    ///
    /// The service answers with a 4xx whose message says the blob already
    /// exists; a plain 409 is accepted as well.
    fn is_name_taken(status: u16, message: &str) -> bool {
        status == StatusCode::CONFLICT.as_u16()
            || ((400..500).contains(&status) && message.to_ascii_lowercase().contains("already exists"))
    }

    async fn error_from(response: Response) -> StoreError {
        let status = response.status().as_u16();
        let message = match response.text().await {
            Ok(text) if !text.is_empty() => text,
            _ => "no response body".to_string(),
        };
        StoreError::Http { status, message }
    }

    async fn list_page(&self, prefix: &str, cursor: Option<&str>) -> StoreResult<ListPage> {
        let limit = LIST_PAGE_LIMIT.to_string();
        let mut query = vec![("prefix", prefix), ("limit", limit.as_str())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let response = self
            .http
            .get(&self.api_url)
            .header(AUTHORIZATION, self.bearer())
            .header("x-api-version", &self.api_version)
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response
            .json::<ListPage>()
            .await
            .map_err(|e| StoreError::Serialization(format!("list response: {e}")))
    }
}

impl std::fmt::Debug for HttpObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectStore")
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self, body, options), fields(bytes = body.len()))]
    async fn put(&self, pathname: &str, body: Bytes, options: &PutOptions) -> StoreResult<BlobMeta> {
        let size = body.len() as u64;
        let url = format!("{}/{}", self.api_url, pathname);
        let response = self
            .http
            .put(&url)
            .header(AUTHORIZATION, self.bearer())
            .header("x-api-version", &self.api_version)
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", if options.allow_overwrite { "1" } else { "0" })
            .header("x-content-type", &options.content_type)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(match Self::error_from(response).await {
                StoreError::Http { status, message }
                    if !options.allow_overwrite && Self::is_name_taken(status, &message) =>
                {
                    debug!(pathname, status, "blob name already taken");
                    StoreError::AlreadyExists(pathname.to_string())
                }
                other => other,
            });
        }
        let created: PutResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(format!("put response: {e}")))?;
        debug!(url = %created.url, "blob created");

        Ok(BlobMeta {
            pathname: created.pathname,
            url: created.url,
            size,
            uploaded_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobMeta>> {
        let mut blobs = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.list_page(prefix, cursor.as_deref()).await?;
            blobs.extend(page.blobs);
            match page.cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        debug!(count = blobs.len(), "listed blobs");
        Ok(blobs)
    }

    #[instrument(skip(self, blob), fields(pathname = %blob.pathname))]
    async fn fetch(&self, blob: &BlobMeta, freshness: Freshness) -> StoreResult<Bytes> {
        let request = match freshness {
            Freshness::Cached => self.http.get(&blob.url),
            Freshness::Revalidate => self
                .http
                .get(Self::cache_busted(&blob.url)?)
                .header(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"))
                .header(PRAGMA, HeaderValue::from_static("no-cache")),
        };

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(blob.pathname.clone())),
            status if status.is_success() => Ok(response.bytes().await?),
            _ => Err(Self::error_from(response).await),
        }
    }

    #[instrument(skip(self, blobs), fields(count = blobs.len()))]
    async fn delete(&self, blobs: &[BlobMeta]) -> StoreResult<()> {
        if blobs.is_empty() {
            return Ok(());
        }
        let request = DeleteRequest {
            urls: blobs.iter().map(|b| b.url.as_str()).collect(),
        };
        let response = self
            .http
            .post(format!("{}/delete", self.api_url))
            .header(AUTHORIZATION, self.bearer())
            .header("x-api-version", &self.api_version)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}
