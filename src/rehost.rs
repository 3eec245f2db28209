//! Image rehoming: transient signed URLs to durable public storage.
//!
//! Source images live behind short-lived signed object-storage URLs. This
//! module copies each one into durable storage exactly once, under a
//! deterministic content-derived name, and hands back the permanent URL.
//!
//! ## Idempotence
//!
//! The blob path is a pure function of the asset name (itself a digest of
//! the source URL), so before fetching anything we ask durable storage
//! whether that path already exists. A hit short-circuits the whole
//! operation — no network fetch, no upload — which is what makes re-running
//! the compiler free. Two concurrent runs that both miss the check simply
//! upload the same bytes twice; the second write overwrites an identical
//! object, so the race is benign.
//!
//! ## Soft failure
//!
//! A fetch or upload failure for one image never aborts a compile. The
//! rehost returns `None`, the placeholder stays unmapped, and the final
//! credential sweep is responsible for making sure the still-signed source
//! URL does not leak into the artifact.
//!
//! The [`BlobStore`] and [`ImageFetcher`] traits exist so the rest of the
//! pipeline is transport-agnostic; production impls speak HTTP, tests use
//! the in-memory mocks in [`tests`].

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage rejected request: status {0}")]
    Status(u16),
    #[error("unexpected storage response: {0}")]
    BadResponse(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("fetch failed: status {0}")]
    Status(u16),
}

/// A fetched source image: raw bytes plus the content type the origin
/// reported, if any.
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// One object already present in durable storage.
#[derive(Debug, Clone)]
pub struct BlobInfo {
    pub path: String,
    pub url: String,
}

/// Durable object storage. `Sync` so per-document rehost batches can run
/// through rayon.
pub trait BlobStore: Sync {
    /// Store bytes at `path` with public-read visibility. Returns the
    /// public URL of the stored object.
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError>;

    /// List stored objects whose path starts with `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>, BlobError>;
}

/// HTTP fetcher for source image bytes.
pub trait ImageFetcher: Sync {
    fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// Content type to assume when the origin doesn't send one.
const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// File extension for the blob path, taken from the source URL's path
/// component (the part before the signed query string). Defaults to `png`.
pub fn extension_from_url(source_url: &str) -> &str {
    let path = source_url
        .split_once('?')
        .map_or(source_url, |(path, _)| path);
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some(ext @ ("png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "avif")) => ext,
        _ => "png",
    }
}

/// Deterministic storage path for a named asset: `<prefix>/<name>.<ext>`.
pub fn blob_path(prefix: &str, name: &str, source_url: &str) -> String {
    format!("{prefix}/{name}.{}", extension_from_url(source_url))
}

/// Copy one asset into durable storage, idempotently.
///
/// 1. Existence check at the deterministic path — a hit returns the
///    existing URL without touching the source.
/// 2. Fetch the source bytes; failure is soft (`None`).
/// 3. Upload with the source's content type, public-read.
pub fn rehost(
    store: &dyn BlobStore,
    fetcher: &dyn ImageFetcher,
    source_url: &str,
    name: &str,
    prefix: &str,
) -> Option<String> {
    let path = blob_path(prefix, name, source_url);

    match store.list(&path) {
        Ok(blobs) => {
            if let Some(existing) = blobs.iter().find(|b| b.path == path) {
                return Some(existing.url.clone());
            }
        }
        // A failed existence check is not fatal: fall through to the
        // fetch+upload path, which at worst overwrites an identical blob.
        Err(e) => eprintln!("warning: blob existence check failed for {path}: {e}"),
    }

    let image = match fetcher.fetch(source_url) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("warning: image fetch failed, leaving placeholder unmapped: {e}");
            return None;
        }
    };

    let content_type = image
        .content_type
        .as_deref()
        .unwrap_or(DEFAULT_CONTENT_TYPE);
    match store.put(&path, &image.bytes, content_type) {
        Ok(url) => Some(url),
        Err(e) => {
            eprintln!("warning: blob upload failed for {path}: {e}");
            None
        }
    }
}

/// Production [`ImageFetcher`] over blocking reqwest with a bounded
/// per-request timeout, so one unresponsive asset cannot stall a batch.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response.bytes()?.to_vec();
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

/// Production [`BlobStore`] over a Vercel-Blob-style HTTP API:
/// `PUT <base>/<path>` with a bearer token stores an object,
/// `GET <base>?prefix=` lists existing ones. Both return JSON.
pub struct HttpBlobStore {
    base_url: String,
    token: String,
    client: reqwest::blocking::Client,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, BlobError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }
}

impl BlobStore for HttpBlobStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError> {
        let response = self
            .client
            .put(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .query(&[("access", "public")])
            .body(bytes.to_vec())
            .send()?;
        if !response.status().is_success() {
            return Err(BlobError::Status(response.status().as_u16()));
        }
        let body: serde_json::Value = response.json()?;
        body.get("url")
            .and_then(|u| u.as_str())
            .map(|u| u.to_string())
            .ok_or_else(|| BlobError::BadResponse("missing url in put response".into()))
    }

    fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>, BlobError> {
        let response = self
            .client
            .get(&self.base_url)
            .bearer_auth(&self.token)
            .query(&[("prefix", prefix)])
            .send()?;
        if !response.status().is_success() {
            return Err(BlobError::Status(response.status().as_u16()));
        }
        let body: serde_json::Value = response.json()?;
        let blobs = body
            .get("blobs")
            .and_then(|b| b.as_array())
            .ok_or_else(|| BlobError::BadResponse("missing blobs in list response".into()))?;
        Ok(blobs
            .iter()
            .filter_map(|blob| {
                let path = blob.get("pathname")?.as_str()?.to_string();
                let url = blob.get("url")?.as_str()?.to_string();
                Some(BlobInfo { path, url })
            })
            .collect())
    }
}
