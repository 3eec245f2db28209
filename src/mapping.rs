//! Per-document image maps: placeholder → durable URL.
//!
//! The mapping builder scans a document's markup for asset references on
//! the untrusted transient domain, assigns each distinct source URL a
//! deterministic placeholder, rehosts the assets concurrently, and persists
//! the resulting table to a private per-document store.
//!
//! ## Why batch-resolve-then-substitute
//!
//! The naive approach — detect an image, stream its bytes, substitute the
//! reference inline, move to the next — leaves a window where the raw
//! signed URL is already part of the markup being rendered while later
//! images are still in flight. That window is exactly how the original
//! credential leak happened. Here the whole batch is resolved and persisted
//! before any substitution runs, so sanitization always works from a
//! complete table.
//!
//! ## Failure entries
//!
//! A failed rehost leaves the *source URL* as the map value rather than
//! dropping the entry. That value is still sensitive; it is deliberately
//! kept visible so the final credential sweep treats it as a live hazard
//! instead of a silently vanished image.

use crate::naming::{placeholder_for, placeholder_hash};
use crate::patterns::{is_untrusted, untrusted_url_regex};
use crate::rehost::{self, BlobStore, ImageFetcher};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Mapping from placeholder token to resolved value for one document.
///
/// Values are durable URLs after a successful rehost, or the original
/// (still-signed) source URL when rehosting failed. [`ImageMap::resolved`]
/// filters to entries safe to substitute into an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageMap {
    entries: BTreeMap<String, String>,
}

impl ImageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.entries.get(placeholder).map(String::as_str)
    }

    pub fn insert(&mut self, placeholder: String, value: String) {
        self.entries.insert(placeholder, value);
    }

    pub fn contains(&self, placeholder: &str) -> bool {
        self.entries.contains_key(placeholder)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries whose value is a durable URL — i.e. not still pointing at
    /// the untrusted transient domain. Only these may be substituted into
    /// rendered output.
    pub fn resolved(&self, domains: &[String]) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(_, v)| !is_untrusted(v, domains))
    }
}

/// Private per-document persistence for image maps. Lives outside the
/// served output tree; swap in an in-memory impl for tests.
pub trait MapStore {
    fn save(&self, doc_id: &str, map: &ImageMap) -> Result<(), MapStoreError>;
    fn load(&self, doc_id: &str) -> Result<Option<ImageMap>, MapStoreError>;
}

/// Filesystem [`MapStore`]: one `<doc_id>.json` per document under a
/// private directory.
pub struct FsMapStore {
    dir: PathBuf,
}

impl FsMapStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Document ids are opaque external identifiers; keep them out of path
    /// syntax before using them as filenames.
    fn record_path(&self, doc_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", crate::naming::safe_path_component(doc_id)))
    }
}

impl MapStore for FsMapStore {
    fn save(&self, doc_id: &str, map: &ImageMap) -> Result<(), MapStoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(map)?;
        std::fs::write(self.record_path(doc_id), json)?;
        Ok(())
    }

    fn load(&self, doc_id: &str) -> Result<Option<ImageMap>, MapStoreError> {
        let path = self.record_path(doc_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}

/// Markdown image syntax: `![alt](url)`.
static MD_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)\s]+)").expect("md image pattern"));

/// HTML image tag: `<img src="url">`.
static HTML_IMG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<img[^>]*src="([^"]+)""#).expect("html img pattern"));

/// All distinct untrusted-domain asset URLs in a markup string, in first
/// occurrence order.
///
/// Three extraction passes: bare untrusted-domain URLs anywhere in the
/// text, URLs inside markdown image syntax, and URLs inside HTML `<img>`
/// tags. The image-syntax passes see URLs on any domain; only those on the
/// untrusted set survive the filter.
pub fn extract_asset_urls(markup: &str, domains: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    let mut push = |url: &str| {
        if is_untrusted(url, domains) && seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    };

    for m in untrusted_url_regex(domains).find_iter(markup) {
        push(m.as_str());
    }
    for caps in MD_IMAGE.captures_iter(markup) {
        push(&caps[1]);
    }
    for caps in HTML_IMG.captures_iter(markup) {
        push(&caps[1]);
    }
    urls
}

/// Build and persist the image map for one document.
///
/// Rehosts run concurrently across the document's assets via rayon; the
/// batch is awaited in full before the map is persisted, and persistence
/// completes before the caller may substitute anything.
pub fn build_map(
    doc_id: &str,
    markup: &str,
    domains: &[String],
    blob_prefix: &str,
    store: &dyn BlobStore,
    fetcher: &dyn ImageFetcher,
    map_store: &dyn MapStore,
) -> Result<ImageMap, MapStoreError> {
    let urls = extract_asset_urls(markup, domains);

    let resolved: Vec<(String, String)> = urls
        .par_iter()
        .map(|url| {
            let name = placeholder_hash(url);
            let value = rehost::rehost(store, fetcher, url, &name, blob_prefix)
                .unwrap_or_else(|| url.clone());
            (placeholder_for(url), value)
        })
        .collect();

    let mut map = ImageMap::new();
    for (placeholder, value) in resolved {
        map.insert(placeholder, value);
    }

    map_store.save(doc_id, &map)?;
    Ok(map)
}
