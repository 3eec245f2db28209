//! Compile orchestration.
//!
//! The pipeline for one run:
//!
//! ```text
//! list documents ──▶ per document (sequential):
//!                      fetch blocks → markdown
//!                      build image map (rehosts run in parallel)   mapping
//!                      Pass A: placeholders substituted            scrub
//!                      resolve placeholders → durable URLs         render
//!                      render article HTML
//!                      Pass B: final credential sweep              scrub
//!                      write <out>/<doc_id>/index.html
//!                    ──▶ integrity gate over the whole tree        gate
//! ```
//!
//! Documents compile sequentially so the batch failure policy stays simple
//! to reason about; the parallelism lives inside each document's rehost
//! batch. The output tree is deleted and regenerated wholesale every run —
//! artifacts are never patched in place.
//!
//! ## Failure policy
//!
//! `on_error = "abort"` (the default) treats one bad document as fatal and
//! clears the output tree: no partial publish of a half-processed batch.
//! `"skip"` records the failure in the report and compiles the rest. Either
//! way the run only succeeds if the integrity gate finds nothing.
//!
//! All collaborators come in as trait objects ([`Pipeline`]), so the whole
//! flow runs against in-memory fakes in tests.

use crate::config::{OnError, SiteConfig};
use crate::gate;
use crate::mapping::{self, MapStore, MapStoreError};
use crate::rehost::{BlobStore, ImageFetcher};
use crate::render;
use crate::scrub;
use crate::source::{DocumentSource, DocumentSummary, SourceError, to_markup};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("workspace error: {0}")]
    Source(#[from] SourceError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document {id} failed: {reason}")]
    Document { id: String, reason: String },
    #[error("integrity gate removed {} artifact(s); output tree is incomplete", removed.len())]
    LeakDetected { removed: Vec<PathBuf> },
}

/// Failure while compiling a single document. Converted into the run-level
/// outcome according to the configured failure policy.
#[derive(Error, Debug)]
enum DocumentError {
    #[error("workspace error: {0}")]
    Source(#[from] SourceError),
    #[error("map store error: {0}")]
    MapStore(#[from] MapStoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One successfully compiled document.
#[derive(Debug)]
pub struct CompiledDocument {
    pub id: String,
    pub title: String,
    pub artifact: PathBuf,
}

/// Outcome of a compile run that did not fail outright.
#[derive(Debug, Default)]
pub struct CompileReport {
    pub compiled: Vec<CompiledDocument>,
    /// Documents skipped under the `skip` policy: (id, reason).
    pub skipped: Vec<(String, String)>,
}

/// The compiler with its injected collaborators.
pub struct Pipeline<'a> {
    pub source: &'a dyn DocumentSource,
    pub store: &'a dyn BlobStore,
    pub fetcher: &'a dyn ImageFetcher,
    pub maps: &'a dyn MapStore,
    pub config: &'a SiteConfig,
}

impl Pipeline<'_> {
    /// Compile all published documents, or just `selector`.
    pub fn compile(&self, selector: Option<&str>) -> Result<CompileReport, CompileError> {
        let out_dir = Path::new(&self.config.compile.output_dir);
        let documents = self.source.list_documents(selector)?;

        // Full regeneration: clear whatever the previous run left behind.
        remove_tree(out_dir)?;
        std::fs::create_dir_all(out_dir)?;

        let mut report = CompileReport::default();
        for doc in &documents {
            match self.compile_document(doc, out_dir) {
                Ok(artifact) => report.compiled.push(CompiledDocument {
                    id: doc.id.clone(),
                    title: doc.title.clone(),
                    artifact,
                }),
                Err(e) => match self.config.compile.on_error {
                    OnError::Abort => {
                        // No partial publish: take down everything written
                        // so far before reporting the failure.
                        remove_tree(out_dir)?;
                        return Err(CompileError::Document {
                            id: doc.id.clone(),
                            reason: e.to_string(),
                        });
                    }
                    OnError::Skip => report.skipped.push((doc.id.clone(), e.to_string())),
                },
            }
        }

        let sweep = gate::sweep(out_dir);
        if !sweep.clean {
            return Err(CompileError::LeakDetected {
                removed: sweep.removed,
            });
        }
        Ok(report)
    }

    fn compile_document(
        &self,
        doc: &DocumentSummary,
        out_dir: &Path,
    ) -> Result<PathBuf, DocumentError> {
        let blocks = self.source.fetch_blocks(&doc.id)?;
        let markup = to_markup(&blocks);
        let domains = &self.config.scrub.untrusted_domains;

        // Resolve and persist the full asset batch before any substitution.
        let mut map = mapping::build_map(
            &doc.id,
            &markup,
            domains,
            &self.config.storage.prefix,
            self.store,
            self.fetcher,
            self.maps,
        )?;

        let mapped_before = map.len();
        let sanitized = scrub::sanitize_markup(&markup, &mut map, domains);
        if map.len() != mapped_before {
            // Pass A minted placeholders the extractor didn't see; keep the
            // persisted table complete for runtime lookups.
            self.maps.save(&doc.id, &map)?;
        }

        let resolved =
            render::resolve_placeholders(&sanitized, &map, &self.config.overrides, domains);
        let body = render::markdown_to_html(&resolved);
        let page = render::render_article(&doc.title, doc.publish_date.as_deref(), &body);
        let artifact = scrub::final_sweep(&page);

        let path = render::artifact_path(out_dir, &doc.id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, artifact)?;
        Ok(path)
    }
}

/// Delete a directory tree, treating "already gone" as success.
fn remove_tree(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
