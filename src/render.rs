//! Artifact rendering and placeholder resolution.
//!
//! One artifact per document: `<out>/<doc_id>/index.html`, a minimal
//! article page built with [maud](https://maud.lambda.xyz/) around the
//! markdown body converted by pulldown-cmark. Templating is compile-time
//! and auto-escaped; the only `PreEscaped` insertion is the converted
//! markdown body, which has already been through scrubber Pass A and gets
//! Pass B after rendering.
//!
//! ## Placeholder resolution
//!
//! Sanitized markup references images through stable placeholder tokens.
//! [`resolve_placeholders`] substitutes each token with its durable URL
//! from the document's image map. Resolution is best-effort by contract:
//! a placeholder with no mapping (failed rehost, missing map record) stays
//! in the text untouched — an unresolved image, never a crash and never a
//! reintroduced secret. Manual overrides win over the loaded map, covering
//! the emergency case where a map record is known to be wrong.

use crate::mapping::ImageMap;
use crate::naming::safe_path_component;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Parser, html as md_html};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Substitute placeholder tokens with their resolved URLs.
///
/// `overrides` are applied first and shadow the map. Only entries the map
/// reports as resolved for the given domain set are substituted; entries
/// still carrying an untrusted source URL are skipped so a failed rehost
/// can never push a signed URL back into the text.
pub fn resolve_placeholders(
    markup: &str,
    map: &ImageMap,
    overrides: &BTreeMap<String, String>,
    domains: &[String],
) -> String {
    let mut resolved = markup.to_string();
    for (placeholder, url) in overrides {
        resolved = resolved.replace(placeholder.as_str(), url);
    }
    for (placeholder, url) in map.resolved(domains) {
        resolved = resolved.replace(placeholder, url);
    }
    resolved
}

/// Convert markdown to HTML.
pub fn markdown_to_html(markup: &str) -> String {
    let parser = Parser::new(markup);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

/// Render the full article page for one document.
pub fn render_article(title: &str, publish_date: Option<&str>, body_html: &str) -> String {
    let page: Markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
            }
            body {
                article {
                    header {
                        h1 { (title) }
                        @if let Some(date) = publish_date {
                            time datetime=(date) { (date) }
                        }
                    }
                    (PreEscaped(body_html))
                }
            }
        }
    };
    page.into_string()
}

/// Output location for a document's artifact. The document id is an opaque
/// external identifier and is sanitized to a single path component so the
/// artifact can never land outside the swept output tree.
pub fn artifact_path(out_dir: &Path, doc_id: &str) -> PathBuf {
    out_dir.join(safe_path_component(doc_id)).join("index.html")
}
