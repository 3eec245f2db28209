//! Document workspace access.
//!
//! Posts live in an external Notion-style workspace: a database of pages,
//! each page a tree of typed blocks. This module owns the HTTP client for
//! that API and the conversion from block trees to markdown.
//!
//! The compiler only ever sees the [`DocumentSource`] trait — list the
//! published documents, fetch one document's blocks — so tests drive the
//! whole pipeline with an in-memory source and no network.
//!
//! ## Candidate selection
//!
//! Only documents whose `Status` property equals `Published` are
//! candidates, sorted by publish date descending. Both the filter and the
//! sort are applied server-side through the database query body.

use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("workspace API rejected request: status {0}")]
    Status(u16),
    #[error("unexpected workspace response: {0}")]
    BadResponse(String),
}

/// One candidate document, as returned by the database query.
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    /// ISO date string, when the document has one.
    pub publish_date: Option<String>,
}

/// A content block, reduced to the shapes the blog renders.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(String),
    Heading { level: u8, text: String },
    BulletItem(String),
    NumberItem(String),
    Quote(String),
    Code { language: String, text: String },
    Divider,
    Image { url: String, caption: String },
}

/// Source of documents and their block trees.
pub trait DocumentSource {
    /// List published documents, newest first. `selector` narrows the
    /// result to a single document id.
    fn list_documents(&self, selector: Option<&str>) -> Result<Vec<DocumentSummary>, SourceError>;

    /// Fetch the full block list for one document.
    fn fetch_blocks(&self, id: &str) -> Result<Vec<Block>, SourceError>;
}

/// Convert a block list to markdown.
///
/// Images become standard markdown image syntax with the caption as alt
/// text — which is exactly where the signed source URL enters the markup,
/// and where the mapping builder later finds it. Unknown block types were
/// already dropped at parse time.
pub fn to_markup(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block {
            Block::Paragraph(text) => {
                out.push_str(text);
                out.push_str("\n\n");
            }
            Block::Heading { level, text } => {
                out.push_str(&"#".repeat(*level as usize));
                out.push(' ');
                out.push_str(text);
                out.push_str("\n\n");
            }
            Block::BulletItem(text) => {
                out.push_str("- ");
                out.push_str(text);
                out.push('\n');
            }
            Block::NumberItem(text) => {
                out.push_str("1. ");
                out.push_str(text);
                out.push('\n');
            }
            Block::Quote(text) => {
                out.push_str("> ");
                out.push_str(text);
                out.push_str("\n\n");
            }
            Block::Code { language, text } => {
                out.push_str("```");
                out.push_str(language);
                out.push('\n');
                out.push_str(text);
                out.push_str("\n```\n\n");
            }
            Block::Divider => out.push_str("---\n\n"),
            Block::Image { url, caption } => {
                out.push_str(&format!("![{caption}]({url})\n\n"));
            }
        }
    }
    out.trim_end().to_string()
}

/// HTTP [`DocumentSource`] for a Notion-compatible workspace API.
pub struct WorkspaceClient {
    api_base: String,
    database_id: String,
    token: String,
    client: reqwest::blocking::Client,
}

/// API version header the workspace expects.
const API_VERSION: &str = "2022-06-28";

impl WorkspaceClient {
    pub fn new(
        api_base: &str,
        database_id: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            database_id: database_id.to_string(),
            token: token.to_string(),
            client,
        })
    }

    fn query_page(&self, cursor: Option<&str>) -> Result<Value, SourceError> {
        let mut body = json!({
            "filter": { "property": "Status", "status": { "equals": "Published" } },
            "sorts": [{ "property": "Date", "direction": "descending" }],
        });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }

        let response = self
            .client
            .post(format!(
                "{}/databases/{}/query",
                self.api_base, self.database_id
            ))
            .bearer_auth(&self.token)
            .header("Notion-Version", API_VERSION)
            .json(&body)
            .send()?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        Ok(response.json()?)
    }

    fn blocks_page(&self, id: &str, cursor: Option<&str>) -> Result<Value, SourceError> {
        let mut request = self
            .client
            .get(format!("{}/blocks/{id}/children", self.api_base))
            .bearer_auth(&self.token)
            .header("Notion-Version", API_VERSION)
            .query(&[("page_size", "100")]);
        if let Some(cursor) = cursor {
            request = request.query(&[("start_cursor", cursor)]);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        Ok(response.json()?)
    }
}

impl DocumentSource for WorkspaceClient {
    fn list_documents(&self, selector: Option<&str>) -> Result<Vec<DocumentSummary>, SourceError> {
        let mut documents = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.query_page(cursor.as_deref())?;
            let results = page
                .get("results")
                .and_then(|r| r.as_array())
                .ok_or_else(|| SourceError::BadResponse("missing results".into()))?;

            for entry in results {
                if let Some(summary) = parse_summary(entry) {
                    documents.push(summary);
                }
            }

            match next_cursor(&page) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if let Some(id) = selector {
            documents.retain(|d| d.id == id);
        }
        Ok(documents)
    }

    fn fetch_blocks(&self, id: &str) -> Result<Vec<Block>, SourceError> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.blocks_page(id, cursor.as_deref())?;
            let results = page
                .get("results")
                .and_then(|r| r.as_array())
                .ok_or_else(|| SourceError::BadResponse("missing results".into()))?;

            for entry in results {
                if let Some(block) = parse_block(entry) {
                    blocks.push(block);
                }
            }

            match next_cursor(&page) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(blocks)
    }
}

fn next_cursor(page: &Value) -> Option<String> {
    if page.get("has_more").and_then(|m| m.as_bool()) != Some(true) {
        return None;
    }
    page.get("next_cursor")
        .and_then(|c| c.as_str())
        .map(|c| c.to_string())
}

fn parse_summary(entry: &Value) -> Option<DocumentSummary> {
    let id = entry.get("id")?.as_str()?.to_string();
    let properties = entry.get("properties")?;
    let title = properties
        .get("Name")
        .and_then(|n| n.get("title"))
        .and_then(|t| t.as_array())
        .map(plain_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let publish_date = properties
        .get("Date")
        .and_then(|d| d.get("date"))
        .and_then(|d| d.get("start"))
        .and_then(|s| s.as_str())
        .map(|s| s.to_string());
    Some(DocumentSummary {
        id,
        title,
        publish_date,
    })
}

/// Concatenated plain text of a rich-text array.
fn plain_text(rich: &Vec<Value>) -> String {
    rich.iter()
        .filter_map(|span| span.get("plain_text").and_then(|t| t.as_str()))
        .collect()
}

fn rich_text_of(entry: &Value, kind: &str) -> String {
    entry
        .get(kind)
        .and_then(|k| k.get("rich_text"))
        .and_then(|t| t.as_array())
        .map(plain_text)
        .unwrap_or_default()
}

fn parse_block(entry: &Value) -> Option<Block> {
    let kind = entry.get("type")?.as_str()?;
    let block = match kind {
        "paragraph" => Block::Paragraph(rich_text_of(entry, "paragraph")),
        "heading_1" => Block::Heading {
            level: 1,
            text: rich_text_of(entry, "heading_1"),
        },
        "heading_2" => Block::Heading {
            level: 2,
            text: rich_text_of(entry, "heading_2"),
        },
        "heading_3" => Block::Heading {
            level: 3,
            text: rich_text_of(entry, "heading_3"),
        },
        "bulleted_list_item" => Block::BulletItem(rich_text_of(entry, "bulleted_list_item")),
        "numbered_list_item" => Block::NumberItem(rich_text_of(entry, "numbered_list_item")),
        "quote" => Block::Quote(rich_text_of(entry, "quote")),
        "code" => {
            let body = entry.get("code")?;
            Block::Code {
                language: body
                    .get("language")
                    .and_then(|l| l.as_str())
                    .unwrap_or("")
                    .to_string(),
                text: rich_text_of(entry, "code"),
            }
        }
        "divider" => Block::Divider,
        "image" => {
            let body = entry.get("image")?;
            // Workspace-hosted images carry the signed URL under "file";
            // user-linked ones under "external".
            let url = body
                .get("file")
                .or_else(|| body.get("external"))
                .and_then(|f| f.get("url"))
                .and_then(|u| u.as_str())?
                .to_string();
            let caption = body
                .get("caption")
                .and_then(|c| c.as_array())
                .map(plain_text)
                .unwrap_or_default();
            Block::Image { url, caption }
        }
        // Unsupported block types are dropped, not errors
        _ => return None,
    };
    Some(block)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory [`DocumentSource`] with scriptable per-document failures.
    #[derive(Default)]
    pub struct MockSource {
        pub documents: Vec<DocumentSummary>,
        pub blocks: BTreeMap<String, Vec<Block>>,
        /// Document ids whose block fetch should fail.
        pub failing: Vec<String>,
    }

    impl MockSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_document(mut self, id: &str, title: &str, blocks: Vec<Block>) -> Self {
            self.documents.push(DocumentSummary {
                id: id.to_string(),
                title: title.to_string(),
                publish_date: Some("2026-01-15".to_string()),
            });
            self.blocks.insert(id.to_string(), blocks);
            self
        }

        pub fn with_failing_document(mut self, id: &str, title: &str) -> Self {
            self.documents.push(DocumentSummary {
                id: id.to_string(),
                title: title.to_string(),
                publish_date: None,
            });
            self.failing.push(id.to_string());
            self
        }
    }

    impl DocumentSource for MockSource {
        fn list_documents(
            &self,
            selector: Option<&str>,
        ) -> Result<Vec<DocumentSummary>, SourceError> {
            let mut docs = self.documents.clone();
            if let Some(id) = selector {
                docs.retain(|d| d.id == id);
            }
            Ok(docs)
        }

        fn fetch_blocks(&self, id: &str) -> Result<Vec<Block>, SourceError> {
            if self.failing.iter().any(|f| f == id) {
                return Err(SourceError::BadResponse(format!(
                    "scripted failure for {id}"
                )));
            }
            Ok(self.blocks.get(id).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn markup_renders_every_block_kind() {
        let blocks = vec![
            Block::Heading {
                level: 1,
                text: "Title".into(),
            },
            Block::Paragraph("Hello there.".into()),
            Block::BulletItem("one".into()),
            Block::BulletItem("two".into()),
            Block::Quote("wise words".into()),
            Block::Code {
                language: "rust".into(),
                text: "fn main() {}".into(),
            },
            Block::Divider,
            Block::Image {
                url: "https://x.example/a.png".into(),
                caption: "a pic".into(),
            },
        ];
        let markup = to_markup(&blocks);

        assert!(markup.starts_with("# Title\n\nHello there."));
        assert!(markup.contains("- one\n- two"));
        assert!(markup.contains("> wise words"));
        assert!(markup.contains("```rust\nfn main() {}\n```"));
        assert!(markup.contains("---"));
        assert!(markup.ends_with("![a pic](https://x.example/a.png)"));
    }

    #[test]
    fn parse_block_reads_image_url_and_caption() {
        let entry = serde_json::json!({
            "type": "image",
            "image": {
                "file": { "url": "https://prod-files-secure.s3.example.com/a.png?X-Amz-Date=1" },
                "caption": [{ "plain_text": "sunset" }]
            }
        });
        assert_eq!(
            parse_block(&entry),
            Some(Block::Image {
                url: "https://prod-files-secure.s3.example.com/a.png?X-Amz-Date=1".into(),
                caption: "sunset".into(),
            })
        );
    }

    #[test]
    fn parse_block_reads_external_image() {
        let entry = serde_json::json!({
            "type": "image",
            "image": { "external": { "url": "https://example.com/a.png" }, "caption": [] }
        });
        assert!(matches!(
            parse_block(&entry),
            Some(Block::Image { url, .. }) if url == "https://example.com/a.png"
        ));
    }

    #[test]
    fn parse_block_drops_unknown_types() {
        let entry = serde_json::json!({ "type": "synced_block", "synced_block": {} });
        assert_eq!(parse_block(&entry), None);
    }

    #[test]
    fn parse_summary_reads_title_and_date() {
        let entry = serde_json::json!({
            "id": "doc-1",
            "properties": {
                "Name": { "title": [{ "plain_text": "My " }, { "plain_text": "Post" }] },
                "Date": { "date": { "start": "2026-01-15" } }
            }
        });
        let summary = parse_summary(&entry).unwrap();
        assert_eq!(summary.id, "doc-1");
        assert_eq!(summary.title, "My Post");
        assert_eq!(summary.publish_date, Some("2026-01-15".into()));
    }

    #[test]
    fn parse_summary_defaults_untitled() {
        let entry = serde_json::json!({ "id": "doc-2", "properties": {} });
        assert_eq!(parse_summary(&entry).unwrap().title, "Untitled");
    }

    #[test]
    fn next_cursor_respects_has_more() {
        let page = serde_json::json!({ "has_more": true, "next_cursor": "abc" });
        assert_eq!(next_cursor(&page), Some("abc".to_string()));
        let done = serde_json::json!({ "has_more": false, "next_cursor": null });
        assert_eq!(next_cursor(&done), None);
    }
}
