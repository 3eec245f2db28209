//! Compiler configuration.
//!
//! Non-secret settings come from `inkpress.toml`; secrets come from the
//! environment only and are never written to disk. Config files are sparse —
//! override just the values you want — and unknown keys are rejected to
//! catch typos early.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [workspace]
//! database_id = ""                       # Required for compile/publish
//! api_base = "https://api.notion.com/v1"
//!
//! [storage]
//! base_url = "https://blob.vercel-storage.com"
//! prefix = "images"                      # Durable blob path prefix
//!
//! [scrub]
//! untrusted_domains = ["prod-files-secure", "amazonaws.com"]
//!
//! [compile]
//! output_dir = "dist/blog"
//! map_dir = ".inkpress/maps"             # Private, keep out of version control
//! on_error = "abort"                     # "abort" or "skip"
//! fetch_timeout_secs = 30
//!
//! # Emergency manual overrides, placeholder -> URL. Win over stored maps.
//! [overrides]
//! # "image-placeholder-abc123" = "https://cdn.example/fixed.png"
//! ```
//!
//! ## Secrets
//!
//! - `INKPRESS_WORKSPACE_TOKEN` — workspace API bearer token
//! - `INKPRESS_BLOB_TOKEN` — durable storage write token
//!
//! Both are validated at the entry point, before any document work begins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Per-document failure policy for a batch compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// One bad document aborts the whole run; no partial publish.
    #[default]
    Abort,
    /// Bad documents are skipped and reported; the rest still compile.
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub workspace: WorkspaceConfig,
    pub storage: StorageConfig,
    pub scrub: ScrubConfig,
    pub compile: CompileConfig,
    /// Manual placeholder overrides applied at render time, winning over
    /// the stored image map.
    pub overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Workspace database holding the posts. Required for compile/publish.
    pub database_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub base_url: String,
    /// Path prefix for rehomed blobs: `<prefix>/<hash>.<ext>`.
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrubConfig {
    /// Host fragments marking a URL as transient object storage.
    pub untrusted_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    pub output_dir: String,
    pub map_dir: String,
    pub on_error: OnError,
    pub fetch_timeout_secs: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            storage: StorageConfig::default(),
            scrub: ScrubConfig::default(),
            compile: CompileConfig::default(),
            overrides: BTreeMap::new(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            database_id: String::new(),
            api_base: "https://api.notion.com/v1".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://blob.vercel-storage.com".to_string(),
            prefix: "images".to_string(),
        }
    }
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            untrusted_domains: crate::patterns::DEFAULT_UNTRUSTED_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            output_dir: "dist/blog".to_string(),
            map_dir: ".inkpress/maps".to_string(),
            on_error: OnError::Abort,
            fetch_timeout_secs: 30,
        }
    }
}

impl SiteConfig {
    /// Load from `path`, or stock defaults if no file exists.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scrub.untrusted_domains.is_empty() {
            return Err(ConfigError::Validation(
                "scrub.untrusted_domains must not be empty".to_string(),
            ));
        }
        if self.compile.fetch_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "compile.fetch_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks needed before talking to external services; called by the
    /// compile/publish entry points, not by sweep or gen-config.
    pub fn validate_for_compile(&self) -> Result<(), ConfigError> {
        if self.workspace.database_id.is_empty() {
            return Err(ConfigError::Validation(
                "workspace.database_id is required for compile".to_string(),
            ));
        }
        Ok(())
    }
}

/// Secrets pulled from the environment at startup.
pub struct Secrets {
    pub workspace_token: String,
    pub blob_token: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            workspace_token: require_env("INKPRESS_WORKSPACE_TOKEN")?,
            blob_token: require_env("INKPRESS_BLOB_TOKEN")?,
        })
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingEnv(name))
}

/// Documented stock config, printed by `inkpress gen-config`.
pub fn stock_config_toml() -> String {
    let stock = SiteConfig::default();
    let body = toml::to_string_pretty(&stock).expect("stock config always serializes");
    format!(
        "# inkpress configuration. All options are optional; defaults shown.\n\
         # Secrets come from the environment, never from this file:\n\
         #   INKPRESS_WORKSPACE_TOKEN  workspace API bearer token\n\
         #   INKPRESS_BLOB_TOKEN       durable storage write token\n\n\
         {body}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = SiteConfig::load(&tmp.path().join("inkpress.toml")).unwrap();
        assert_eq!(config.compile.output_dir, "dist/blog");
        assert_eq!(config.compile.on_error, OnError::Abort);
        assert!(config.scrub.untrusted_domains.contains(&"amazonaws.com".to_string()));
    }

    #[test]
    fn sparse_override_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inkpress.toml");
        std::fs::write(&path, "[compile]\non_error = \"skip\"\n").unwrap();

        let config = SiteConfig::load(&path).unwrap();
        assert_eq!(config.compile.on_error, OnError::Skip);
        assert_eq!(config.compile.output_dir, "dist/blog");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inkpress.toml");
        std::fs::write(&path, "[compile]\noutptu_dir = \"typo\"\n").unwrap();

        assert!(matches!(SiteConfig::load(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn empty_domain_list_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inkpress.toml");
        std::fs::write(&path, "[scrub]\nuntrusted_domains = []\n").unwrap();

        assert!(matches!(
            SiteConfig::load(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn compile_requires_database_id() {
        let config = SiteConfig::default();
        assert!(config.validate_for_compile().is_err());

        let mut with_db = SiteConfig::default();
        with_db.workspace.database_id = "db-123".to_string();
        assert!(with_db.validate_for_compile().is_ok());
    }

    #[test]
    fn overrides_parse_from_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inkpress.toml");
        std::fs::write(
            &path,
            "[overrides]\n\"image-placeholder-abc\" = \"https://cdn.example/a.png\"\n",
        )
        .unwrap();

        let config = SiteConfig::load(&path).unwrap();
        assert_eq!(
            config.overrides.get("image-placeholder-abc").map(String::as_str),
            Some("https://cdn.example/a.png")
        );
    }

    #[test]
    fn stock_config_roundtrips() {
        let printed = stock_config_toml();
        let toml_only: String = printed
            .lines()
            .filter(|l| !l.starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");
        let parsed: SiteConfig = toml::from_str(&toml_only).unwrap();
        assert_eq!(parsed.compile.output_dir, "dist/blog");
    }
}
