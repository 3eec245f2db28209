use clap::{Parser, Subcommand};
use inkpress::compile::Pipeline;
use inkpress::config::{Secrets, SiteConfig, stock_config_toml};
use inkpress::mapping::FsMapStore;
use inkpress::rehost::{HttpBlobStore, HttpFetcher};
use inkpress::source::WorkspaceClient;
use inkpress::{gate, output};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn version_string() -> &'static str {
    let hash = env!("GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup — trivial, called exactly once
        Box::leak(format!("{} ({hash})", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "inkpress")]
#[command(about = "Secrets-safe blog compiler for workspace-backed posts")]
#[command(long_about = "\
Secrets-safe blog compiler for workspace-backed posts

Pulls published posts from a Notion-style workspace, rehomes every image
from transient signed object-storage URLs into durable public storage, and
emits static HTML artifacts that are guaranteed free of credential
fragments. After every compile the whole output tree is swept against a
credential pattern library; any hit deletes the artifact and fails the run.

Secrets come from the environment, never from the config file:

  INKPRESS_WORKSPACE_TOKEN   workspace API bearer token
  INKPRESS_BLOB_TOKEN        durable storage write token

Run 'inkpress gen-config' to print a documented inkpress.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file
    #[arg(long, default_value = "inkpress.toml", global = true)]
    config: PathBuf,

    /// Override the artifact output directory from the config
    #[arg(long, global = true)]
    output: Option<String>,

    /// Override the private image-map directory from the config
    #[arg(long, global = true)]
    map_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile published posts into sanitized static artifacts
    Compile {
        /// Compile a single post by document id
        #[arg(long)]
        page: Option<String>,
    },
    /// Compile, then commit and push the artifact tree
    Publish {
        /// Compile a single post by document id
        #[arg(long)]
        page: Option<String>,
    },
    /// Sweep the output tree for credential patterns without compiling
    Sweep,
    /// Print a stock inkpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = SiteConfig::load(&cli.config)?;
    apply_overrides(&mut config, cli.output.as_deref(), cli.map_dir.as_deref());

    match cli.command {
        Command::Compile { page } => {
            run_compile(&config, page.as_deref())?;
        }
        Command::Publish { page } => {
            run_compile(&config, page.as_deref())?;
            commit_and_push(Path::new("."), Path::new(&config.compile.output_dir))?;
            println!("==> Published");
        }
        Command::Sweep => {
            let report = gate::sweep(Path::new(&config.compile.output_dir));
            output::print_sweep_report(&report);
            if !report.clean {
                return Err("credential patterns found in output tree".into());
            }
        }
        Command::GenConfig => {
            print!("{}", stock_config_toml());
        }
    }

    Ok(())
}

fn run_compile(config: &SiteConfig, page: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    // Fail before any document work if anything required is missing.
    config.validate_for_compile()?;
    let secrets = Secrets::from_env()?;

    let timeout = Duration::from_secs(config.compile.fetch_timeout_secs);
    let source = WorkspaceClient::new(
        &config.workspace.api_base,
        &config.workspace.database_id,
        &secrets.workspace_token,
        timeout,
    )?;
    let store = HttpBlobStore::new(&config.storage.base_url, &secrets.blob_token, timeout)?;
    let fetcher = HttpFetcher::new(timeout)?;
    let maps = FsMapStore::new(Path::new(&config.compile.map_dir));

    let pipeline = Pipeline {
        source: &source,
        store: &store,
        fetcher: &fetcher,
        maps: &maps,
        config,
    };

    println!("==> Compiling → {}", config.compile.output_dir);
    let report = pipeline.compile(page)?;
    output::print_compile_report(&report);
    Ok(())
}

/// CLI path flags win over the loaded config.
fn apply_overrides(config: &mut SiteConfig, output: Option<&str>, map_dir: Option<&str>) {
    if let Some(output) = output {
        config.compile.output_dir = output.to_string();
    }
    if let Some(map_dir) = map_dir {
        config.compile.map_dir = map_dir.to_string();
    }
}

/// Commit and push the generated artifact tree. The artifacts are plain
/// files in the repository; anything more elaborate than a shell-out is
/// not warranted.
fn commit_and_push(repo: &Path, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !run_git(repo, &["add", &output_dir.to_string_lossy()])? {
        return Err("git add failed".into());
    }
    // Exit 0 means the index matches HEAD: nothing staged. A non-zero exit
    // from the commit itself (hook failure, missing identity) is a real
    // error and must fail the publish.
    if run_git(repo, &["diff", "--cached", "--quiet"])? {
        println!("Nothing to commit");
        return Ok(());
    }
    if !run_git(repo, &["commit", "-m", "Update blog artifacts"])? {
        return Err("git commit failed".into());
    }
    if !run_git(repo, &["push"])? {
        return Err("git push failed".into());
    }
    Ok(())
}

/// Run one git command in `repo`, returning whether it exited zero. Only a
/// spawn failure is an error.
fn run_git(repo: &Path, args: &[&str]) -> Result<bool, Box<dyn std::error::Error>> {
    let status = std::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .status()?;
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cli_flags_override_config_paths() {
        let cli = Cli::try_parse_from([
            "inkpress", "--output", "alt/out", "--map-dir", "alt/maps", "sweep",
        ])
        .unwrap();
        let mut config = SiteConfig::default();
        apply_overrides(&mut config, cli.output.as_deref(), cli.map_dir.as_deref());
        assert_eq!(config.compile.output_dir, "alt/out");
        assert_eq!(config.compile.map_dir, "alt/maps");
    }

    #[test]
    fn absent_cli_flags_keep_config_paths() {
        let cli = Cli::try_parse_from(["inkpress", "sweep"]).unwrap();
        let mut config = SiteConfig::default();
        apply_overrides(&mut config, cli.output.as_deref(), cli.map_dir.as_deref());
        assert_eq!(config.compile.output_dir, "dist/blog");
        assert_eq!(config.compile.map_dir, ".inkpress/maps");
    }

    fn git(repo: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .arg("-C")
            .arg(repo)
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo(tmp: &TempDir) -> &Path {
        let repo = tmp.path();
        git(repo, &["init", "-q"]);
        git(repo, &["config", "user.email", "test@example.com"]);
        git(repo, &["config", "user.name", "Test"]);
        repo
    }

    #[test]
    fn publish_with_no_changes_is_a_noop() {
        let tmp = TempDir::new().unwrap();
        let repo = init_repo(&tmp);
        std::fs::create_dir_all(repo.join("dist")).unwrap();
        std::fs::write(repo.join("dist/index.html"), "<p>x</p>").unwrap();
        git(repo, &["add", "dist"]);
        git(repo, &["commit", "-q", "-m", "seed"]);

        assert!(commit_and_push(repo, Path::new("dist")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn failed_commit_fails_the_publish() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let repo = init_repo(&tmp);
        let hook = repo.join(".git/hooks/pre-commit");
        std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
        std::fs::write(&hook, "#!/bin/sh\nexit 1\n").unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::create_dir_all(repo.join("dist")).unwrap();
        std::fs::write(repo.join("dist/index.html"), "<p>x</p>").unwrap();

        // Staged changes plus a failing commit must surface as an error,
        // never as a quiet "nothing to commit" success.
        assert!(commit_and_push(repo, Path::new("dist")).is_err());
    }
}
