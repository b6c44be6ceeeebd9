mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use restitch_core::{
    load_config, validate_config, Config, ConfigError, PriorityRule, QBittorrentClient,
    ReconcileOptions, Reconciler, StdFsMeta,
};

use prompt::StdinChooser;

/// Match a torrent client's expected files against files already on disk, so
/// they can be adopted in place instead of re-downloaded.
#[derive(Debug, Parser)]
#[command(name = "restitch", version, about)]
struct Cli {
    /// Torrent hash, or a text file with one hash per line.
    input: Option<String>,

    /// Process every torrent the client knows about. Ignored when hashes are given.
    #[arg(short, long)]
    all: bool,

    /// Directory to scan for candidates. Must be inside the download path.
    #[arg(short, long, value_name = "DIR")]
    search_path: Option<PathBuf>,

    /// New download path for the torrents; moves and rechecks them afterwards.
    #[arg(short, long, value_name = "DIR")]
    download_path: Option<PathBuf>,

    /// Scan the torrent's save path instead of its content directory.
    #[arg(long)]
    use_save_path: bool,

    /// Only match files that share the torrent file's extension.
    #[arg(short = 'e', long)]
    match_extension: bool,

    /// Report what would happen without modifying anything.
    #[arg(long)]
    dry_run: bool,

    /// Consolidate matches via hardlink instead of renaming slots.
    #[arg(long)]
    hardlink: bool,

    /// Zero the priority of files with no disk match instead of downloading them.
    #[arg(long)]
    no_redownload: bool,

    /// Priority rule as PATTERN=PRIORITY[,delete]; may be given multiple times.
    #[arg(long = "rule", value_name = "RULE")]
    rules: Vec<PriorityRule>,

    /// Delete every file that reads back at priority zero from disk.
    #[arg(long)]
    delete_unwanted: bool,

    /// Path to the client credentials file.
    #[arg(long, value_name = "FILE", env = "RESTITCH_CONFIG", default_value = "client.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_target(false))
        .init();

    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let hashes = read_hashes(cli.input.as_deref())?;
    if hashes.is_empty() && !cli.all {
        bail!("nothing to do: pass a torrent hash (or hash file), or --all");
    }

    for (label, path) in [("search", &cli.search_path), ("download", &cli.download_path)] {
        if let Some(path) = path {
            if !path.is_dir() {
                bail!("bad {} path: '{}' is not an existing directory", label, path.display());
            }
        }
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound(_)) => {
            warn!(
                "Config file '{}' not found, using default credentials",
                cli.config.display()
            );
            Config::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to load '{}'", cli.config.display()))
        }
    };
    validate_config(&config).context("configuration validation failed")?;

    let client = QBittorrentClient::new(config.client).context("failed to build client")?;
    info!("Using torrent client backend: qbittorrent");

    let options = ReconcileOptions {
        hashes,
        all: cli.all,
        search_path: cli.search_path,
        download_path: cli.download_path,
        use_save_path: cli.use_save_path,
        match_extension: cli.match_extension,
        dry_run: cli.dry_run,
        hardlink_mode: cli.hardlink,
        no_redownload: cli.no_redownload,
        rules: cli.rules,
        delete_unwanted: cli.delete_unwanted,
    };

    let mut engine = Reconciler::new(
        Arc::new(client),
        Arc::new(StdinChooser::new()),
        Arc::new(StdFsMeta),
        options,
    );

    let report = engine.run().await?;

    for torrent in &report.torrents {
        info!(
            "{}: {} renamed, {} consolidated, {} already placed, {} planned, \
             {} skipped, {} not found, {} conflicts, {} priority change(s), {} deleted",
            torrent.name,
            torrent.renamed,
            torrent.consolidated,
            torrent.already_placed,
            torrent.planned,
            torrent.skipped,
            torrent.not_found,
            torrent.conflicts,
            torrent.priorities_changed,
            torrent.deleted,
        );
    }
    if cli.dry_run {
        info!("Dry run, nothing was modified");
    }
    if report.had_errors() {
        warn!("Some files needed attention, see the log above");
    }

    Ok(())
}

/// Interpret the positional input as a hash, or a file with one hash per line.
fn read_hashes(input: Option<&str>) -> Result<Vec<String>> {
    let Some(input) = input else {
        return Ok(Vec::new());
    };

    let path = PathBuf::from(input);
    if path.is_file() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read hash file '{}'", path.display()))?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    } else {
        Ok(vec![input.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_hashes_single_hash() {
        let hashes = read_hashes(Some("abcdef0123456789")).unwrap();
        assert_eq!(hashes, vec!["abcdef0123456789".to_string()]);
    }

    #[test]
    fn test_read_hashes_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "aaa\n\n  bbb  \n").unwrap();

        let hashes = read_hashes(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(hashes, vec!["aaa".to_string(), "bbb".to_string()]);
    }

    #[test]
    fn test_read_hashes_none() {
        assert!(read_hashes(None).unwrap().is_empty());
    }

    #[test]
    fn test_cli_parses_rules() {
        let cli = Cli::parse_from([
            "restitch",
            "abc",
            "--rule",
            "sample=0,delete",
            "--rule",
            "trailer=1",
        ]);
        assert_eq!(cli.rules.len(), 2);
        assert!(cli.rules[0].delete_if_zero);
    }
}
