//! Command-line interface for inspecting a persisted cache.
//!
//! `festcache` opens the snapshot a [`FileStore`] holds and lets an
//! operator look at it or prune it.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::KeyedCache;
use crate::config::{CacheConfig, DEFAULT_STORAGE_KEY};
use crate::durable::FileStore;
use crate::error::CacheResult;
use crate::routes::RouteRules;

/// Inspect and maintain a festival cache snapshot.
#[derive(Parser, Debug)]
#[command(name = "festcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the durable store.
    #[arg(long, env = "FESTCACHE_DIR", default_value = ".festcache")]
    pub dir: PathBuf,

    /// Key the snapshot is stored under.
    #[arg(long, default_value = DEFAULT_STORAGE_KEY)]
    pub key: String,

    /// The command to execute.
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Show entry count, size and hit/miss rates.
    Stats,

    /// List every entry, least recently used first.
    Inspect,

    /// Remove every entry carrying a tag.
    Invalidate {
        /// The tag to invalidate.
        #[arg(long)]
        tag: String,
    },

    /// Remove expired entries.
    Cleanup,

    /// Remove everything, including the stored snapshot.
    Clear,

    /// Print the routes the prefetcher would warm after visiting a route.
    Predict {
        /// A same-origin path such as `/festivals/genre/techno`.
        route: String,
    },
}

/// Run `cli`, writing human-readable output to `out`.
pub fn execute(cli: &Cli, out: &mut impl Write) -> CacheResult<()> {
    if let CliCommand::Predict { route } = &cli.command {
        for next in RouteRules::festival_site().predict(route) {
            writeln!(out, "{}", next)?;
        }
        return Ok(());
    }

    let read_only = matches!(cli.command, CliCommand::Stats | CliCommand::Inspect);
    let store = if read_only {
        FileStore::at(&cli.dir)
    } else {
        FileStore::open(&cli.dir)?
    };
    // Unlimited capacity so loading never drops what is on disk.
    let config = CacheConfig::new()
        .storage_key(cli.key.clone())
        .max_size_bytes(0)
        .build();
    let cache: KeyedCache<serde_json::Value> = KeyedCache::with_store(config, Arc::new(store));

    match &cli.command {
        CliCommand::Stats => {
            let stats = cache.stats();
            writeln!(out, "entries:     {}", stats.entry_count)?;
            writeln!(out, "size:        {} bytes", stats.total_size_bytes)?;
            writeln!(out, "hits:        {}", stats.hits)?;
            writeln!(out, "misses:      {}", stats.misses)?;
            writeln!(out, "hit rate:    {:.1}%", stats.hit_rate)?;
            writeln!(out, "miss rate:   {:.1}%", stats.miss_rate)?;
            writeln!(out, "evictions:   {}", stats.evictions)?;
            writeln!(out, "expirations: {}", stats.expirations)?;
        }
        CliCommand::Inspect => {
            for info in cache.entries_info() {
                writeln!(
                    out,
                    "{}\t{} bytes\t{} reads\t{}s left\t[{}]",
                    info.key,
                    info.size_bytes,
                    info.access_count,
                    info.remaining_ms / 1_000,
                    info.tags.join(",")
                )?;
            }
        }
        CliCommand::Invalidate { tag } => {
            let removed = cache.invalidate_by_tag(tag);
            writeln!(out, "removed {} entries tagged '{}'", removed, tag)?;
        }
        CliCommand::Cleanup => {
            let removed = cache.cleanup_expired();
            writeln!(out, "removed {} expired entries", removed)?;
        }
        CliCommand::Clear => {
            cache.clear();
            writeln!(out, "cache cleared")?;
        }
        CliCommand::Predict { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SetOptions;

    fn run(args: &[&str]) -> String {
        let cli = Cli::parse_from(args);
        let mut out = Vec::new();
        execute(&cli, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn seed(dir: &std::path::Path) {
        let store = FileStore::open(dir).unwrap();
        let cache: KeyedCache<serde_json::Value> =
            KeyedCache::with_store(CacheConfig::default(), Arc::new(store));
        cache
            .set_with(
                "/festivals",
                serde_json::json!(["Primavera Sound", "Roskilde"]),
                SetOptions::new().tag("festivals"),
            )
            .unwrap();
        cache
            .set_with("/quiz", serde_json::json!({"steps": 5}), SetOptions::new().tag("quiz"))
            .unwrap();
    }

    #[test]
    fn test_parse_invalidate() {
        let cli = Cli::parse_from(["festcache", "--dir", "/tmp/x", "invalidate", "--tag", "blog"]);
        assert_eq!(cli.dir, PathBuf::from("/tmp/x"));
        assert_eq!(cli.key, "app_cache_v1");
        match cli.command {
            CliCommand::Invalidate { tag } => assert_eq!(tag, "blog"),
            _ => panic!("Expected Invalidate command"),
        }
    }

    #[test]
    fn test_parse_predict() {
        let cli = Cli::parse_from(["festcache", "predict", "/festivals"]);
        assert!(matches!(cli.command, CliCommand::Predict { route } if route == "/festivals"));
    }

    #[test]
    fn test_predict_output() {
        assert_eq!(run(&["festcache", "predict", "/"]), "/festivals\n/quiz\n");
    }

    #[test]
    fn test_inspect_and_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let dir_arg = dir.path().to_str().unwrap();

        let listing = run(&["festcache", "--dir", dir_arg, "inspect"]);
        assert!(listing.contains("/festivals"));
        assert!(listing.contains("[quiz]"));

        let result = run(&["festcache", "--dir", dir_arg, "invalidate", "--tag", "festivals"]);
        assert_eq!(result, "removed 1 entries tagged 'festivals'\n");

        let stats = run(&["festcache", "--dir", dir_arg, "stats"]);
        assert!(stats.starts_with("entries:     1\n"));
    }

    #[test]
    fn test_read_only_commands_leave_missing_dir_alone() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("fresh");
        let dir_arg = missing.to_str().unwrap();

        assert!(run(&["festcache", "--dir", dir_arg, "stats"]).starts_with("entries:     0\n"));
        assert!(run(&["festcache", "--dir", dir_arg, "inspect"]).is_empty());
        assert!(!missing.exists());
    }

    #[test]
    fn test_clear_removes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let dir_arg = dir.path().to_str().unwrap();

        assert_eq!(run(&["festcache", "--dir", dir_arg, "clear"]), "cache cleared\n");
        assert!(run(&["festcache", "--dir", dir_arg, "inspect"]).is_empty());
    }
}
