//! cdfcache command-line entry point.
//!
//! Opens the configured cache, runs one operation and closes it again so the
//! index is persisted. Logging goes to stderr so object bytes can be piped
//! through stdout.

use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use cdfcache_core::{Cache, CacheConfig, ObjectId, Storage};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;

use args::{Args, Command};

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();

    let mut config = CacheConfig::load()?;
    if let Some(dir) = args.dir {
        config.cache_dir = dir;
    }
    if let Some(max_size) = args.max_size {
        config.max_size = max_size;
    }
    if let Some(key) = args.key {
        config.encryption_key = Some(key);
    }

    let mut cache = Cache::from_config(&config)?;
    tracing::info!(report = ?cache.load_report(), "Loaded cache metadata");

    let ok = execute(&mut cache, &args.command, args.hex, &mut io::stdout().lock())?;
    cache.close()?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Run one command. Returns false when the cache reports a failure or miss.
fn execute<S: Storage>(cache: &mut Cache<S>, command: &Command, hex: bool, out: &mut impl Write) -> Result<bool> {
    let ok = match command {
        Command::Put { id, file } => {
            let id = parse_id(id, hex)?;
            let value = match file {
                Some(path) => fs::read(path).with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    io::stdin().read_to_end(&mut buf).context("reading stdin")?;
                    buf
                }
            };
            cache.write_object(&id, &value)
        }
        Command::Get { id, output } => {
            let id = parse_id(id, hex)?;
            match cache.read_object(&id) {
                Some(value) => {
                    match output {
                        Some(path) => fs::write(path, &value).with_context(|| format!("writing {}", path.display()))?,
                        None => out.write_all(&value)?,
                    }
                    true
                }
                None => false,
            }
        }
        Command::Has { id } => cache.has_object(&parse_id(id, hex)?),
        Command::Erase { id } => cache.erase_object(&parse_id(id, hex)?),
        Command::Stat => {
            serde_json::to_writer_pretty(&mut *out, &cache.stats())?;
            writeln!(out)?;
            true
        }
        Command::Resize { bytes } => {
            cache.set_max_size(*bytes);
            true
        }
        Command::Sweep => {
            let removed = cache.sweep_orphans()?;
            writeln!(out, "{removed}")?;
            true
        }
    };
    Ok(ok)
}

fn parse_id(text: &str, hex: bool) -> Result<ObjectId> {
    if hex {
        ObjectId::from_hex(text).with_context(|| format!("{text:?} is not valid hex"))
    } else {
        Ok(ObjectId::from(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("ab", false).unwrap().as_bytes(), b"ab");
        assert_eq!(parse_id("00ff", true).unwrap().as_bytes(), &[0x00, 0xff]);
        assert!(parse_id("zz", true).is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["cdfcache", "--hex", "--max-size", "10", "get", "00ff", "-o", "out.bin"]).unwrap();
        assert!(args.hex);
        assert_eq!(args.max_size, Some(10));
        assert!(matches!(args.command, Command::Get { ref id, output: Some(_) } if id == "00ff"));
    }

    #[test]
    fn test_put_get_erase() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.bin");
        fs::write(&input, b"payload").unwrap();
        let mut cache = Cache::open(dir.path().join("cache"), b"cli test key").unwrap();
        let mut out = Vec::new();

        let put = Command::Put { id: "obj".into(), file: Some(input) };
        assert!(execute(&mut cache, &put, false, &mut out).unwrap());
        assert!(execute(&mut cache, &Command::Has { id: "obj".into() }, false, &mut out).unwrap());

        let get = Command::Get { id: "obj".into(), output: None };
        assert!(execute(&mut cache, &get, false, &mut out).unwrap());
        assert_eq!(out, b"payload");

        assert!(execute(&mut cache, &Command::Erase { id: "obj".into() }, false, &mut out).unwrap());
        assert!(!execute(&mut cache, &get, false, &mut out).unwrap());
    }

    #[test]
    fn test_stat_and_resize() {
        let dir = tempdir().unwrap();
        let mut cache = Cache::open(dir.path(), b"cli test key").unwrap();
        assert!(cache.write_object(&ObjectId::from("a"), &[0; 50]));
        assert!(cache.write_object(&ObjectId::from("b"), &[0; 50]));

        let mut out = Vec::new();
        assert!(execute(&mut cache, &Command::Resize { bytes: 60 }, false, &mut out).unwrap());
        assert!(execute(&mut cache, &Command::Stat, false, &mut out).unwrap());

        let stats: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(stats["entries"], 1);
        assert_eq!(stats["current_size"], 50);
        assert_eq!(stats["max_size"], 60);
    }
}
