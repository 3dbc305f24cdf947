use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cdfcache", version, about = "Inspect and manage an encrypted on-disk object cache")]
pub struct Args {
    /// Cache directory (overrides CDF_CACHE_CACHE_DIR)
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Byte budget (overrides CDF_CACHE_MAX_SIZE)
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,

    /// Encryption key (overrides CDF_CACHE_ENCRYPTION_KEY)
    #[arg(long, value_name = "KEY")]
    pub key: Option<String>,

    /// Treat object identifiers as hex instead of UTF-8 text
    #[arg(long, default_value_t = false)]
    pub hex: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store an object, reading its bytes from FILE or stdin
    Put { id: String, file: Option<PathBuf> },

    /// Print an object to stdout or write it to --output
    Get {
        id: String,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Exit successfully if the object is cached
    Has { id: String },

    /// Remove an object
    Erase { id: String },

    /// Print cache statistics as JSON
    Stat,

    /// Change the byte budget, evicting the oldest objects to fit
    Resize { bytes: u64 },

    /// Delete object files the index no longer tracks
    Sweep,
}
