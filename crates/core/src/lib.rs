//! Core types and shared functionality for cdfcache.
//!
//! This crate provides:
//! - An encrypted, size-bounded object cache on local disk
//! - Crypto and storage adapters it is built on
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;

pub use cache::{Cache, CacheEntry, CacheStats, MetadataLoad, ObjectId};
pub use config::CacheConfig;
pub use error::{Error, IntegrityError};
pub use storage::{FsStorage, Storage, StorageError};
