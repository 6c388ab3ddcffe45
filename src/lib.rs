//! # Consolidator
//!
//! Moves the content of one or more sites of a multi-site network into a
//! single destination site: posts with their meta and direct children,
//! authors, taxonomy terms and links, comments, uploaded files and
//! redirects from the old post locations. Usable both as a standalone
//! binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! consolidator = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use consolidator::bridge::LocalBridge;
//! use consolidator::migrate::{ConsolidationRequest, Consolidator};
//! use consolidator::store::{SqliteStore, Store};
//!
//! let store: Arc<dyn Store> = Arc::new(SqliteStore::new("./data/consolidator.db").unwrap());
//! store.initialize().unwrap();
//!
//! let bridge = Arc::new(LocalBridge::new(store.clone()));
//! let engine = Consolidator::new(store, bridge, PathBuf::from("./data/uploads"));
//! let report = engine.run(&ConsolidationRequest::new(vec![2, 3], 1)).unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod auth;
pub mod bridge;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod migrate;
pub mod server;
pub mod store;
pub mod types;
