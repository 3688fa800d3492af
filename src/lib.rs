//! Hoplink - A horizontally scalable short-URL service
//!
//! This library provides the core functionality for the Hoplink service:
//! URL ingestion with deduplication, cache-backed redirect dispatch, and
//! an asynchronous analytics pipeline.
//!
//! # Architecture
//! - `storage`: Primary record store (sea-orm) and data access
//! - `cache`: Redirect cache adapters (redis / in-memory)
//! - `events`: Partitioned, ordered-per-key hit event bus
//! - `analytics`: Counter store, consumer group, query layer, enrichment
//! - `services`: URL ingestion, code allocation, redirect dispatch
//! - `api`: HTTP services and middleware
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and server mode
//! - `system`: Logging initialization

pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
