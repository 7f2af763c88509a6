//! # TaskVault Shared Library
//!
//! Domain types and infrastructure used by the TaskVault API server.
//!
//! ## Module Organization
//!
//! - `models`: users and tasks with their database queries
//! - `auth`: passwords, tokens, the request gate and the access policy
//! - `crypto`: encryption of task security codes
//! - `cache`: cache-aside reads and writes over a [`cache::CacheStore`]
//! - `redis`: Redis-backed cache store
//! - `db`: connection pool and migrations

pub mod auth;
pub mod cache;
pub mod crypto;
pub mod db;
pub mod models;
pub mod redis;

/// Current version of the TaskVault shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
