//! # TaskVault API Server Library
//!
//! REST backend for users and tasks: bearer-token authentication, tasks with
//! an encrypted security code, file uploads, and a cache-aside layer in
//! front of PostgreSQL.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `response`: Success envelope
//! - `middleware`: Rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod response;
pub mod routes;
