//! # ts-fileserver
//!
//! Exposes a single directory tree over HTTP on a private overlay network,
//! read-only or with uploads enabled.
//!
//! ## Overview
//!
//! - **GET** on a directory renders an HTML listing of its children.
//! - **GET** on a file streams it as `application/octet-stream`.
//! - **POST** stores the request body at the path, creating parent
//!   directories, when writing is enabled.
//!
//! Every request path is normalized lexically and must stay inside the
//! served directory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Listener (overlay network / TCP)            │
//! ├──────────────────────────────────────────────────────┤
//! │                 network::serve                       │
//! │        one task per connection, axum router          │
//! ├──────────────────────────────────────────────────────┤
//! │               server::FileServer                     │
//! │     method dispatch, status + error rendering        │
//! ├───────────────┬──────────────────┬───────────────────┤
//! │   resolver    │     listing      │     transfer      │
//! │ path escape   │  HTML rendering  │ 1 MiB streaming   │
//! └───────────────┴──────────────────┴───────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fileserver::{network, FileServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = FileServer::new(ServerConfig::new("/srv/share", false)?);
//!     let listener = network::bind("100.64.0.1:80".parse()?).await?;
//!     network::serve(listener, server, network::shutdown_signal()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading, defaults and [`ServerConfig`]
//! - [`files`]: Path resolution, listings and streaming transfers
//! - [`server`]: The request handler
//! - [`network`]: Listener abstraction and serve loop

pub mod config;
pub mod files;
pub mod network;
pub mod server;

// Re-export config types for convenience
pub use config::{Config, ConfigError, ServerConfig, ServerConfigError};

// Re-export files types for convenience
pub use files::{DirectoryEntry, PathEscape, TransferError};

// Re-export server types for convenience
pub use server::{FileServer, RequestError, RequestMethod};
