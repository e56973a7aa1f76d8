//! Filesystem side of the server.
//!
//! This module provides:
//! - Request path resolution confined to the served directory
//! - Directory listing and HTML rendering
//! - Streaming downloads and uploads through a bounded buffer
//!
//! # Security
//!
//! Containment is lexical: `.` and `..` segments are normalized before the
//! path is checked against the base directory. Symlinks inside the tree are
//! followed by the operating system when the file is opened.

pub mod listing;
pub mod resolver;
pub mod transfer;

pub use listing::{list_directory, render_listing, DirectoryEntry};
pub use resolver::{resolve, resolve_url_path, PathEscape};
pub use transfer::{download_body, upload, TransferError, BUFFER_SIZE};
