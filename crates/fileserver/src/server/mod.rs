//! HTTP request handling for the served directory.
//!
//! [`FileServer`] owns the immutable [`ServerConfig`](crate::config::ServerConfig)
//! and turns a method, raw path and body into a response. It does not know
//! about connections; see [`crate::network`] for the serve loop.

pub mod error;
pub mod handler;

pub use error::RequestError;
pub use handler::{FileServer, RequestMethod};
