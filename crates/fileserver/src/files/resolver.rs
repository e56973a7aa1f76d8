//! Request path resolution with lexical containment.
//!
//! Request paths are joined onto the base directory and normalized without
//! touching the filesystem. Anything that normalizes outside the base is
//! rejected. Symlinks are not resolved, so a link inside the tree that points
//! elsewhere is still served.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// The request path normalizes to a location outside the base directory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("path escapes the served directory: {0}")]
pub struct PathEscape(pub String);

/// Join `request_path` onto `base` and normalize `.` and `..` lexically.
///
/// `base` is expected to be absolute and already normalized. The returned
/// path is either `base` itself or nested under it.
pub fn resolve(base: &Path, request_path: &str) -> Result<PathBuf, PathEscape> {
    let mut resolved = base.to_path_buf();

    for component in Path::new(request_path).components() {
        match component {
            Component::Normal(segment) => resolved.push(segment),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                // Popping at the filesystem root is a no-op.
                resolved.pop();
            }
            Component::Prefix(_) => return Err(PathEscape(request_path.to_string())),
        }
    }

    // `Path::starts_with` compares whole components, so "/srvx" is not
    // considered to be under "/srv".
    if resolved.starts_with(base) {
        Ok(resolved)
    } else {
        Err(PathEscape(request_path.to_string()))
    }
}

/// Percent-decode a raw URL path and resolve it under `base`.
///
/// A path that does not decode to UTF-8 cannot name anything under the base
/// and is treated as an escape.
pub fn resolve_url_path(base: &Path, raw_path: &str) -> Result<PathBuf, PathEscape> {
    let decoded = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| PathEscape(raw_path.to_string()))?;

    // A NUL byte can never be part of a path the OS accepts.
    if decoded.contains('\0') {
        return Err(PathEscape(raw_path.to_string()));
    }

    resolve(base, &decoded)
}

/// Make `path` absolute against the current directory and normalize it
/// lexically. Used once at startup for the configured root.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
