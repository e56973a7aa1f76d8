//! Per-request errors and their HTTP rendering.

use std::io;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::files::{PathEscape, TransferError};

/// Errors that end a single request.
///
/// The display text is sent to the client as the response body.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request path normalizes outside the served directory.
    #[error("nice try!")]
    PathEscape(#[from] PathEscape),

    /// The target could not be stat'ed.
    #[error("can't stat item: {0}")]
    StatFailure(#[source] io::Error),

    /// The target directory could not be listed.
    #[error("can't list folder entries: {0}")]
    ListFailure(#[source] io::Error),

    /// The target file could not be opened for reading.
    #[error("can't open file to be read: {0}")]
    OpenFailure(#[source] io::Error),

    /// The target exists but is neither a directory nor a regular file.
    #[error("not a regular file")]
    NotARegularFile,

    /// Storing an upload failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// An upload was attempted while writing is disabled.
    #[error("i'm afraid i can't do that")]
    WriteForbidden,

    /// The upload target is an existing directory.
    #[error("path should not be a existing folder")]
    ExistingDirectoryConflict,

    /// The method is neither GET nor POST.
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl RequestError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::PathEscape(_)
            | RequestError::ExistingDirectoryConflict
            | RequestError::NotARegularFile => StatusCode::BAD_REQUEST,
            RequestError::StatFailure(e) if e.kind() == io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            RequestError::StatFailure(_)
            | RequestError::ListFailure(_)
            | RequestError::OpenFailure(_)
            | RequestError::Transfer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RequestError::WriteForbidden => StatusCode::FORBIDDEN,
            RequestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, self.to_string()).into_response();
        if matches!(self, RequestError::MethodNotAllowed) {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, POST"));
        }
        response
    }
}
