//! Directory listing and HTML rendering.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fmt::Display;
use std::path::Path;

use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{percent_encode, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped when an entry name becomes a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <meta name="viewport" content="width=device-width, initial-scale=1.0" />
        <title>ts-fileserver</title>
        <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/sakura.css/css/sakura.css" type="text/css">
    </head>
<body>
"#;

const UPLOAD_FORM: &str = r#"<script>
function uploadOne(file) {
    return new Promise((resolve) => {
        const base = window.location.pathname.replace(/\/+$/, "")
        const url = base + "/" + encodeURIComponent(file.name)
        const status = document.getElementById("status")
        const xhr = new XMLHttpRequest()
        xhr.open("POST", url, true)
        xhr.upload.onprogress = function (event) {
            if (event.lengthComputable) {
                const percentComplete = (event.loaded / event.total) * 100
                status.innerText = file.name + ": " + percentComplete.toFixed(2) + "%"
            }
        }
        xhr.onloadend = function () {
            if (xhr.status !== 200) {
                status.innerText = file.name + ": " + xhr.status + " " + xhr.responseText
            }
            resolve(xhr.status)
        }
        xhr.send(file)
    })
}

async function upload() {
    const input = document.getElementById("file")
    for (const file of input.files) {
        await uploadOne(file)
    }
    document.getElementById("status").innerText = "Finished"
    window.location.reload()
}
</script>

<input type="file" id="file" multiple /><button onclick="upload()">Upload</button>
<p id="status"></p>
"#;

const HTML_TAIL: &str = "</ul>\n</body>\n</html>\n";

/// A single child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Link target: the request path joined with the encoded name.
    pub href: String,
    /// Whether this entry is a directory.
    pub is_dir: bool,
}

impl DirectoryEntry {
    /// Build an entry whose link is `request_path` joined with `name`.
    pub fn new(request_path: &str, name: String, is_dir: bool) -> Self {
        let href = entry_link(request_path, &name);
        Self { name, href, is_dir }
    }

    /// Build an entry from a name as read from the filesystem.
    ///
    /// The link encodes the raw bytes of `name`, so names that are not valid
    /// UTF-8 still point at the right file. Only the visible text is lossy.
    pub fn from_os_name(request_path: &str, name: &OsStr, is_dir: bool) -> Self {
        let href = join_link(request_path, encode_os_name(name));
        let name = name.to_string_lossy().into_owned();
        Self { name, href, is_dir }
    }
}

/// Join a raw request path and an entry name into a link.
///
/// The request path is used as received (already URL-encoded); the name is
/// encoded as a single path segment.
pub fn entry_link(request_path: &str, name: &str) -> String {
    join_link(request_path, utf8_percent_encode(name, PATH_SEGMENT))
}

/// Runs of `/` collapse to one, so the link always starts with a single `/`
/// and cannot be read as a scheme-relative URL.
fn join_link(request_path: &str, segment: impl Display) -> String {
    let mut link = String::with_capacity(request_path.len() + 16);
    for part in request_path.split('/').filter(|part| !part.is_empty()) {
        link.push('/');
        link.push_str(part);
    }
    link.push('/');
    link.push_str(&segment.to_string());
    link
}

#[cfg(unix)]
fn encode_os_name(name: &OsStr) -> String {
    use std::os::unix::ffi::OsStrExt;

    percent_encode(name.as_bytes(), PATH_SEGMENT).to_string()
}

#[cfg(not(unix))]
fn encode_os_name(name: &OsStr) -> String {
    percent_encode(name.to_string_lossy().as_bytes(), PATH_SEGMENT).to_string()
}

/// List the immediate children of `dir`.
///
/// Directories come first, then entries sorted case-insensitively by name.
/// Children whose metadata cannot be read are listed as files.
pub async fn list_directory(
    dir: &Path,
    request_path: &str,
) -> std::io::Result<Vec<DirectoryEntry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        // `metadata` follows symlinks, so a link to a directory lists as one.
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        entries.push(DirectoryEntry::from_os_name(
            request_path,
            &entry.file_name(),
            is_dir,
        ));
    }

    entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    });

    Ok(entries)
}

/// Render a listing page for `dir`.
///
/// The upload form is only part of the page when `writable` is set.
pub fn render_listing(dir: &Path, entries: &[DirectoryEntry], writable: bool) -> String {
    let mut html = String::with_capacity(HTML_HEAD.len() + UPLOAD_FORM.len() + entries.len() * 64);

    html.push_str(HTML_HEAD);
    if writable {
        html.push_str(UPLOAD_FORM);
    }

    html.push_str(&format!(
        "<h1>Files in {}</h1>\n<ul>\n",
        encode_text(&dir.to_string_lossy())
    ));
    for entry in entries {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            encode_double_quoted_attribute(&entry.href),
            encode_text(&entry.name)
        ));
    }
    html.push_str(HTML_TAIL);

    html
}
