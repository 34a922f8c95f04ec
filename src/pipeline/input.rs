//! Input resolution: turn a user-supplied path or URL into a [`SourceDocument`].
//!
//! ## Media type
//!
//! The declared media type decides the extraction strategy, so it is resolved
//! before any bytes are inspected, in this order:
//!
//! 1. an explicit override from the caller (`--media-type`)
//! 2. the `Content-Type` header, for downloads
//! 3. the file extension
//!
//! Anything that cannot be resolved is declared `application/octet-stream`,
//! which the classifier maps to `Unsupported`.
//!
//! ## Size limit
//!
//! Documents above [`MAX_DOCUMENT_BYTES`](crate::config::MAX_DOCUMENT_BYTES) are rejected here, before the
//! extraction pipeline sees them. Local files are checked via metadata so an
//! oversized file is never read into memory.

use crate::document::{check_size, SourceDocument};
use crate::error::MedExplainError;
use crate::pipeline::classify::{classify, media_type_for_path, DocumentKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Declared type for inputs whose type cannot be determined.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a document held in memory.
///
/// If the input is a URL, download it; otherwise read the local file.
pub async fn resolve_document(
    input: &str,
    media_type: Option<&str>,
    timeout_secs: u64,
) -> Result<SourceDocument, MedExplainError> {
    if is_url(input) {
        download_url(input, media_type, timeout_secs).await
    } else {
        read_local(input, media_type).await
    }
}

/// Read a local file, validating existence, permissions and size.
async fn read_local(path_str: &str, media_type: Option<&str>) -> Result<SourceDocument, MedExplainError> {
    let path = PathBuf::from(path_str);

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| io_error(e, &path))?;
    if !metadata.is_file() {
        return Err(MedExplainError::FileNotFound { path });
    }
    check_size(metadata.len())?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| io_error(e, &path))?;

    let media_type = media_type
        .map(str::to_string)
        .or_else(|| media_type_for_path(&path).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_MEDIA_TYPE.to_string());

    debug!(
        "Resolved local document: {} ({} bytes, {})",
        path.display(),
        bytes.len(),
        media_type
    );
    Ok(SourceDocument::new(display_name(&path), bytes, media_type))
}

fn io_error(e: std::io::Error, path: &Path) -> MedExplainError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => MedExplainError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => MedExplainError::FileNotFound {
            path: path.to_path_buf(),
        },
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Download a URL into memory.
async fn download_url(
    url: &str,
    media_type: Option<&str>,
    timeout_secs: u64,
) -> Result<SourceDocument, MedExplainError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| MedExplainError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let classify_err = |e: reqwest::Error| {
        if e.is_timeout() {
            MedExplainError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(classify_err)?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    if let Some(len) = response.content_length() {
        check_size(len)?;
    }

    let filename = extract_filename(url);
    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let media_type = declared_type(media_type, header_type.as_deref(), &filename);

    let bytes = response.bytes().await.map_err(classify_err)?;
    check_size(bytes.len() as u64)?;

    info!("Downloaded {} bytes ({})", bytes.len(), media_type);
    Ok(SourceDocument::new(filename, bytes.to_vec(), media_type))
}

/// Choose the declared type of a download.
///
/// Servers often send a generic `Content-Type` such as
/// `application/octet-stream`; a header that maps to no strategy is ignored in
/// favour of the file extension.
fn declared_type(explicit: Option<&str>, header: Option<&str>, filename: &str) -> String {
    if let Some(t) = explicit {
        return t.to_string();
    }
    if let Some(h) = header {
        if classify(h) != DocumentKind::Unsupported {
            return h.to_string();
        }
    }
    media_type_for_path(Path::new(filename))
        .map(str::to_string)
        .or_else(|| header.map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_MEDIA_TYPE.to_string())
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}
