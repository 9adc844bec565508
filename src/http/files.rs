//! File downloads and static file serving.
//!
//! # Responsibilities
//! - Stream file downloads, honouring single `Range` requests (206)
//! - Serve static assets with `Last-Modified`/`ETag` validators (304)
//! - Apply per-extension cache lifetimes to static assets
//! - Announce static bodies through `response.static.before`/`.after`
//!
//! # Design Decisions
//! - Paths containing `..` components are refused outright
//! - The static `ETag` is the SHA-256 of the file contents

use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::event::{EventBus, RESPONSE_STATIC_AFTER, RESPONSE_STATIC_BEFORE};
use crate::http::preload;
use crate::http::range::parse_range;
use crate::http::request::Request;
use crate::http::response::{cache_header_values, http_date, RenderError};

const MINUTES_PER_DAY: u64 = 60 * 24;

/// Reject absolute-escape attempts such as `../secret`.
pub fn is_safe_path(path: &Path) -> bool {
    !path.components().any(|c| matches!(c, Component::ParentDir))
}

/// Cache lifetime in minutes for a static asset, by extension.
pub fn static_cache_minutes(path: &Path) -> Option<u64> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "gif" | "jpg" | "jpeg" | "png" | "bmp" | "webp" | "svg" | "ico" | "swf" | "woff"
        | "woff2" | "ttf" | "otf" => Some(MINUTES_PER_DAY * 365),
        "js" | "css" => Some(MINUTES_PER_DAY * 180),
        "html" | "htm" => Some(60),
        _ => None,
    }
}

fn not_found(headers: &mut HeaderMap, message: &'static str) -> (StatusCode, Body) {
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.remove(header::CONTENT_DISPOSITION);
    (StatusCode::NOT_FOUND, Body::from(message))
}

fn set(headers: &mut HeaderMap, name: header::HeaderName, value: &str) -> Result<(), RenderError> {
    let value = HeaderValue::from_str(value).map_err(|e| RenderError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    headers.insert(name, value);
    Ok(())
}

/// Attachment download of `path`, presented to the client as `file_name`.
pub(crate) async fn download(
    path: &Path,
    file_name: &str,
    headers: &mut HeaderMap,
    request: &Request,
) -> Result<(StatusCode, Body), RenderError> {
    if !is_safe_path(path) {
        tracing::warn!(path = ?path, "Refusing download outside the served tree");
        return Ok(not_found(headers, "File not found"));
    }
    let size = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            tracing::warn!(path = ?path, "Download file not found");
            return Ok(not_found(headers, "File not found"));
        }
    };
    tracing::info!(path = ?path, size, "Sending file");

    let safe_name = file_name.replace(['"', '\r', '\n'], "");
    set(
        headers,
        header::CONTENT_DISPOSITION,
        &format!("attachment; filename=\"{safe_name}\""),
    )?;
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert("content-description", HeaderValue::from_static("File Transfer"));
    headers
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("application/octet-stream"));

    let range = request
        .header(header::RANGE.as_str())
        .and_then(|value| parse_range(value, size));
    let (status, start, length) = match range {
        Some(range) => {
            set(headers, header::CONTENT_RANGE, &range.content_range(size))?;
            (StatusCode::PARTIAL_CONTENT, range.start, range.len())
        }
        None => (StatusCode::OK, 0, size),
    };
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    if request.is_head() {
        return Ok((status, Body::empty()));
    }

    let io_err = |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
    if start > 0 {
        file.seek(SeekFrom::Start(start)).await.map_err(io_err)?;
    }
    let body = Body::from_stream(ReaderStream::new(file.take(length)));
    Ok((status, body))
}

/// Static asset with conditional GET support.
pub(crate) async fn serve_static(
    path: &Path,
    headers: &mut HeaderMap,
    request: &Request,
    events: &EventBus,
) -> Result<(StatusCode, Body), RenderError> {
    if !is_safe_path(path) {
        tracing::warn!(path = ?path, "Refusing static file outside the served tree");
        return Ok(not_found(headers, "File not found."));
    }
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta,
        _ => {
            tracing::warn!(path = ?path, "Static file not found");
            return Ok(not_found(headers, "File not found."));
        }
    };
    let contents = tokio::fs::read(path).await.map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let modified: DateTime<Utc> = meta
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());
    let etag = format!("\"{}\"", hex::encode(Sha256::digest(&contents)));

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    set(headers, header::CONTENT_TYPE, mime.as_ref())?;
    set(headers, header::LAST_MODIFIED, &http_date(modified))?;
    set(headers, header::ETAG, &etag)?;

    if not_modified(request, &etag, modified) {
        tracing::debug!(path = ?path, "Static file not modified");
        return Ok((StatusCode::NOT_MODIFIED, Body::empty()));
    }

    if let Some(minutes) = static_cache_minutes(path) {
        for (name, value) in cache_header_values(minutes) {
            set(headers, header::HeaderName::from_static(name), &value)?;
        }
    }
    let is_html = matches!(mime.subtype().as_str(), "html");
    if is_html && !request.is_head() && !request.is_pjax() {
        if let Some(link) = preload::link_header(&String::from_utf8_lossy(&contents)) {
            set(headers, header::LINK, &link)?;
        }
    }

    if request.is_head() {
        return Ok((StatusCode::OK, Body::empty()));
    }
    tracing::info!(path = ?path, "Sending static file");
    let mut served: PathBuf = path.to_path_buf();
    let body = match events.trigger_first(RESPONSE_STATIC_BEFORE, &mut served) {
        Some(Value::Bool(true)) => Body::empty(),
        Some(Value::String(replacement)) => Body::from(replacement),
        _ => Body::from(contents),
    };
    events.trigger(RESPONSE_STATIC_AFTER, &mut served);
    Ok((StatusCode::OK, body))
}

fn not_modified(request: &Request, etag: &str, modified: DateTime<Utc>) -> bool {
    if let Some(candidates) = request.header(header::IF_NONE_MATCH.as_str()) {
        let matched = candidates.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.trim_start_matches("W/") == etag
        });
        if matched {
            return true;
        }
    }

    request
        .header(header::IF_MODIFIED_SINCE.as_str())
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
        .is_some_and(|since| since.timestamp() >= modified.timestamp())
}
