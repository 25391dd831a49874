//! Lazy body download and decoding

use crate::checker::executor::send_with;
use crate::checker::CheckContext;
use crate::state::{Method, UrlCheckState};
use crate::Result;
use bytes::Bytes;
use flate2::read::{GzDecoder, ZlibDecoder};
use std::io::Read;
use std::time::Instant;

/// Content encodings the fetcher can undo
pub const SUPPORTED_ENCODINGS: &[&str] = &["gzip", "x-gzip", "deflate"];

/// Downloads the body once per session and caches it
///
/// Later calls return the cached bytes without touching the network.
pub(crate) async fn fetch_content(ctx: &CheckContext, state: &mut UrlCheckState) -> Result<Bytes> {
    if let (true, Some(body)) = (state.has_body, state.body.as_ref()) {
        return Ok(body.clone());
    }

    state.method = Method::Get;
    let started = Instant::now();
    let response = send_with(ctx, state, true).await?;
    let raw = response.body.clone().unwrap_or_default();

    let body = match response.header("content-encoding") {
        Some(encoding) => decode_body(encoding, raw),
        None => raw,
    };

    state.download_time = Some(started.elapsed());
    state.body = Some(body.clone());
    state.has_body = true;
    tracing::debug!(
        "Downloaded {} bytes from {} in {:?}",
        body.len(),
        state.url,
        state.download_time
    );
    Ok(body)
}

/// Undoes a gzip/deflate `Content-Encoding`
///
/// Returns the raw bytes unchanged for other encodings or when the stream is
/// corrupt.
pub fn decode_body(encoding: &str, raw: Bytes) -> Bytes {
    let encoding = encoding.trim().to_ascii_lowercase();
    let mut decoded = Vec::new();
    let outcome = match encoding.as_str() {
        "gzip" | "x-gzip" => GzDecoder::new(raw.as_ref()).read_to_end(&mut decoded),
        "deflate" => ZlibDecoder::new(raw.as_ref()).read_to_end(&mut decoded),
        _ => return raw,
    };

    match outcome {
        Ok(_) => Bytes::from(decoded),
        Err(e) => {
            tracing::warn!("Failed to decode {} body, keeping raw bytes: {}", encoding, e);
            raw
        }
    }
}

/// Media type of a `Content-Type` value without parameters
pub fn media_type(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// True when a `Content-Encoding` is absent or one the fetcher understands
pub fn is_supported_encoding(encoding: Option<&str>) -> bool {
    match encoding.map(|e| e.trim().to_ascii_lowercase()) {
        None => true,
        Some(e) => e == "identity" || SUPPORTED_ENCODINGS.contains(&e.as_str()),
    }
}
