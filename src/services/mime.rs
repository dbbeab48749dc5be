//! Extension → content-type lookup for pack entries.
//!
//! The returned strings are part of the wire contract with consumers that
//! branch on MIME values, so `svg` keeps its historical
//! `application/svg+xml` value.

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Resolve the content type of an entry from the literal suffix after its last `.`.
///
/// Matching is case-sensitive. Unknown or missing extensions fall back to
/// `application/octet-stream`.
pub fn resolve(name: &str) -> &'static str {
    let extension = name.rsplit('.').next().unwrap_or(name);
    match extension {
        // Images
        "png" => "image/png",
        "svg" => "application/svg+xml",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        // Audio
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        // Fonts
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        // Data and other
        "json" => "application/json",
        _ => OCTET_STREAM,
    }
}
