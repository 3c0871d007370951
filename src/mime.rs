use std::path::Path;

/// The type a file reports for itself, judged by its extension alone.
/// Contents are never inspected.
pub fn mime_from_extension(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => {
            tracing::warn!(
                "Unrecognized extension '{}' on {}, falling back to application/octet-stream",
                extension,
                path.display()
            );
            "application/octet-stream"
        }
    }
}
