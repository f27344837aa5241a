//! Utility functions and helpers for the visual matcher

use std::path::Path;

/// Image extensions accepted by the indexer
pub(crate) const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Normalize a path to use forward slashes
pub(crate) fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Validate that a file has an allowed extension
pub(crate) fn validate_file_extension(filename: &str, allowed_extensions: &[&str]) -> bool {
    if let Some(ext) = Path::new(filename).extension() {
        if let Some(ext_str) = ext.to_str() {
            return allowed_extensions
                .iter()
                .any(|&e| e.eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

/// Map a catalog `image_path` to the URL path it is served under.
///
/// Absolute paths below `image_dir` are made relative to it; everything else
/// is treated as already relative.
pub(crate) fn public_image_path(image_dir: &Path, image_path: &str, mount: &str) -> String {
    let normalized = normalize_path(image_path);
    let root = normalize_path(&image_dir.to_string_lossy());
    let root = root.trim_end_matches('/');

    let relative = match normalized.strip_prefix(root) {
        Some(rest) if !root.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => normalized.as_str(),
    };

    format!(
        "{}/{}",
        mount.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Turn a file stem like `red_leather-chair` into `red leather chair`
pub(crate) fn display_name(stem: &str) -> String {
    stem.split(|c| c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
