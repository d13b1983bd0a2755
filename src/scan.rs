//! Locating photographs on disk for the CLI

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};

/// Extensions the image decoder handles
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "tif", "tiff", "webp", "bmp"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Supported images in a folder (non-recursive, sorted), or the path itself
/// when it names a single file
pub fn collect_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(anyhow::anyhow!("Path does not exist: {}", path.display()));
    }

    let mut images = Vec::new();
    for entry in std::fs::read_dir(path)
        .with_context(|| format!("Failed to read directory {}", path.display()))?
    {
        let entry_path = entry?.path();
        if entry_path.is_file() && is_supported_image(&entry_path) {
            images.push(entry_path);
        }
    }

    images.sort();
    Ok(images)
}
