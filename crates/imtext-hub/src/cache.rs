//! Local tokenizer cache management.

use imtext_core::{CacheLayout, ImTextError, Result};
use std::path::{Path, PathBuf};

/// Turn a model identifier into a single path component.
///
/// ASCII letters, digits, `-`, `_` and `.` are kept; every other byte is
/// percent-encoded, so distinct identifiers never share a key.
/// `medicalai/ClinicalBERT` becomes `medicalai%2FClinicalBERT`.
pub fn model_cache_key(model_id: &str) -> Result<String> {
    if model_id.is_empty() || model_id == "." || model_id == ".." {
        return Err(ImTextError::InvalidArgument(format!(
            "'{}' is not a valid model identifier",
            model_id
        )));
    }

    let mut key = String::with_capacity(model_id.len());
    for byte in model_id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            key.push(byte as char);
        } else {
            key.push_str(&format!("%{:02X}", byte));
        }
    }
    Ok(key)
}

/// Directory holding the cached tokenizer for `model_id`.
pub fn tokenizer_cache_dir(root: &Path, model_id: &str, layout: CacheLayout) -> Result<PathBuf> {
    match layout {
        CacheLayout::Shared => Ok(root.to_path_buf()),
        CacheLayout::PerModel => Ok(root.join(model_cache_key(model_id)?)),
    }
}

/// Remove the whole tokenizer cache.
pub fn clear_cache(root: &Path) -> Result<()> {
    if root.exists() {
        std::fs::remove_dir_all(root)?;
        tracing::info!(path = %root.display(), "Cleared tokenizer cache");
    }
    Ok(())
}

/// Get cache size in bytes.
pub fn cache_size(root: &Path) -> Result<u64> {
    if !root.exists() {
        return Ok(0);
    }

    let mut size = 0u64;
    for entry in walkdir::WalkDir::new(root).into_iter().flatten() {
        if entry.file_type().is_file() {
            if let Ok(metadata) = entry.metadata() {
                size += metadata.len();
            }
        }
    }
    Ok(size)
}
