//! Blob naming: `uploads/YYYY/MM/DD/<uuid><suffix>`.

use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

use crate::error::{BlobError, Result};

pub const UPLOAD_PREFIX: &str = "uploads";
pub const DEFAULT_SUFFIX: &str = ".pdf";

/// Fresh, collision-free name for an upload. Two calls never return the same name.
pub fn build_blob_name(filename: Option<&str>) -> String {
    build_blob_name_at(filename, Utc::now())
}

pub fn build_blob_name_at(filename: Option<&str>, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}{}",
        UPLOAD_PREFIX,
        now.format("%Y/%m/%d"),
        Uuid::new_v4().simple(),
        blob_suffix(filename)
    )
}

/// Extension of the original filename (with the dot), or `.pdf`.
pub fn blob_suffix(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| DEFAULT_SUFFIX.to_string())
}

/// Reject names that could escape the container or address nothing.
pub fn validate_blob_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BlobError::InvalidInput("blob name is empty".to_string()));
    }
    if name.starts_with('/') || name.split('/').any(|part| part.is_empty() || part == "..") {
        return Err(BlobError::InvalidInput(format!("invalid blob name: {}", name)));
    }
    if name.chars().any(|c| c.is_control() || c == '?' || c == '#' || c == '\\') {
        return Err(BlobError::InvalidInput(format!("invalid blob name: {}", name)));
    }
    Ok(())
}
