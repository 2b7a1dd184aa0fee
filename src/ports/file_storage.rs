//! FileStorage port - object storage on the hosted backend (listing photos).

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Object too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("Storage service error: {0}")]
    Service(String),
}

/// Bucketed object storage.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores `bytes` at `bucket/path`, replacing any existing object, and
    /// returns the object's public URL.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Public URL for an object. Does not check that it exists.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Rejects paths that are empty, absolute, or step outside the bucket.
pub fn validate_object_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty()
        || path.starts_with('/')
        || path.split('/').any(|segment| segment.is_empty() || segment == "..")
    {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_relative_paths() {
        assert!(validate_object_path("listings/abc/photo.jpg").is_ok());
    }

    #[test]
    fn rejects_traversal_and_absolute_paths() {
        for path in ["", "/etc/passwd", "a/../b", "a//b", "trailing/"] {
            assert!(
                matches!(validate_object_path(path), Err(StorageError::InvalidPath(_))),
                "accepted {path:?}"
            );
        }
    }
}
