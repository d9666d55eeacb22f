use alloc::string::String;

use crate::storage::StorageError;

/// Errors from the decode pipeline and the pixel cache.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ImageError {
    #[error("failed to open {path}: {source}")]
    StreamOpen { path: String, source: StorageError },

    #[error("invalid header: {0}")]
    HeaderInvalid(&'static str),

    #[error("{format} image too large: {width}x{height}")]
    DimensionTooLarge {
        format: &'static str,
        width: u32,
        height: u32,
    },

    #[error("row decode failed: {0}")]
    RowDecode(&'static str),

    #[error("cache allocation failed for {width}x{height}")]
    CacheAlloc { width: u32, height: u32 },

    #[error("cache write failed: {0}")]
    CacheWrite(StorageError),

    #[error("cache file invalid: {0}")]
    CacheFormat(&'static str),
}
