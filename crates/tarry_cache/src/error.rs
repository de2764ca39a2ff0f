//! Error types for cache operations.

use std::path::PathBuf;

use tarry_common::CodecError;

/// Errors that can occur during cache operations.
///
/// Loads are fail-safe and never produce these; they surface from writes,
/// where silently losing a record would break later reuse.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An object could not be encoded for storage.
    #[error("failed to encode object for {path}: {source}")]
    Codec {
        /// The object path being written.
        path: PathBuf,
        /// The underlying codec error.
        source: CodecError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = CacheError::Io {
            path: PathBuf::from("/tmp/cache/stage_results/ab/cdef"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("cache I/O error"));
        assert!(msg.contains("stage_results"));
    }

    #[test]
    fn codec_error_display() {
        let err = CacheError::Codec {
            path: PathBuf::from("hook_states/demo.hook"),
            source: CodecError::Encode {
                reason: "sequence length unknown".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("hook_states/demo.hook"));
        assert!(msg.contains("sequence length unknown"));
    }
}
