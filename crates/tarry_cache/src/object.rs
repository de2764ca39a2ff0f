//! Atomic, integrity-checked object files.
//!
//! Each object is stored as a single file under the cache root with a binary
//! header containing magic bytes, format version, and a checksum of the
//! payload. Writes go to a temporary sibling file that is then renamed over
//! the target, so readers never observe a partially written object.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tarry_common::{codec, ContentHash};

use crate::error::CacheError;

/// Magic bytes identifying a tarry object file.
const OBJECT_MAGIC: [u8; 4] = *b"TRRY";

/// Current object format version. Increment on breaking changes to
/// the header or payload format.
const OBJECT_FORMAT_VERSION: u32 = 1;

/// Distinguishes temporary files written concurrently by one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Header prepended to every object for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectHeader {
    /// Magic bytes: must be `b"TRRY"`.
    pub magic: [u8; 4],

    /// Object format version.
    pub format_version: u32,

    /// Content hash of the payload (for integrity checks).
    pub checksum: ContentHash,
}

/// Byte store rooted at a cache directory.
///
/// Paths passed to [`save`](Self::save) and [`load`](Self::load) are relative
/// to the root. Loading is fail-safe: a missing, truncated or corrupted object
/// yields `None`.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Creates a store rooted at the given cache directory.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Returns the cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the absolute location of an object.
    pub fn object_path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Writes raw bytes as an object, creating parent directories.
    ///
    /// Layout: 4-byte header length (little-endian) + header + payload.
    pub fn save(&self, relative: &Path, payload: &[u8]) -> Result<(), CacheError> {
        let path = self.object_path(relative);

        let header = ObjectHeader {
            magic: OBJECT_MAGIC,
            format_version: OBJECT_FORMAT_VERSION,
            checksum: ContentHash::from_bytes(payload),
        };
        let header_bytes = codec::encode(&header).map_err(|e| CacheError::Codec {
            path: path.clone(),
            source: e,
        })?;

        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(payload);

        write_atomic(&path, &output)
    }

    /// Reads an object's payload, validating its header.
    ///
    /// Returns `None` if the file doesn't exist, the header is invalid, the
    /// format version doesn't match, or the checksum doesn't verify.
    pub fn load(&self, relative: &Path) -> Option<Vec<u8>> {
        let path = self.object_path(relative);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable cache object");
                return None;
            }
        };

        let payload = validate(&raw);
        if payload.is_none() {
            tracing::warn!(path = %path.display(), "ignoring corrupt cache object");
        }
        payload.map(<[u8]>::to_vec)
    }

    /// Encodes, compresses and saves a serializable value.
    pub fn save_object<T: Serialize>(&self, relative: &Path, value: &T) -> Result<(), CacheError> {
        let encoded = codec::encode(value)
            .and_then(|bytes| codec::compress(&bytes))
            .map_err(|e| CacheError::Codec {
                path: self.object_path(relative),
                source: e,
            })?;
        self.save(relative, &encoded)
    }

    /// Loads and decodes a value saved with [`save_object`](Self::save_object).
    ///
    /// Undecodable payloads are treated like missing ones.
    pub fn load_object<T: DeserializeOwned>(&self, relative: &Path) -> Option<T> {
        let payload = self.load(relative)?;
        match codec::decompress(&payload).and_then(|bytes| codec::decode(&bytes)) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    path = %self.object_path(relative).display(),
                    error = %e,
                    "ignoring undecodable cache object"
                );
                None
            }
        }
    }
}

/// Checks the header of a raw object file and returns its payload.
fn validate(raw: &[u8]) -> Option<&[u8]> {
    // Need at least 4 bytes for the header length
    if raw.len() < 4 {
        return None;
    }

    let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
    if raw.len() < 4 + header_len {
        return None;
    }

    let header: ObjectHeader = codec::decode(&raw[4..4 + header_len]).ok()?;
    if header.magic != OBJECT_MAGIC || header.format_version != OBJECT_FORMAT_VERSION {
        return None;
    }

    let payload = &raw[4 + header_len..];
    if ContentHash::from_bytes(payload) != header.checksum {
        return None;
    }
    Some(payload)
}

/// Writes `bytes` to a temporary sibling of `path` and renames it into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let io_err = |path: &Path, source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pid = std::process::id();
    let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = parent.join(format!(".{file_name}.tmp-{pid}-{unique}"));

    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
