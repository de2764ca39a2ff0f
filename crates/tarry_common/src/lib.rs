//! Shared foundational types used across the tarry crates.
//!
//! This crate provides the content hash used as the cache key everywhere, the
//! dynamic [`Value`] passed between stages, and the codec that turns any
//! serializable type into the bytes that get hashed and persisted.

#![warn(missing_docs)]

pub mod codec;
pub mod hash;
pub mod value;

pub use codec::{compress, decode, decompress, encode, CodecError};
pub use hash::ContentHash;
pub use value::Value;
