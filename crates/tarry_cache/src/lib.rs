//! Content-addressed persistence for stage results and hook trigger state.
//!
//! Everything lives below one cache directory:
//!
//! ```text
//! <cache_dir>/
//!   stage_results/<hex[0:2]>/<hex[2:]>   one PersistedInvocation per stage hash
//!   hook_states/<qualified-hook-name>    one HookState per hook
//! ```
//!
//! Reads are fail-safe: a missing or damaged object is a cache miss, never an
//! error. Writes are atomic per object.

#![warn(missing_docs)]

pub mod error;
pub mod hook_state;
pub mod inflight;
pub mod object;
pub mod record;
pub mod results;

pub use error::CacheError;
pub use hook_state::{HookArgumentState, HookState, HookStateStore, MAX_FILE_NAME_LEN};
pub use inflight::{InFlightRegistry, JoinError};
pub use object::ObjectStore;
pub use record::{PersistedArg, PersistedInvocation};
pub use results::ResultStore;
