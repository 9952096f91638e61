//! Table-scoped operations on the local store.

mod kv;
mod pinned;

pub use kv::*;
pub use pinned::*;
