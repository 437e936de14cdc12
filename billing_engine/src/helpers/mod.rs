mod hashing;
mod keyed_locks;

pub use hashing::digest_json;
pub use keyed_locks::{KeyedGuard, KeyedLocks};
