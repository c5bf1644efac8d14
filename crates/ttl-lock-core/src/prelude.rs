//! Convenience prelude for TTL lock types.

pub use crate::error::{LockError, LockResult};
pub use crate::lease::{DEFAULT_LEASE, Lease};
pub use crate::noop::NoopBackend;
pub use crate::poll::PollOptions;
pub use crate::record::{LockRecord, ReadPolicy, clock, decode_record};
pub use crate::store::{LockStore, StoreOptions};
pub use crate::traits::{LockBackend, LockProvider};
