//! Core types for TTL locks: the stored record, the backend contract and the
//! backend-independent lock store.

pub mod error;
pub mod lease;
pub mod noop;
pub mod owner;
pub mod poll;
pub mod prelude;
pub mod record;
pub mod store;
pub mod traits;

pub use error::{LockError, LockResult};
pub use prelude::*;
