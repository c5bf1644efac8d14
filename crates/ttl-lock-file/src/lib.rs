//! File system backends for TTL locks.

pub mod backend;
pub mod marker;
pub mod name;
mod record_file;

pub use backend::FileBackend;
pub use marker::MarkerFileBackend;
pub use name::lock_file_path;
