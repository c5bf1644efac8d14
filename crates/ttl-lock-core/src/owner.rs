//! Owner identifiers.

use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Generates an owner identifier unique to this process and call.
///
/// Format: `{hostname}:{process_id}:{counter}:{random:016x}`
pub fn generate() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    let random: u64 = rand::thread_rng().r#gen();

    format!("{}:{}:{}:{:016x}", host, process::id(), counter, random)
}

/// Treats an empty owner string as "not supplied".
pub fn non_empty(owner: Option<&str>) -> Option<&str> {
    owner.filter(|o| !o.is_empty())
}
