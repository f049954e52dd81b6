mod client;

pub use client::ModuleClient;

/// Unix epoch seconds. Every persisted timestamp in the system comes from
/// this single clock so transcript ordering is comparable across tables.
pub fn get_current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}
