#[cfg(feature = "runtime")]
pub mod log_dirs;
pub mod scheduler;
pub mod time_source;
#[cfg(feature = "runtime")]
pub mod tracing_setup;
