pub mod api;
pub mod bridge;
pub mod cancel;
pub mod constants;
pub mod format;
pub mod lifecycle;
pub mod models;
pub mod queue;
pub mod snapshot;
pub mod sync;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
