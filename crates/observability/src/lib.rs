//! Process-wide tracing setup shared by the server and the admin tooling.

pub mod subscriber;

pub use subscriber::{LogFormat, init_with};

/// Initialize logging filtered by `RUST_LOG` (default `info`), in the format
/// `LOG_FORMAT` selects (JSON unless it says `pretty`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    subscriber::init_with(LogFormat::from_env(), "info");
}
