//! Core services for the roamsim eSIM app.
//!
//! The UI layer drives three mechanisms from here: bounded status polling of
//! the order-fulfillment backend (new eSIM orders and data top-ups),
//! discovery of a usable VPN node, and wallet back-end selection. All remote
//! collaborators may be slow, unreliable or partially available, so every
//! wait is bounded and every polling session is cancellable.

pub mod config;
pub mod error_report;
pub mod fulfillment_client;
pub mod http_client;
pub mod node_directory_client;
pub mod polling;
pub mod services;

// Re-exports for the UI layer
pub use services::discovery;
pub use services::order_tracker;
pub use services::topup_tracker;
pub use services::wallet;

use env_logger::{Builder, Env, Target};
use std::io::Write;

/// Initialize logging for a host binary: debug default in debug builds,
/// errors routed to stderr.
pub fn init_logging() {
    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();
}
