//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → ledger adapters → bus + registry → tracker + modals
//!
//! Shutdown (shutdown.rs):
//!     Signal → broadcast to poll tasks → registry joins them
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{bootstrap, StartupError, SyncRuntime};
