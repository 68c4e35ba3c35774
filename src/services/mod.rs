//! Domain services and their registry.
//!
//! # Data Flow
//! ```text
//! poll tick / refresh()
//!     → core.rs (rate limit → FetchClient → store snapshot → DataBus::publish)
//! registry.rs
//!     → owns one service per DomainType, their tasks, and the shutdown signal
//! ```

pub mod core;
pub mod registry;
pub mod streams;
pub mod tokens;
pub mod transfers;

pub use self::core::ServiceCore;
pub use registry::{DataServiceRegistry, DataSources, RefreshReport, RegistrySettings};
pub use streams::StreamService;
pub use tokens::TokenService;
pub use transfers::TransferService;
