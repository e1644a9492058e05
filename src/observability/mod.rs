//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! instrument engines produce:
//!     → tracing events (logging.rs installs the subscriber)
//!     → metrics facade calls (exporter.rs installs the recorder)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - The library never installs anything on its own; binaries call these

pub mod exporter;
pub mod logging;

pub use exporter::{build_prometheus_recorder, install_prometheus_recorder};
pub use logging::init_logging;
