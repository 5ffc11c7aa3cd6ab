//! # azdisk Common
//!
//! Shared utilities for the azdisk binaries.
//!
//! ## Logging
//!
//! ```rust,ignore
//! use azdisk_common::{init_logging, LogFormat};
//!
//! init_logging("info", LogFormat::Pretty).unwrap();
//! tracing::info!(disk = "d1", "Reconciling managed disk");
//! ```

pub mod logging;

pub use logging::{init_logging, LogFormat};
