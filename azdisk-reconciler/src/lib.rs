//! # azdisk Reconciler
//!
//! Desired-state reconciliation for a single cloud managed disk and its
//! attachment to a virtual machine.
//!
//! One invocation reads the live disk, compares it with the declared
//! [`DiskSpec`], issues the smallest set of provider calls that closes the
//! gap, and reports whether anything changed.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐   ┌──────────────┐
//! │  Normalizer  │──▶│   Snapshot   │──▶│   Diff   │──▶│    Apply     │
//! │ (DiskSpec →  │   │    Reader    │   │  Engine  │   │   Executor   │
//! │  parameters) │   └──────────────┘   └──────────┘   └──────┬───────┘
//! └──────────────┘                                            ▼
//!                                                   ┌──────────────────┐
//!                                                   │    Attachment    │
//!                                                   │    Reconciler    │
//!                                                   └────────┬─────────┘
//!                                                            ▼
//!                                              ComputeProvider trait
//!                                      (MockProvider / AzureProvider)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use azdisk_reconciler::{DiskSpec, MockProvider, Reconciler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = MockProvider::new().with_resource_group("rg1", "eastus");
//!     let spec = DiskSpec::new("rg1", "d1").with_size_gb(4);
//!
//!     let outcome = Reconciler::new(provider).reconcile(&spec).await.unwrap();
//!     assert!(outcome.changed);
//! }
//! ```

pub mod apply;
pub mod attachment;
pub mod diff;
pub mod error;
pub mod mock;
pub mod normalize;
pub mod reconcile;
pub mod request;
pub mod resource_id;
pub mod snapshot;
pub mod traits;
pub mod types;

#[cfg(feature = "azure")]
pub mod azure;

pub use error::{ProviderError, ReconcileError, Result};
pub use mock::{MockFixture, MockProvider, ProviderCall};
pub use reconcile::{ReconcileOutcome, Reconciler, ReportedState};
pub use request::DiskRequest;
pub use resource_id::ResourceId;
pub use traits::ComputeProvider;
pub use types::*;

#[cfg(feature = "azure")]
pub use azure::{AzureConfig, AzureProvider};
