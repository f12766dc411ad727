//! Ephemeral-execution adapter for the RFP proposal service.
//!
//! Each request gets an [`InvocationContext`] with a private scratch
//! directory and an exclusive database handle. Both are released when the
//! invocation ends, on success, error, timeout, panic or drop. Anything a
//! later request must see is written to durable storage via
//! [`InvocationContext::resolve_storage`] or to the database.
//!
//! # Example
//!
//! ```rust,ignore
//! use rfp_runtime::prelude::*;
//!
//! let adapter = EphemeralAdapter::from_config(AdapterConfig::from_env()?).await?;
//!
//! let mut ctx = adapter.begin_invocation().await?;
//! let target = ctx.resolve_storage("proposals/Q-1/boq.xlsx").await?;
//! target.write(&workbook).await?;
//! ctx.end_invocation().await;
//! ```

mod adapter;
mod context;
mod health;
mod observer;
mod target;

pub use adapter::EphemeralAdapter;
pub use context::{InvocationContext, ReleaseOutcome};
pub use health::{ComponentHealth, ComponentStatus, HealthReport, HealthStatus};
pub use target::DurableStorageTarget;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{DurableStorageTarget, EphemeralAdapter, InvocationContext, ReleaseOutcome};
    pub use futures::FutureExt;
    pub use rfp_core::{AdapterConfig, AdapterError, ErrorKind, RuntimeMode, StorageSettings};
}
