//! Core abstractions for the RFP invocation adapter.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `AdapterConfig` - Explicit, per-deployment configuration
//! - `AdapterError` - Configuration / connectivity / timeout taxonomy
//! - `InvocationId` - Unique invocation identifier
//! - `InvocationState` / `LifecyclePhase` - Invocation lifecycle tracking
//! - `ExecutionLimits` - Wall-clock and upload limits

mod config;
mod context;
mod error;
mod lifecycle;
mod limits;

pub use config::*;
pub use context::*;
pub use error::*;
pub use lifecycle::*;
pub use limits::*;
