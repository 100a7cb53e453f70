// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-embed
//!
//! Embeddable JavaScript contexts for Rust hosts, backed by QuickJS.
//!
//! This crate lets a host application:
//! - Run script snippets in isolated [`ExecutionContext`]s
//! - Exchange data as [`HostValue`]s, marshalled in both directions
//! - Expose host callables from a [`HostRegistry`] as script functions
//! - Describe namespace objects as [`CapabilityBag`]s and materialize them
//! - Bound each context with memory and stack ceilings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spacey_embed::{ExecutionContext, HostValue};
//!
//! # fn main() -> spacey_embed::Result<()> {
//! let mut context = ExecutionContext::new()?;
//! context.set_memory_limit(10 * 1024 * 1024)?;
//!
//! context.register_function("shout", "upper")?;
//! context.set_global("count", &HostValue::Int(42))?;
//!
//! assert_eq!(context.eval("count * 2")?, HostValue::Int(84));
//! assert_eq!(
//!     context.eval("['hello', 'world'].map(x => shout(x)).join(' ')")?,
//!     HostValue::from("HELLO WORLD")
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Host callables
//!
//! ```rust,no_run
//! use spacey_embed::{ExecutionContext, HostRegistry, HostValue};
//! use std::sync::Arc;
//!
//! # fn main() -> spacey_embed::Result<()> {
//! let mut registry = HostRegistry::with_stdlib();
//! registry.register("greet", |args| {
//!     let name = args.first().map(HostValue::to_plain_string).unwrap_or_default();
//!     Ok(format!("Hello, {}!", name).into())
//! });
//!
//! let mut context = ExecutionContext::with_registry(Arc::new(registry))?;
//! context.register_function("greet", "greet")?;
//! assert_eq!(context.eval("greet('World')")?, HostValue::from("Hello, World!"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bag;
pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod marshal;
pub mod registry;
pub mod stdlib;
pub mod value;

// Re-exports
pub use bag::CapabilityBag;
pub use config::ContextConfig;
pub use context::{ContextState, ExecutionContext, MemoryLimits};
pub use error::{BridgeError, Resource, Result};
pub use registry::{HostCallable, HostError, HostFunction, HostRegistry};
pub use value::{HostValue, Mapping};

pub use rquickjs;

/// Version of the spacey-embed crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
