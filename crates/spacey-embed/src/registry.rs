// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host callable registry.
//!
//! Scripts never reach host code by reflection. The host fills a
//! [`HostRegistry`] at startup, and every registration against a context
//! resolves its identifier here immediately, so a typo fails at registration
//! time rather than on the first script call.

use crate::error::{BridgeError, Result};
use crate::value::HostValue;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a host callable.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HostError(String);

impl HostError {
    /// Create a new host error with the given message
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for HostError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

impl From<&str> for HostError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

/// Shared host callable. Receives marshalled arguments in call order.
pub type HostCallable =
    Arc<dyn Fn(&[HostValue]) -> std::result::Result<HostValue, HostError> + Send + Sync>;

/// A resolved host callable together with the identifier it was resolved from.
#[derive(Clone)]
pub struct HostFunction {
    id: Arc<str>,
    callable: HostCallable,
}

impl HostFunction {
    /// Wraps a closure as a host function handle.
    pub fn new<F>(id: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&[HostValue]) -> std::result::Result<HostValue, HostError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            callable: Arc::new(f),
        }
    }

    /// Registry identifier of this callable
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Invokes the callable.
    pub fn invoke(&self, args: &[HostValue]) -> std::result::Result<HostValue, HostError> {
        (self.callable)(args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({})", self.id)
    }
}

/// Identifier → host callable table, populated by the host.
#[derive(Clone, Default)]
pub struct HostRegistry {
    functions: FxHashMap<String, HostFunction>,
}

impl HostRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with the standard host library.
    pub fn with_stdlib() -> Self {
        let mut registry = Self::new();
        crate::stdlib::install(&mut registry);
        registry
    }

    /// Registers `f` under `id`, replacing any previous callable of that name.
    pub fn register<F>(&mut self, id: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&[HostValue]) -> std::result::Result<HostValue, HostError> + Send + Sync + 'static,
    {
        let id = id.into();
        let function = HostFunction::new(id.as_str(), f);
        self.functions.insert(id, function);
        self
    }

    /// Resolves an identifier to a callable handle.
    pub fn resolve(&self, id: &str) -> Result<HostFunction> {
        self.functions
            .get(id)
            .cloned()
            .ok_or_else(|| BridgeError::HostCallableNotFound(id.to_string()))
    }

    /// Returns true if `id` resolves.
    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered callables
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
