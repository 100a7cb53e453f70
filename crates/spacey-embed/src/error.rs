// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for embedded script contexts

use std::fmt;
use thiserror::Error;

/// Result type for embedding operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// A resource governed by a context ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Heap bytes owned by the runtime
    Memory,
    /// Call-stack bytes used by the interpreter
    Stack,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Memory => write!(f, "memory"),
            Resource::Stack => write!(f, "stack"),
        }
    }
}

/// Errors that can occur while embedding scripts
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Malformed source; no global state was touched
    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    /// Exception thrown by the script while it was running
    #[error("{0}")]
    RuntimeError(String),

    /// `call` target is missing or not callable
    #[error("ReferenceError: '{0}' is not a callable global")]
    ReferenceError(String),

    /// Host callable identifier did not resolve at registration time
    #[error("Host callable '{0}' is not registered")]
    HostCallableNotFound(String),

    /// Memory or stack ceiling breached during an evaluation
    #[error("{resource} ceiling exceeded: {message}")]
    ResourceExceeded {
        /// Which ceiling was hit
        resource: Resource,
        /// Engine diagnostic
        message: String,
    },

    /// Ceiling change attempted after the first evaluation
    #[error("The {0} ceiling can only be changed before the first evaluation")]
    CeilingLocked(Resource),

    /// Value could not be converted across the boundary
    #[error("Marshalling error: {0}")]
    MarshalError(String),

    /// Engine failure that is not a script exception
    #[error("Engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Create a new ResourceExceeded error
    pub fn resource_exceeded(resource: Resource, message: impl Into<String>) -> Self {
        Self::ResourceExceeded {
            resource,
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true for failures raised by the script itself.
    pub fn is_script_error(&self) -> bool {
        matches!(
            self,
            Self::SyntaxError(_) | Self::RuntimeError(_) | Self::ReferenceError(_)
        )
    }
}
