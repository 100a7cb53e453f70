// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Execution contexts.
//!
//! An [`ExecutionContext`] exclusively owns one QuickJS runtime and its global
//! scope. Nothing is shared between contexts: two contexts may run on two
//! threads at once, but a single context is used from one thread at a time.

use crate::bag::CapabilityBag;
use crate::bridge;
use crate::config::ContextConfig;
use crate::error::{BridgeError, Resource, Result};
use crate::marshal;
use crate::registry::HostRegistry;
use crate::value::HostValue;
use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Object, Runtime, Type, Value, qjs};
use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::Arc;

/// File name reported for evaluated source
const SCRIPT_NAME: &CStr = c"eval_script";

/// Which step of an evaluation raised an exception
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Parsing the evaluated source
    Parse,
    /// Running script code
    Run,
}

/// Lifecycle state of a context. Disposal is dropping the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Fresh runtime and empty global scope
    Created,
    /// At least one ceiling has been set
    Configured,
    /// At least one evaluation or call has run; ceilings are locked
    Active,
}

/// Ceilings configured on a context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryLimits {
    /// Heap ceiling in bytes
    pub heap_bytes: Option<usize>,
    /// Call-stack ceiling in bytes
    pub stack_bytes: Option<usize>,
}

/// One isolated script runtime plus its global scope.
pub struct ExecutionContext {
    /// The QuickJS context holding the global object
    context: Context,
    /// The runtime owning every value of this context
    runtime: Runtime,
    /// Host callables resolvable by registrations
    registry: Arc<HostRegistry>,
    state: ContextState,
    limits: MemoryLimits,
}

impl ExecutionContext {
    /// Creates a context whose registry holds the standard host library.
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(HostRegistry::with_stdlib()))
    }

    /// Creates a context resolving host callables against `registry`.
    pub fn with_registry(registry: Arc<HostRegistry>) -> Result<Self> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;

        tracing::debug!("Created execution context ({} host callables)", registry.len());

        Ok(Self {
            context,
            runtime,
            registry,
            state: ContextState::Created,
            limits: MemoryLimits::default(),
        })
    }

    /// Creates and configures a context in one step.
    pub fn with_config(registry: Arc<HostRegistry>, config: &ContextConfig) -> Result<Self> {
        let mut context = Self::with_registry(registry)?;
        if let Some(bytes) = config.memory_limit {
            context.set_memory_limit(bytes)?;
        }
        if let Some(bytes) = config.max_stack_size {
            context.set_max_stack_size(bytes)?;
        }
        if let Some(bytes) = config.gc_threshold {
            context.set_gc_threshold(bytes)?;
        }
        Ok(context)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Configured ceilings
    pub fn limits(&self) -> MemoryLimits {
        self.limits
    }

    /// The registry this context resolves host callables against
    pub fn registry(&self) -> &Arc<HostRegistry> {
        &self.registry
    }

    /// Creates an empty capability bag bound to this context's registry.
    pub fn new_bag(&self) -> CapabilityBag {
        CapabilityBag::new(Arc::clone(&self.registry))
    }

    // ==================== Configuration ====================

    /// Sets the heap ceiling. Only allowed before the first evaluation.
    pub fn set_memory_limit(&mut self, bytes: usize) -> Result<()> {
        self.ensure_configurable(Resource::Memory)?;
        self.runtime.set_memory_limit(bytes);
        self.limits.heap_bytes = Some(bytes);
        self.state = ContextState::Configured;
        tracing::debug!("Memory ceiling set to {} bytes", bytes);
        Ok(())
    }

    /// Sets the call-stack ceiling. Only allowed before the first evaluation.
    pub fn set_max_stack_size(&mut self, bytes: usize) -> Result<()> {
        self.ensure_configurable(Resource::Stack)?;
        self.runtime.set_max_stack_size(bytes);
        self.limits.stack_bytes = Some(bytes);
        self.state = ContextState::Configured;
        tracing::debug!("Stack ceiling set to {} bytes", bytes);
        Ok(())
    }

    /// Sets the allocation volume that triggers automatic collection.
    pub fn set_gc_threshold(&mut self, bytes: usize) -> Result<()> {
        self.ensure_configurable(Resource::Memory)?;
        self.runtime.set_gc_threshold(bytes);
        self.state = ContextState::Configured;
        Ok(())
    }

    fn ensure_configurable(&self, resource: Resource) -> Result<()> {
        if self.state == ContextState::Active {
            tracing::warn!("Rejected {} ceiling change on an active context", resource);
            return Err(BridgeError::CeilingLocked(resource));
        }
        Ok(())
    }

    // ==================== Evaluation ====================

    /// Evaluates `source` in the global scope and returns its completion value.
    ///
    /// The source is compiled before anything runs, so a `SyntaxError` result
    /// always means the global scope was left untouched. Exceptions thrown
    /// while running, including a `SyntaxError` raised by `JSON.parse` or a
    /// nested `eval`, are reported as `RuntimeError`.
    pub fn eval(&mut self, source: &str) -> Result<HostValue> {
        self.state = ContextState::Active;
        tracing::debug!("Evaluating {} bytes of source", source.len());

        self.context.with(|ctx| {
            self.check_syntax(&ctx, source)?;
            match ctx.eval::<Value, _>(source) {
                Ok(value) => marshal::to_host(&value),
                Err(err) => Err(self.script_failure(&ctx, err)),
            }
        })
    }

    /// Compiles `source` as a global script without running it.
    fn check_syntax(&self, ctx: &Ctx<'_>, source: &str) -> Result<()> {
        let input = CString::new(source)
            .map_err(|_| BridgeError::SyntaxError("source contains a NUL byte".to_string()))?;
        let flags = (qjs::JS_EVAL_TYPE_GLOBAL | qjs::JS_EVAL_FLAG_COMPILE_ONLY) as i32;

        // SAFETY: both strings are NUL-terminated and outlive the call. The
        // compiled function is released here; a pending exception is drained
        // by `ctx.catch()` below.
        let failed = unsafe {
            let raw = ctx.as_raw().as_ptr();
            let compiled = qjs::JS_Eval(raw, input.as_ptr(), source.len() as _, SCRIPT_NAME.as_ptr(), flags);
            if qjs::JS_VALUE_GET_NORM_TAG(compiled) == qjs::JS_TAG_EXCEPTION as i32 {
                true
            } else {
                qjs::JS_FreeValue(raw, compiled);
                false
            }
        };

        if failed {
            let caught = ctx.catch();
            return Err(self.classify_exception(&caught, Phase::Parse));
        }
        Ok(())
    }

    /// Reads and evaluates a script file.
    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<HostValue> {
        let source = std::fs::read_to_string(path.as_ref())?;
        self.eval(&source)
    }

    /// Calls the global function `function_name` with marshalled `args`.
    pub fn call(&mut self, function_name: &str, args: &[HostValue]) -> Result<HostValue> {
        self.state = ContextState::Active;
        tracing::debug!("Calling '{}' with {} argument(s)", function_name, args.len());

        self.context.with(|ctx| {
            let target: Value = ctx
                .globals()
                .get(function_name)
                .map_err(|e| self.script_failure(&ctx, e))?;
            let Some(function) = target.as_function() else {
                return Err(BridgeError::ReferenceError(function_name.to_string()));
            };

            let mut js_args = Vec::with_capacity(args.len());
            for arg in args {
                js_args.push(marshal::to_script(&ctx, arg).map_err(|e| self.script_failure(&ctx, e))?);
            }

            match function.call::<_, Value>((Rest(js_args),)) {
                Ok(value) => marshal::to_host(&value),
                Err(err) => Err(self.script_failure(&ctx, err)),
            }
        })
    }

    // ==================== Globals ====================

    /// Binds `name` in the global scope, replacing any previous value.
    pub fn set_global(&self, name: &str, value: &HostValue) -> Result<()> {
        self.context.with(|ctx| {
            let js_value = marshal::to_script(&ctx, value).map_err(|e| self.script_failure(&ctx, e))?;
            ctx.globals()
                .set(name, js_value)
                .map_err(|e| self.script_failure(&ctx, e))
        })
    }

    /// Reads a global; absent names read as `Null`.
    pub fn get_global(&self, name: &str) -> Result<HostValue> {
        self.context.with(|ctx| {
            let value: Value = ctx
                .globals()
                .get(name)
                .map_err(|e| self.script_failure(&ctx, e))?;
            marshal::to_host(&value)
        })
    }

    /// Returns true if the global object has a property `name`.
    pub fn has_global(&self, name: &str) -> Result<bool> {
        self.context.with(|ctx| {
            ctx.globals()
                .contains_key(name)
                .map_err(|e| self.script_failure(&ctx, e))
        })
    }

    /// Returns the JavaScript `typeof` tag of a global.
    pub fn typeof_global(&self, name: &str) -> Result<&'static str> {
        self.context.with(|ctx| {
            let value: Value = ctx
                .globals()
                .get(name)
                .map_err(|e| self.script_failure(&ctx, e))?;
            Ok(type_tag(&value))
        })
    }

    // ==================== Registration ====================

    /// Exposes the host callable `callable_ref` as global function `exposed_name`.
    ///
    /// The identifier is resolved before anything is bound, so an unknown
    /// callable leaves the global scope untouched.
    pub fn register_function(&self, exposed_name: &str, callable_ref: &str) -> Result<()> {
        let function = self.registry.resolve(callable_ref)?;
        tracing::debug!("Registering '{}' as global '{}'", callable_ref, exposed_name);

        self.context.with(|ctx| {
            let js_function = bridge::bridge_function(&ctx, exposed_name, function)
                .map_err(|e| self.script_failure(&ctx, e))?;
            ctx.globals()
                .set(exposed_name, js_function)
                .map_err(|e| self.script_failure(&ctx, e))
        })
    }

    /// Materializes `bag` and binds it as global `exposed_name`, replacing
    /// whatever was bound there.
    pub fn register_object(&self, exposed_name: &str, bag: &CapabilityBag) -> Result<()> {
        tracing::debug!("Registering object '{}' ({} members)", exposed_name, bag.len());

        self.context.with(|ctx| {
            let object = bag.materialize(&ctx).map_err(|e| self.script_failure(&ctx, e))?;
            ctx.globals()
                .set(exposed_name, object)
                .map_err(|e| self.script_failure(&ctx, e))
        })
    }

    /// Merges every member of `bag` into global object `object_name`,
    /// creating the object if needed and keeping members the bag does not name.
    pub fn extend_object(&self, object_name: &str, bag: &CapabilityBag) -> Result<()> {
        self.context.with(|ctx| {
            let object = self.global_object(&ctx, object_name)?;
            bag.materialize_into(&ctx, &object)
                .map_err(|e| self.script_failure(&ctx, e))
        })
    }

    /// Sets one property on global object `object_name`, creating it if needed.
    pub fn add_object_property(&self, object_name: &str, property_name: &str, value: &HostValue) -> Result<()> {
        self.context.with(|ctx| {
            let object = self.global_object(&ctx, object_name)?;
            let js_value = marshal::to_script(&ctx, value).map_err(|e| self.script_failure(&ctx, e))?;
            marshal::define_own(&object, property_name, js_value)
                .map_err(|e| self.script_failure(&ctx, e))
        })
    }

    /// Adds one host-backed method to global object `object_name`, creating it if needed.
    pub fn add_object_method(&self, object_name: &str, method_name: &str, callable_ref: &str) -> Result<()> {
        let function = self.registry.resolve(callable_ref)?;

        self.context.with(|ctx| {
            let object = self.global_object(&ctx, object_name)?;
            let js_function = bridge::bridge_function(&ctx, method_name, function)
                .map_err(|e| self.script_failure(&ctx, e))?;
            marshal::define_own(&object, method_name, js_function.into_value())
                .map_err(|e| self.script_failure(&ctx, e))
        })
    }

    /// Returns the object bound at `name`, binding a fresh one when the name
    /// is absent or holds a non-object value.
    fn global_object<'js>(&self, ctx: &Ctx<'js>, name: &str) -> Result<Object<'js>> {
        let globals = ctx.globals();
        let existing: Value = globals.get(name).map_err(|e| self.script_failure(ctx, e))?;

        if let Some(object) = existing.as_object() {
            return Ok(object.clone());
        }

        let object = Object::new(ctx.clone()).map_err(|e| self.script_failure(ctx, e))?;
        globals
            .set(name, object.clone())
            .map_err(|e| self.script_failure(ctx, e))?;
        Ok(object)
    }

    // ==================== Diagnostics ====================

    /// Heap bytes currently attributed to the runtime.
    pub fn memory_usage(&self) -> u64 {
        u64::try_from(self.runtime.memory_usage().memory_used_size).unwrap_or(0)
    }

    /// Runs a full garbage collection pass.
    pub fn gc(&self) {
        self.runtime.run_gc();
        tracing::trace!("Collected; {} bytes in use", self.memory_usage());
    }

    /// Releases the runtime and every value it owns.
    pub fn dispose(self) {
        tracing::debug!("Disposing execution context ({} bytes in use)", self.memory_usage());
        drop(self);
    }

    // ==================== Error classification ====================

    /// Turns an engine failure into a [`BridgeError`], draining any pending exception.
    fn script_failure(&self, ctx: &Ctx<'_>, err: rquickjs::Error) -> BridgeError {
        match err {
            rquickjs::Error::Exception => {
                let caught = ctx.catch();
                self.classify_exception(&caught, Phase::Run)
            }
            rquickjs::Error::Allocation => {
                BridgeError::resource_exceeded(Resource::Memory, "allocation failed")
            }
            other => BridgeError::Engine(other),
        }
    }

    fn classify_exception(&self, caught: &Value<'_>, phase: Phase) -> BridgeError {
        if caught.is_null() || caught.is_undefined() {
            if self.at_memory_ceiling() {
                tracing::warn!("Evaluation aborted at the memory ceiling");
                return BridgeError::resource_exceeded(Resource::Memory, "out of memory");
            }
            return BridgeError::RuntimeError("uncaught exception".to_string());
        }

        let description = marshal::describe_error(caught);

        if let Some(resource) = resource_breach(caught) {
            tracing::warn!("Evaluation aborted at the {} ceiling", resource);
            return BridgeError::resource_exceeded(resource, description);
        }

        match phase {
            Phase::Parse => {
                let message = description
                    .strip_prefix("SyntaxError: ")
                    .unwrap_or(&description)
                    .to_string();
                BridgeError::SyntaxError(message)
            }
            Phase::Run => BridgeError::RuntimeError(description),
        }
    }

    fn at_memory_ceiling(&self) -> bool {
        match self.limits.heap_bytes {
            // Within 5% of the ceiling
            Some(limit) => self.memory_usage().saturating_mul(20) >= (limit as u64).saturating_mul(19),
            None => false,
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("state", &self.state)
            .field("limits", &self.limits)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Matches the errors the engine itself throws when a ceiling is hit.
fn resource_breach(caught: &Value<'_>) -> Option<Resource> {
    if !caught.is_error() {
        return None;
    }
    let object = caught.as_object()?;
    let name: String = object.get("name").ok()?;
    let message: String = object.get("message").ok()?;

    match (name.as_str(), message.as_str()) {
        ("InternalError", "out of memory") => Some(Resource::Memory),
        ("InternalError", "stack overflow") | ("RangeError", "Maximum call stack size exceeded") => {
            Some(Resource::Stack)
        }
        _ => None,
    }
}

/// JavaScript `typeof` for a script value.
fn type_tag(value: &Value<'_>) -> &'static str {
    match value.type_of() {
        Type::Undefined => "undefined",
        Type::Bool => "boolean",
        Type::Int | Type::Float => "number",
        Type::String => "string",
        Type::Symbol => "symbol",
        Type::BigInt => "bigint",
        Type::Function | Type::Constructor => "function",
        _ => "object",
    }
}
