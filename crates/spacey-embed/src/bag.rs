// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Capability bags.
//!
//! A [`CapabilityBag`] is a detached description of a namespace object:
//! properties, host-backed methods and nested bags. It holds no script state,
//! so the same bag can be materialized into any number of contexts, each of
//! which gets its own independent object graph.
//!
//! ```rust,ignore
//! let mut database = context.new_bag();
//! database.register_property("host", "localhost").register_property("port", 3306);
//!
//! let mut app = context.new_bag();
//! app.register_property("name", "MyApp")
//!     .register_function("hash", "md5")?
//!     .register_object("database", &database);
//!
//! context.register_object("App", &app)?;
//! assert_eq!(context.eval("App.database.port")?, HostValue::Int(3306));
//! ```

use crate::bridge;
use crate::error::Result;
use crate::marshal;
use crate::registry::{HostFunction, HostRegistry};
use crate::value::HostValue;
use indexmap::IndexMap;
use rquickjs::{Ctx, Object};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum Member {
    Property(HostValue),
    Method(HostFunction),
    Object(CapabilityBag),
}

/// Reusable template of properties, methods and nested objects.
#[derive(Clone)]
pub struct CapabilityBag {
    registry: Arc<HostRegistry>,
    members: IndexMap<String, Member>,
}

impl CapabilityBag {
    /// Creates an empty bag whose methods resolve against `registry`.
    pub fn new(registry: Arc<HostRegistry>) -> Self {
        Self {
            registry,
            members: IndexMap::new(),
        }
    }

    /// Sets a property, replacing any member of the same name.
    pub fn register_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<HostValue>,
    ) -> &mut Self {
        self.members.insert(name.into(), Member::Property(value.into()));
        self
    }

    /// Adds a host-backed method.
    ///
    /// `callable_ref` is resolved immediately; an unknown identifier fails
    /// here and leaves the bag unchanged.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        callable_ref: &str,
    ) -> Result<&mut Self> {
        let function = self.registry.resolve(callable_ref)?;
        self.members.insert(name.into(), Member::Method(function));
        Ok(self)
    }

    /// Nests a snapshot of `child` under `name`.
    pub fn register_object(&mut self, name: impl Into<String>, child: &CapabilityBag) -> &mut Self {
        self.members.insert(name.into(), Member::Object(child.clone()));
        self
    }

    /// Number of immediate members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the bag has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns true if an immediate member is named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Builds a fresh script object graph from this bag.
    pub fn materialize<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
        let object = Object::new(ctx.clone())?;
        self.materialize_into(ctx, &object)?;
        Ok(object)
    }

    /// Assigns every member of this bag onto an existing object, depth-first.
    ///
    /// Members of `target` that the bag does not name are left alone.
    pub fn materialize_into<'js>(&self, ctx: &Ctx<'js>, target: &Object<'js>) -> rquickjs::Result<()> {
        for (name, member) in &self.members {
            match member {
                Member::Property(value) => {
                    marshal::define_own(target, name, marshal::to_script(ctx, value)?)?;
                }
                Member::Method(function) => {
                    let method = bridge::bridge_function(ctx, name, function.clone())?;
                    marshal::define_own(target, name, method.into_value())?;
                }
                Member::Object(child) => {
                    marshal::define_own(target, name, child.materialize(ctx)?.into_value())?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CapabilityBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, member) in &self.members {
            match member {
                Member::Property(value) => map.entry(name, value),
                Member::Method(function) => map.entry(name, function),
                Member::Object(child) => map.entry(name, child),
            };
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    fn bag() -> CapabilityBag {
        CapabilityBag::new(Arc::new(HostRegistry::with_stdlib()))
    }

    #[test]
    fn test_overwrite_keeps_siblings() {
        let mut config = bag();
        config
            .register_property("a", 1)
            .register_property("b", 2)
            .register_property("a", 3);

        assert_eq!(config.len(), 2);
        assert!(config.contains("a") && config.contains("b"));
        assert_eq!(format!("{:?}", config), r#"{"a": Int(3), "b": Int(2)}"#);
    }

    #[test]
    fn test_unknown_callable_leaves_bag_unchanged() {
        let mut utils = bag();
        let err = utils.register_function("broken", "nonexistent_function").unwrap_err();

        assert!(matches!(err, BridgeError::HostCallableNotFound(_)));
        assert!(utils.is_empty());
    }

    #[test]
    fn test_nested_object_is_snapshot() {
        let mut child = bag();
        child.register_property("value", "before");

        let mut parent = bag();
        parent.register_object("child", &child);
        child.register_property("value", "after");

        assert_eq!(
            format!("{:?}", parent),
            r#"{"child": {"value": String("before")}}"#
        );
    }
}
