// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host function bridge.
//!
//! Wraps a resolved [`HostFunction`] as a variadic script function. Each call
//! marshals the script arguments in order, runs the host callable on the
//! calling thread and marshals the result back. A [`HostError`] surfaces in
//! script as a thrown `Error`, so `try/catch` works as usual.
//!
//! The callable sees only its arguments, never the owning context.
//!
//! [`HostError`]: crate::registry::HostError

use crate::marshal;
use crate::registry::HostFunction;
use crate::value::HostValue;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Value};

/// Creates a script function named `exposed_name` that forwards to `function`.
pub fn bridge_function<'js>(
    ctx: &Ctx<'js>,
    exposed_name: &str,
    function: HostFunction,
) -> rquickjs::Result<Function<'js>> {
    let exposed = exposed_name.to_string();

    let js_function = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            let mut host_args = Vec::with_capacity(args.0.len());
            for arg in args.0.iter() {
                let host = marshal::to_host(arg).map_err(|e| {
                    Exception::throw_message(&ctx, &format!("{}: {}", exposed, e))
                })?;
                host_args.push(host);
            }

            tracing::trace!(
                "Invoking host callable '{}' as '{}' with {} argument(s)",
                function.id(),
                exposed,
                host_args.len()
            );

            let result: HostValue = function.invoke(&host_args).map_err(|e| {
                tracing::debug!("Host callable '{}' failed: {}", function.id(), e);
                Exception::throw_message(&ctx, &format!("{}: {}", exposed, e))
            })?;

            marshal::to_script(&ctx, &result)
        },
    )?;

    js_function.with_name(exposed_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HostError;
    use rquickjs::{Context, Runtime};

    fn run(function: HostFunction, source: &str) -> HostValue {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let bridged = bridge_function(&ctx, "f", function).unwrap();
            ctx.globals().set("f", bridged).unwrap();
            let value: Value = ctx.eval(source).unwrap();
            marshal::to_host(&value).unwrap()
        })
    }

    #[test]
    fn test_forwards_any_arity() {
        let count = HostFunction::new("count_args", |args| Ok(HostValue::Int(args.len() as i64)));
        assert_eq!(run(count.clone(), "f()"), HostValue::Int(0));
        assert_eq!(run(count, "f(1, 'two', [3], {four: 4})"), HostValue::Int(4));
    }

    #[test]
    fn test_arguments_marshalled_in_order() {
        let echo = HostFunction::new("echo", |args| Ok(HostValue::Sequence(args.to_vec())));
        assert_eq!(
            run(echo, "f('a', 2.5, null)"),
            HostValue::Sequence(vec![HostValue::from("a"), HostValue::Float(2.5), HostValue::Null])
        );
    }

    #[test]
    fn test_whole_float_return_is_integer_in_script() {
        let four = HostFunction::new("four", |_| Ok(HostValue::Float(4.0)));
        assert_eq!(run(four, "Number.isInteger(f()) && f() === 4"), HostValue::Bool(true));
    }

    #[test]
    fn test_host_error_is_catchable() {
        let fail = HostFunction::new("fail", |_| Err(HostError::new("nope")));
        assert_eq!(
            run(fail, "try { f(); 'unreached' } catch (e) { e.message }"),
            HostValue::from("f: nope")
        );
    }

    #[test]
    fn test_function_name() {
        let noop = HostFunction::new("noop", |_| Ok(HostValue::Null));
        assert_eq!(run(noop, "f.name"), HostValue::from("f"));
    }
}
