// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Value marshalling between [`HostValue`] and script values.
//!
//! Every boundary crossing goes through this module: global assignment,
//! function arguments, host callable returns and evaluation results.
//!
//! Numbers follow one rule in both directions: a float without a fractional
//! part becomes an integer. A host callable returning `4.0` is therefore seen
//! by the script, and by whoever reads the result back, as exactly `4`.

use crate::error::{BridgeError, Result};
use crate::value::{HostValue, Mapping};
use rquickjs::convert::Coerced;
use rquickjs::object::Property;
use rquickjs::{Array, Ctx, Object, Type, Value};

/// Maximum nesting followed when converting script values to host values.
///
/// Cycles are detected separately; this only bounds host recursion.
pub const MAX_DEPTH: usize = 1000;

/// Converts a host value into a script value owned by `ctx`.
pub fn to_script<'js>(ctx: &Ctx<'js>, value: &HostValue) -> rquickjs::Result<Value<'js>> {
    match value {
        HostValue::Null => Ok(Value::new_null(ctx.clone())),
        HostValue::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        HostValue::Int(n) => Ok(match i32::try_from(*n) {
            Ok(small) => Value::new_int(ctx.clone(), small),
            Err(_) => Value::new_float(ctx.clone(), *n as f64),
        }),
        HostValue::Float(n) => Ok(match whole_i32(*n) {
            Some(small) => Value::new_int(ctx.clone(), small),
            None => Value::new_float(ctx.clone(), *n),
        }),
        HostValue::String(s) => Ok(rquickjs::String::from_str(ctx.clone(), s)?.into_value()),
        HostValue::Sequence(items) => {
            let array = Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                array.set(i, to_script(ctx, item)?)?;
            }
            Ok(array.into_value())
        }
        HostValue::Mapping(map) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in map {
                define_own(&object, key, to_script(ctx, item)?)?;
            }
            Ok(object.into_value())
        }
    }
}

/// Defines `key` on `object` as an own enumerable data property.
///
/// Unlike a plain assignment this never invokes setters, so keys such as
/// `__proto__` stay ordinary members.
pub(crate) fn define_own<'js>(object: &Object<'js>, key: &str, value: Value<'js>) -> rquickjs::Result<()> {
    object.prop(key, Property::from(value).writable().enumerable().configurable())
}

/// Converts a script value into a host value.
pub fn to_host(value: &Value<'_>) -> Result<HostValue> {
    to_host_at(value, &mut Vec::new())
}

/// `ancestors` holds the composites currently being converted, outermost first.
fn to_host_at<'js>(value: &Value<'js>, ancestors: &mut Vec<Value<'js>>) -> Result<HostValue> {
    let composite = value.is_array() || (value.is_object() && !value.is_function() && !value.is_error());
    if composite {
        if ancestors.iter().any(|ancestor| ancestor == value) {
            return Err(BridgeError::MarshalError("cyclic value cannot be converted".to_string()));
        }
        if ancestors.len() >= MAX_DEPTH {
            return Err(BridgeError::MarshalError(format!(
                "value nesting exceeds {} levels",
                MAX_DEPTH
            )));
        }
        ancestors.push(value.clone());
    }

    let host = match value.type_of() {
        Type::Undefined | Type::Null | Type::Symbol => HostValue::Null,
        Type::Bool => HostValue::Bool(value.as_bool().unwrap_or(false)),
        Type::Int => HostValue::Int(value.as_int().map(i64::from).unwrap_or(0)),
        Type::Float => float_to_host(value.as_float().unwrap_or(f64::NAN)),
        Type::String => match value.as_string() {
            Some(s) => HostValue::String(s.to_string()?),
            None => HostValue::Null,
        },
        Type::BigInt => HostValue::String(value.get::<Coerced<String>>()?.0),
        Type::Function | Type::Constructor => HostValue::String("[Function]".to_string()),
        Type::Exception => HostValue::String(describe_error(value)),
        Type::Array => match value.as_array() {
            Some(array) => {
                let mut items = Vec::with_capacity(array.len());
                for i in 0..array.len() {
                    let item: Value = array.get(i)?;
                    items.push(to_host_at(&item, ancestors)?);
                }
                HostValue::Sequence(items)
            }
            None => HostValue::Null,
        },
        _ => match value.as_object() {
            Some(object) => object_to_host(object, ancestors)?,
            None => HostValue::Null,
        },
    };

    if composite {
        ancestors.pop();
    }
    Ok(host)
}

fn object_to_host<'js>(object: &Object<'js>, ancestors: &mut Vec<Value<'js>>) -> Result<HostValue> {
    let mut map = Mapping::new();
    for key in object.keys::<String>() {
        let key = key?;
        let item: Value = object.get(key.as_str())?;
        map.insert(key, to_host_at(&item, ancestors)?);
    }

    // Plain objects keyed "0".."n-1" come back as sequences
    let sequential = !map.is_empty()
        && map
            .keys()
            .enumerate()
            .all(|(i, key)| key.parse::<usize>().is_ok_and(|n| n == i));

    if sequential {
        Ok(HostValue::Sequence(map.into_values().collect()))
    } else {
        Ok(HostValue::Mapping(map))
    }
}

/// Applies the whole-float rule to a script number.
pub(crate) fn float_to_host(n: f64) -> HostValue {
    // 2^63 is the first float past i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if n.is_finite() && n.fract() == 0.0 && n >= -LIMIT && n < LIMIT {
        HostValue::Int(n as i64)
    } else {
        HostValue::Float(n)
    }
}

fn whole_i32(n: f64) -> Option<i32> {
    if n.is_finite() && n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) {
        Some(n as i32)
    } else {
        None
    }
}

/// Renders an error object as `Name: message`.
pub(crate) fn describe_error(value: &Value<'_>) -> String {
    let Some(object) = value.as_object() else {
        return match to_host(value) {
            Ok(HostValue::Null) | Err(_) => "uncaught exception".to_string(),
            Ok(other) => other.to_plain_string(),
        };
    };

    let name: Option<String> = object.get("name").ok().flatten();
    let message: Option<String> = object.get("message").ok().flatten();

    match (name, message) {
        (Some(name), Some(message)) if !message.is_empty() => format!("{}: {}", name, message),
        (Some(name), _) => name,
        (None, Some(message)) => message,
        (None, None) => match object_to_host(object, &mut Vec::new()) {
            Ok(host) => host.to_string(),
            Err(_) => "[object Object]".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_map;
    use rquickjs::{Context, Runtime};

    fn with_ctx<R>(f: impl FnOnce(Ctx<'_>) -> R) -> R {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(f)
    }

    fn eval_host(source: &str) -> HostValue {
        with_ctx(|ctx| {
            let value: Value = ctx.eval(source).unwrap();
            to_host(&value).unwrap()
        })
    }

    #[test]
    fn test_scalars_from_script() {
        assert_eq!(eval_host("null"), HostValue::Null);
        assert_eq!(eval_host("undefined"), HostValue::Null);
        assert_eq!(eval_host("true"), HostValue::Bool(true));
        assert_eq!(eval_host("40 + 2"), HostValue::Int(42));
        assert_eq!(eval_host("1.5"), HostValue::Float(1.5));
        assert_eq!(eval_host("'hi'"), HostValue::from("hi"));
    }

    #[test]
    fn test_whole_float_becomes_int() {
        assert_eq!(eval_host("Math.sqrt(16)"), HostValue::Int(4));
        assert_eq!(eval_host("2 ** 40"), HostValue::Int(1 << 40));
        assert_eq!(float_to_host(f64::INFINITY), HostValue::Float(f64::INFINITY));
    }

    #[test]
    fn test_composites_from_script() {
        assert_eq!(eval_host("[1, 'a', [true]]"), HostValue::Sequence(vec![
            HostValue::Int(1),
            HostValue::from("a"),
            HostValue::Sequence(vec![HostValue::Bool(true)]),
        ]));
        assert_eq!(
            eval_host("({ host: 'localhost', port: 3306 })"),
            host_map! { "host" => "localhost", "port" => 3306 }
        );
    }

    #[test]
    fn test_numeric_keyed_object_becomes_sequence() {
        assert_eq!(
            eval_host("({ 0: 'a', 1: 'b' })"),
            HostValue::Sequence(vec![HostValue::from("a"), HostValue::from("b")])
        );
        assert_eq!(
            eval_host("({ 1: 'a', 2: 'b' })"),
            host_map! { "1" => "a", "2" => "b" }
        );
        assert_eq!(eval_host("({})"), host_map! {});
    }

    #[test]
    fn test_functions_and_errors() {
        assert_eq!(eval_host("(function f() {})"), HostValue::from("[Function]"));
        assert_eq!(eval_host("new TypeError('bad')"), HostValue::from("TypeError: bad"));
    }

    #[test]
    fn test_cyclic_object_is_rejected() {
        with_ctx(|ctx| {
            let value: Value = ctx.eval("const a = {}; a.self = a; a").unwrap();
            let err = to_host(&value).unwrap_err();
            assert!(matches!(err, BridgeError::MarshalError(_)));
        });
    }

    #[test]
    fn test_deep_acyclic_nesting_converts() {
        let mut expected = HostValue::Int(1);
        for _ in 0..200 {
            expected = HostValue::Sequence(vec![expected]);
        }
        assert_eq!(
            eval_host("let a = 1; for (let i = 0; i < 200; i++) { a = [a]; } a"),
            expected
        );
    }

    #[test]
    fn test_shared_child_is_not_a_cycle() {
        assert_eq!(
            eval_host("const shared = { n: 1 }; ({ left: shared, right: shared })"),
            host_map! { "left" => host_map! { "n" => 1 }, "right" => host_map! { "n" => 1 } }
        );
    }

    #[test]
    fn test_nesting_beyond_limit_is_rejected() {
        with_ctx(|ctx| {
            let value: Value = ctx
                .eval("let b = 1; for (let i = 0; i < 1100; i++) { b = [b]; } b")
                .unwrap();
            let err = to_host(&value).unwrap_err();
            assert!(matches!(err, BridgeError::MarshalError(ref m) if m.contains("nesting")));
        });
    }

    #[test]
    fn test_proto_key_stays_an_own_member() {
        let original = host_map! { "__proto__" => 1, "a" => 2 };
        with_ctx(|ctx| {
            let value = to_script(&ctx, &original).unwrap();
            assert_eq!(to_host(&value).unwrap(), original);

            ctx.globals().set("v", value).unwrap();
            let inherited: bool = ctx.eval("Object.getPrototypeOf(v) === Object.prototype").unwrap();
            assert!(inherited);
        });
    }

    #[test]
    fn test_host_to_script_shapes() {
        with_ctx(|ctx| {
            let list = to_script(&ctx, &HostValue::from(vec![1, 2, 3])).unwrap();
            assert!(list.is_array());

            let map = to_script(&ctx, &host_map! { "k" => "v" }).unwrap();
            assert!(map.is_object() && !map.is_array());

            let whole = to_script(&ctx, &HostValue::Float(4.0)).unwrap();
            assert!(whole.is_int());

            let big = to_script(&ctx, &HostValue::Int(1 << 40)).unwrap();
            assert_eq!(big.as_float(), Some((1u64 << 40) as f64));
        });
    }
}
