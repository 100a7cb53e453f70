// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Standard host library.
//!
//! Implements:
//! - Strings: `upper`, `lower`, `trim`, `strlen`, `str_repeat`, `implode`
//! - Sequences: `array_sum`, `count`, `array_reverse`
//! - Math: `sqrt`, `pow`, `abs`, `round`
//! - Hashing: `md5`, `sha256`
//! - JSON: `json_encode`, `json_decode`

use crate::marshal::float_to_host;
use crate::registry::{HostError, HostRegistry};
use crate::value::HostValue;
use sha2::{Digest, Sha256};

type HostResult = Result<HostValue, HostError>;

/// Largest string, in bytes, that `str_repeat` will build on the host heap.
pub const MAX_REPEAT_BYTES: usize = 64 << 20;

/// Registers every standard callable into `registry`.
pub fn install(registry: &mut HostRegistry) {
    registry
        .register("upper", |args| Ok(string_arg(args, 0, "upper")?.to_uppercase().into()))
        .register("lower", |args| Ok(string_arg(args, 0, "lower")?.to_lowercase().into()))
        .register("trim", |args| Ok(string_arg(args, 0, "trim")?.trim().into()))
        .register("strlen", |args| {
            Ok(HostValue::Int(string_arg(args, 0, "strlen")?.chars().count() as i64))
        })
        .register("str_repeat", str_repeat)
        .register("implode", implode)
        .register("array_sum", array_sum)
        .register("count", count)
        .register("array_reverse", |args| {
            let mut items = sequence_arg(args, 0, "array_reverse")?.to_vec();
            items.reverse();
            Ok(HostValue::Sequence(items))
        })
        .register("sqrt", |args| Ok(number(number_arg(args, 0, "sqrt")?.sqrt())))
        .register("pow", |args| {
            let base = number_arg(args, 0, "pow")?;
            let exponent = number_arg(args, 1, "pow")?;
            Ok(number(base.powf(exponent)))
        })
        .register("abs", |args| match args.first() {
            Some(HostValue::Int(n)) => Ok(n
                .checked_abs()
                .map_or(HostValue::Float((*n as f64).abs()), HostValue::Int)),
            _ => Ok(number(number_arg(args, 0, "abs")?.abs())),
        })
        .register("round", round)
        .register("md5", |args| {
            let digest = md5::compute(string_arg(args, 0, "md5")?.as_bytes());
            Ok(format!("{:x}", digest).into())
        })
        .register("sha256", |args| {
            let digest = Sha256::digest(string_arg(args, 0, "sha256")?.as_bytes());
            Ok(hex::encode(digest).into())
        })
        .register("json_encode", |args| {
            let value = args.first().cloned().unwrap_or_default();
            serde_json::to_string(&value)
                .map(HostValue::String)
                .map_err(|e| HostError::new(format!("json_encode: {}", e)))
        })
        .register("json_decode", |args| {
            let text = string_arg(args, 0, "json_decode")?;
            serde_json::from_str::<HostValue>(&text)
                .map_err(|e| HostError::new(format!("json_decode: {}", e)))
        });
}

fn str_repeat(args: &[HostValue]) -> HostResult {
    let text = string_arg(args, 0, "str_repeat")?;
    let times = number_arg(args, 1, "str_repeat")?;
    if !(0.0..=f64::from(u32::MAX)).contains(&times) {
        return Err(HostError::new("str_repeat: count must be a non-negative integer"));
    }

    let times = times as usize;
    match text.len().checked_mul(times) {
        Some(total) if total <= MAX_REPEAT_BYTES => Ok(text.repeat(times).into()),
        _ => Err(HostError::new(format!(
            "str_repeat: result would exceed {} bytes",
            MAX_REPEAT_BYTES
        ))),
    }
}

fn implode(args: &[HostValue]) -> HostResult {
    // Accepts (separator, pieces) and the legacy (pieces) form
    let (separator, pieces) = match args {
        [HostValue::Sequence(pieces)] => (String::new(), pieces.as_slice()),
        [separator, HostValue::Sequence(pieces), ..] => (separator.to_plain_string(), pieces.as_slice()),
        _ => return Err(HostError::new("implode: expected (separator, sequence)")),
    };

    let joined = pieces
        .iter()
        .map(HostValue::to_plain_string)
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(joined.into())
}

fn array_sum(args: &[HostValue]) -> HostResult {
    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut is_float = false;

    for item in sequence_arg(args, 0, "array_sum")? {
        match item {
            HostValue::Int(n) if !is_float => match int_total.checked_add(*n) {
                Some(sum) => int_total = sum,
                None => {
                    is_float = true;
                    float_total = int_total as f64 + *n as f64;
                }
            },
            other => {
                if !is_float {
                    is_float = true;
                    float_total = int_total as f64;
                }
                float_total += coerce_number(other).unwrap_or(0.0);
            }
        }
    }

    if is_float {
        Ok(number(float_total))
    } else {
        Ok(HostValue::Int(int_total))
    }
}

fn count(args: &[HostValue]) -> HostResult {
    match args.first() {
        Some(HostValue::Sequence(items)) => Ok(HostValue::Int(items.len() as i64)),
        Some(HostValue::Mapping(map)) => Ok(HostValue::Int(map.len() as i64)),
        Some(HostValue::Null) | None => Ok(HostValue::Int(0)),
        Some(_) => Ok(HostValue::Int(1)),
    }
}

fn round(args: &[HostValue]) -> HostResult {
    let value = number_arg(args, 0, "round")?;
    let precision = match args.get(1) {
        Some(p) => coerce_number(p).unwrap_or(0.0) as i32,
        None => 0,
    };
    let factor = 10f64.powi(precision);
    // Half away from zero, like f64::round
    Ok(number((value * factor).round() / factor))
}

fn number(n: f64) -> HostValue {
    float_to_host(n)
}

fn coerce_number(value: &HostValue) -> Option<f64> {
    match value {
        HostValue::Int(n) => Some(*n as f64),
        HostValue::Float(n) => Some(*n),
        HostValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        HostValue::String(s) => s.trim().parse().ok(),
        HostValue::Null => Some(0.0),
        _ => None,
    }
}

fn string_arg(args: &[HostValue], index: usize, name: &str) -> Result<String, HostError> {
    match args.get(index) {
        Some(HostValue::Sequence(_)) | Some(HostValue::Mapping(_)) => Err(HostError::new(format!(
            "{}: argument {} must be a string",
            name,
            index + 1
        ))),
        Some(value) => Ok(value.to_plain_string()),
        None => Err(HostError::new(format!("{}: missing argument {}", name, index + 1))),
    }
}

fn number_arg(args: &[HostValue], index: usize, name: &str) -> Result<f64, HostError> {
    let value = args
        .get(index)
        .ok_or_else(|| HostError::new(format!("{}: missing argument {}", name, index + 1)))?;
    coerce_number(value).ok_or_else(|| {
        HostError::new(format!(
            "{}: argument {} must be a number, got {}",
            name,
            index + 1,
            value.type_name()
        ))
    })
}

fn sequence_arg<'a>(args: &'a [HostValue], index: usize, name: &str) -> Result<&'a [HostValue], HostError> {
    match args.get(index) {
        Some(HostValue::Sequence(items)) => Ok(items),
        Some(other) => Err(HostError::new(format!(
            "{}: argument {} must be a sequence, got {}",
            name,
            index + 1,
            other.type_name()
        ))),
        None => Err(HostError::new(format!("{}: missing argument {}", name, index + 1))),
    }
}
