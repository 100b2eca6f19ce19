//! # Protobuf JSON Mapping
//!
//! Requests and responses travel as JSON, but they still have to look like the protobuf
//! messages the servers decode them into. This module walks a JSON document alongside its
//! [`MessageDescriptor`] and produces a normalized copy:
//!
//! - keys are rewritten to proto field names (`toolName` becomes `tool_name`)
//! - `null` fields are dropped, except for `google.protobuf.Value` fields
//! - enum indexes become value names
//! - 32-bit integers given as strings become numbers; 64-bit integers keep the
//!   representation they arrived in
//!
//! Every problem found is reported as `<field path>: <problem>`, e.g.
//! `tools[0].function.name: expected string, got number`. All problems are collected before
//! failing so one pass shows everything wrong with a document.

use crate::descriptor::{DescriptorPool, FieldDescriptor, FieldKind, MessageDescriptor};
use crate::error::{Direction, Result, RpcError};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

const SNIPPET_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Keep fields holding their default value (`""`, `0`, `false`, `[]`, ...).
    pub emit_default_values: bool,
    /// Drop fields the descriptor does not declare instead of failing.
    pub ignore_unknown_fields: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            emit_default_values: true,
            ignore_unknown_fields: false,
        }
    }
}

/// Validates a request document. Defaults are kept and unknown fields rejected.
pub fn encode_request(pool: &DescriptorPool, type_name: &str, value: &Value) -> Result<Value> {
    normalize(pool, type_name, value, Direction::Request, DecodeOptions::default())
}

/// Validates and normalizes a decoded response document.
pub fn decode_response(
    pool: &DescriptorPool,
    type_name: &str,
    value: &Value,
    options: DecodeOptions,
) -> Result<Value> {
    normalize(pool, type_name, value, Direction::Response, options)
}

pub fn normalize(
    pool: &DescriptorPool,
    type_name: &str,
    value: &Value,
    direction: Direction,
    options: DecodeOptions,
) -> Result<Value> {
    let descriptor = pool.message(type_name)?;
    let mut walker = Walker {
        pool,
        options,
        problems: Vec::new(),
    };
    let out = walker.message(descriptor, value, "");
    match out {
        Some(v) if walker.problems.is_empty() => Ok(v),
        _ => Err(RpcError::validation(direction, walker.problems.join("; "))),
    }
}

/// Parses a response body as JSON. An empty body is the empty message.
pub fn parse_body(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|e| {
        RpcError::Decode(format!(
            "response is not valid JSON ({}): {}",
            e,
            snippet(body)
        ))
    })
}

/// The first 200 characters of a body, for error messages.
pub fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut out: String = text.chars().take(SNIPPET_LEN).collect();
    if text.chars().count() > SNIPPET_LEN {
        out.push_str("...");
    }
    out
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn at(path: &str) -> &str {
    if path.is_empty() {
        "(root)"
    } else {
        path
    }
}

struct Walker<'a> {
    pool: &'a DescriptorPool,
    options: DecodeOptions,
    problems: Vec<String>,
}

impl<'a> Walker<'a> {
    fn fail(&mut self, path: &str, problem: impl AsRef<str>) -> Option<Value> {
        self.problems.push(format!("{}: {}", at(path), problem.as_ref()));
        None
    }

    fn message(&mut self, desc: &MessageDescriptor, value: &Value, path: &str) -> Option<Value> {
        let object = match value {
            Value::Object(o) => o,
            other => {
                return self.fail(
                    path,
                    format!("expected object for {}, got {}", desc.full_name, json_type(other)),
                )
            }
        };

        let mut out = Map::new();
        let mut seen = HashSet::new();
        let mut ok = true;
        for (key, field_value) in object {
            let Some(field) = desc.find_field(key) else {
                if !self.options.ignore_unknown_fields {
                    self.fail(&join(path, key), format!("unknown field in {}", desc.full_name));
                    ok = false;
                }
                continue;
            };
            let field_path = join(path, &field.name);
            if !seen.insert(field.name.as_str()) {
                self.fail(&field_path, "duplicate field (given by both proto and JSON name)");
                ok = false;
                continue;
            }
            if field_value.is_null() && !(field.kind == FieldKind::Value && !field.repeated) {
                continue;
            }
            match self.field(field, field_value, &field_path) {
                Some(v) => {
                    if self.options.emit_default_values || !self.is_default(field, &v) {
                        out.insert(field.name.clone(), v);
                    }
                }
                None => ok = false,
            }
        }

        for field in desc.fields.iter().filter(|f| f.required) {
            let present = [object.get(&field.name), object.get(&field.json_name)]
                .into_iter()
                .flatten()
                .any(|v| !v.is_null() && v.as_str() != Some(""));
            if !present {
                self.fail(&join(path, &field.name), "required field missing");
                ok = false;
            }
        }

        ok.then_some(Value::Object(out))
    }

    fn field(&mut self, field: &FieldDescriptor, value: &Value, path: &str) -> Option<Value> {
        if let FieldKind::Map(key_kind, value_kind) = &field.kind {
            return self.map(key_kind, value_kind, value, path);
        }
        if !field.repeated {
            return self.single(&field.kind, value, path);
        }
        let items = match value {
            Value::Array(items) => items,
            other => return self.fail(path, format!("expected array, got {}", json_type(other))),
        };
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, i);
            if item.is_null() && field.kind != FieldKind::Value {
                self.fail(&item_path, "null is not allowed in a repeated field");
                ok = false;
                continue;
            }
            match self.single(&field.kind, item, &item_path) {
                Some(v) => out.push(v),
                None => ok = false,
            }
        }
        ok.then_some(Value::Array(out))
    }

    fn map(
        &mut self,
        key_kind: &FieldKind,
        value_kind: &FieldKind,
        value: &Value,
        path: &str,
    ) -> Option<Value> {
        let entries = match value {
            Value::Object(o) => o,
            other => return self.fail(path, format!("expected object, got {}", json_type(other))),
        };
        let mut out = Map::new();
        let mut ok = true;
        for (key, entry) in entries {
            let entry_path = format!("{}[{:?}]", path, key);
            if let Err(problem) = check_map_key(key_kind, key) {
                self.fail(&entry_path, problem);
                ok = false;
                continue;
            }
            if entry.is_null() && *value_kind != FieldKind::Value {
                self.fail(&entry_path, "null is not allowed as a map value");
                ok = false;
                continue;
            }
            match self.single(value_kind, entry, &entry_path) {
                Some(v) => {
                    out.insert(key.clone(), v);
                }
                None => ok = false,
            }
        }
        ok.then_some(Value::Object(out))
    }

    fn single(&mut self, kind: &FieldKind, value: &Value, path: &str) -> Option<Value> {
        let result = match kind {
            FieldKind::String | FieldKind::Bytes => match value {
                Value::String(_) => Ok(value.clone()),
                other => Err(format!("expected string, got {}", json_type(other))),
            },
            FieldKind::Bool => match value {
                Value::Bool(_) => Ok(value.clone()),
                other => Err(format!("expected bool, got {}", json_type(other))),
            },
            FieldKind::Int32 => {
                int_in_range(value, i32::MIN as i128, i32::MAX as i128, "int32").map(Value::from)
            }
            FieldKind::Uint32 => int_in_range(value, 0, u32::MAX as i128, "uint32").map(Value::from),
            FieldKind::Int64 => {
                wide_int(value, i64::MIN as i128, i64::MAX as i128, "int64")
            }
            FieldKind::Uint64 => wide_int(value, 0, u64::MAX as i128, "uint64"),
            FieldKind::Float => float(value, true),
            FieldKind::Double => float(value, false),
            FieldKind::Enum(name) => self.enum_value(name, value),
            FieldKind::Message(name) => {
                let pool = self.pool;
                let Ok(desc) = pool.message(name) else {
                    return self.fail(path, format!("unknown message type {}", name));
                };
                return self.message(desc, value, path);
            }
            FieldKind::Struct => match value {
                Value::Object(_) => Ok(value.clone()),
                other => Err(format!("expected object, got {}", json_type(other))),
            },
            FieldKind::Value => Ok(value.clone()),
            FieldKind::Map(..) => Err("nested map fields are not supported".to_string()),
        };
        match result {
            Ok(v) => Some(v),
            Err(problem) => self.fail(path, problem),
        }
    }

    fn enum_value(&self, name: &str, value: &Value) -> std::result::Result<Value, String> {
        let desc = self
            .pool
            .enumeration(name)
            .ok_or_else(|| format!("unknown enum type {}", name))?;
        match value {
            Value::String(s) if desc.values.iter().any(|v| v == s) => Ok(value.clone()),
            Value::String(s) => Err(format!("{:?} is not a value of {}", s, name)),
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| desc.values.get(i as usize))
                .map(|v| Value::String(v.clone()))
                .ok_or_else(|| format!("{} is not a value of {}", n, name)),
            other => Err(format!("expected enum name or number, got {}", json_type(other))),
        }
    }

    /// Whether `value` is what protobuf would omit when defaults are suppressed.
    fn is_default(&self, field: &FieldDescriptor, value: &Value) -> bool {
        if field.repeated {
            return value.as_array().is_some_and(|a| a.is_empty());
        }
        match &field.kind {
            FieldKind::Map(..) => value.as_object().is_some_and(|o| o.is_empty()),
            FieldKind::String | FieldKind::Bytes => value.as_str() == Some(""),
            FieldKind::Bool => value.as_bool() == Some(false),
            FieldKind::Int32 | FieldKind::Uint32 | FieldKind::Int64 | FieldKind::Uint64 => {
                match value {
                    Value::Number(n) => n.as_i64() == Some(0) || n.as_u64() == Some(0),
                    Value::String(s) => s.parse::<i128>() == Ok(0),
                    _ => false,
                }
            }
            FieldKind::Float | FieldKind::Double => value.as_f64() == Some(0.0),
            FieldKind::Enum(name) => self
                .pool
                .enumeration(name)
                .and_then(|e| e.values.first())
                .is_some_and(|first| value.as_str() == Some(first.as_str())),
            FieldKind::Message(_) | FieldKind::Struct | FieldKind::Value => false,
        }
    }
}

fn parse_int(value: &Value, type_name: &str) -> std::result::Result<i128, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i as i128)
            } else if let Some(u) = n.as_u64() {
                Ok(u as i128)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1.0e38 {
                    Ok(f as i128)
                } else {
                    Err(format!("{} is not an integer", n))
                }
            }
        }
        Value::String(s) => s
            .parse::<i128>()
            .map_err(|_| format!("{:?} is not a valid {}", s, type_name)),
        other => Err(format!("expected {}, got {}", type_name, json_type(other))),
    }
}

fn int_in_range(
    value: &Value,
    min: i128,
    max: i128,
    type_name: &str,
) -> std::result::Result<i64, String> {
    let n = parse_int(value, type_name)?;
    if n < min || n > max {
        return Err(format!("{} is out of range for {}", n, type_name));
    }
    Ok(n as i64)
}

/// 64-bit integers keep the form they arrived in: numbers stay numbers, strings stay strings.
fn wide_int(
    value: &Value,
    min: i128,
    max: i128,
    type_name: &str,
) -> std::result::Result<Value, String> {
    let n = parse_int(value, type_name)?;
    if n < min || n > max {
        return Err(format!("{} is out of range for {}", n, type_name));
    }
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(num) if num.is_f64() => Ok(if n < 0 {
            Value::from(n as i64)
        } else {
            Value::from(n as u64)
        }),
        _ => Ok(value.clone()),
    }
}

fn float(value: &Value, single: bool) -> std::result::Result<Value, String> {
    let type_name = if single { "float" } else { "double" };
    let f = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if matches!(s.as_str(), "NaN" | "Infinity" | "-Infinity") => {
            return Ok(value.clone())
        }
        Value::String(s) => s
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| format!("{:?} is not a valid {}", s, type_name))?,
        other => return Err(format!("expected {}, got {}", type_name, json_type(other))),
    };
    if single && f.abs() > f32::MAX as f64 {
        return Err(format!("{} is out of range for float", f));
    }
    match value {
        Value::Number(_) => Ok(value.clone()),
        _ => Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| format!("{} is not a valid {}", f, type_name)),
    }
}

fn check_map_key(kind: &FieldKind, key: &str) -> std::result::Result<(), String> {
    let ok = match kind {
        FieldKind::String => true,
        FieldKind::Bool => key == "true" || key == "false",
        FieldKind::Int32 => key.parse::<i32>().is_ok(),
        FieldKind::Uint32 => key.parse::<u32>().is_ok(),
        FieldKind::Int64 => key.parse::<i64>().is_ok(),
        FieldKind::Uint64 => key.parse::<u64>().is_ok(),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("map key is not a valid {}", kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EnumDescriptor, FieldDescriptor as F, FieldKind as K};
    use serde_json::json;

    fn pool() -> DescriptorPool {
        DescriptorPool::builder()
            .with_builtins()
            .enumeration(EnumDescriptor::new(
                "demo.Level",
                vec!["LEVEL_UNSPECIFIED".into(), "LOW".into(), "HIGH".into()],
            ))
            .message(
                MessageDescriptor::new("demo.Sample")
                    .field(F::new("level", K::Message("demo.Level".into())))
                    .field(F::new("count", K::Int32))
                    .field(F::new("big", K::Int64))
                    .field(F::new("ratio", K::Float))
                    .field(F::new("labels", K::Map(Box::new(K::Int32), Box::new(K::String))))
                    .field(F::new("flags", K::Bool).repeated()),
            )
            .build()
            .unwrap()
    }

    fn problems(err: RpcError) -> String {
        match err {
            RpcError::Validation { message, .. } => message,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn run_request_normalizes_names_and_drops_nulls() {
        let out = encode_request(
            &pool(),
            "prompt.v1.PromptRunRequest",
            &json!({"toolName": "x", "input": "hi", "model": null, "maxOutputTokens": "64"}),
        )
        .unwrap();
        assert_eq!(
            out,
            json!({"tool_name": "x", "input": "hi", "max_output_tokens": 64})
        );
    }

    #[test]
    fn missing_required_field_is_reported() {
        let err = encode_request(&pool(), "prompt.v1.PromptRunRequest", &json!({"input": "hi"}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "request validation failed: tool_name: required field missing"
        );
    }

    #[test]
    fn nested_paths_in_diagnostics() {
        let err = encode_request(
            &pool(),
            "prompt.v1.PromptRunRequest",
            &json!({
                "tool_name": "x",
                "tools": [{"type": "function", "function": {"name": 7}}],
                "bogus": true
            }),
        )
        .unwrap_err();
        let msg = problems(err);
        assert!(msg.contains("tools[0].function.name: expected string, got number"), "{msg}");
        assert!(msg.contains("bogus: unknown field"), "{msg}");
    }

    #[test]
    fn value_fields_accept_anything_including_null() {
        let out = encode_request(
            &pool(),
            "prompt.v1.PromptRunRequest",
            &json!({"tool_name": "x", "input": null}),
        )
        .unwrap();
        assert_eq!(out, json!({"tool_name": "x", "input": null}));

        let out = encode_request(
            &pool(),
            "prompt.v1.PromptRunRequest",
            &json!({"tool_name": "x", "input": [{"role": "user"}, 3]}),
        )
        .unwrap();
        assert_eq!(out["input"], json!([{"role": "user"}, 3]));
    }

    #[test]
    fn int64_keeps_its_representation() {
        let out = normalize(
            &pool(),
            "demo.Sample",
            &json!({"big": "9007199254740993"}),
            Direction::Response,
            DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(out["big"], json!("9007199254740993"));

        let out = normalize(
            &pool(),
            "demo.Sample",
            &json!({"big": 12}),
            Direction::Response,
            DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(out["big"], json!(12));
    }

    #[test]
    fn int32_range_is_enforced() {
        let err = encode_request(&pool(), "demo.Sample", &json!({"count": 3_000_000_000u64}))
            .unwrap_err();
        assert!(problems(err).contains("count: 3000000000 is out of range for int32"));
        let err = encode_request(&pool(), "demo.Sample", &json!({"count": 1.5})).unwrap_err();
        assert!(problems(err).contains("not an integer"));
    }

    #[test]
    fn enum_accepts_names_and_indexes() {
        let out = encode_request(&pool(), "demo.Sample", &json!({"level": 2})).unwrap();
        assert_eq!(out["level"], json!("HIGH"));
        let out = encode_request(&pool(), "demo.Sample", &json!({"level": "LOW"})).unwrap();
        assert_eq!(out["level"], json!("LOW"));
        assert!(encode_request(&pool(), "demo.Sample", &json!({"level": "MAX"})).is_err());
        assert!(encode_request(&pool(), "demo.Sample", &json!({"level": 9})).is_err());
    }

    #[test]
    fn float_special_values() {
        let out = encode_request(&pool(), "demo.Sample", &json!({"ratio": "NaN"})).unwrap();
        assert_eq!(out["ratio"], json!("NaN"));
        let err = encode_request(&pool(), "demo.Sample", &json!({"ratio": 1e300})).unwrap_err();
        assert!(problems(err).contains("out of range for float"));
    }

    #[test]
    fn map_keys_must_parse() {
        assert!(encode_request(&pool(), "demo.Sample", &json!({"labels": {"1": "a"}})).is_ok());
        let err = encode_request(&pool(), "demo.Sample", &json!({"labels": {"one": "a"}}))
            .unwrap_err();
        assert!(problems(err).contains("labels[\"one\"]: map key is not a valid int32"));
    }

    #[test]
    fn repeated_elements_are_validated() {
        let err = encode_request(&pool(), "demo.Sample", &json!({"flags": [true, "no"]}))
            .unwrap_err();
        assert!(problems(err).contains("flags[1]: expected bool, got string"));
        let err = encode_request(&pool(), "demo.Sample", &json!({"flags": true})).unwrap_err();
        assert!(problems(err).contains("flags: expected array"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = encode_request(
            &pool(),
            "prompt.v1.PromptRunRequest",
            &json!({"tool_name": "x", "toolName": "y"}),
        )
        .unwrap_err();
        assert!(problems(err).contains("duplicate field"));
    }

    #[test]
    fn duplicate_names_are_rejected_even_when_defaults_are_dropped() {
        let document = json!({"experimentId": "", "experiment_id": "x"});
        for emit_default_values in [true, false] {
            let options = DecodeOptions {
                emit_default_values,
                ignore_unknown_fields: false,
            };
            let err = decode_response(&pool(), "testcase.v1.TestcaseItem", &document, options)
                .unwrap_err();
            assert!(problems(err).contains("experiment_id: duplicate field"));
        }
    }

    #[test]
    fn default_suppression_keeps_message_presence() {
        let options = DecodeOptions {
            emit_default_values: false,
            ignore_unknown_fields: false,
        };
        let out = decode_response(
            &pool(),
            "prompt.v1.PromptRunResponse",
            &json!({"id": "", "object": "response", "created": 0, "output": [], "usage": {}}),
            options,
        )
        .unwrap();
        assert_eq!(out, json!({"object": "response", "usage": {}}));
    }

    #[test]
    fn unknown_response_fields_can_be_ignored() {
        let options = DecodeOptions {
            emit_default_values: true,
            ignore_unknown_fields: true,
        };
        let out = decode_response(
            &pool(),
            "testcase.v1.DeleteTestcaseResponse",
            &json!({"deleted": 2, "extra": "x"}),
            options,
        )
        .unwrap();
        assert_eq!(out, json!({"deleted": 2}));
    }

    #[test]
    fn root_must_be_object() {
        let err = encode_request(&pool(), "prompt.v1.PromptRunRequest", &json!("hi")).unwrap_err();
        assert!(problems(err).starts_with("(root): expected object"));
    }

    #[test]
    fn body_parsing() {
        assert_eq!(parse_body(b"").unwrap(), json!({}));
        assert_eq!(parse_body(b" {\"a\":1} ").unwrap(), json!({"a": 1}));
        let long = "x".repeat(500);
        let err = parse_body(long.as_bytes()).unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("Decode error: response is not valid JSON"));
        assert!(text.ends_with(&format!("{}...", "x".repeat(200))));
    }
}
