//! # Payload Consolidation
//!
//! Merges the payloads of two patch commands aimed at the same resource so
//! only one request goes out. Implementations must not mutate their inputs,
//! and fields of the second argument win on conflict.

use serde_json::{Map, Value};

use crate::error::{CommandSyncError, CommandSyncResult};

pub trait PayloadConsolidator: Send + Sync + 'static {
    fn consolidate(&self, first: &Value, second: &Value) -> CommandSyncResult<Value>;
}

/// Shallow merge of two JSON objects
///
/// Top-level keys of both objects are kept; on a key present in both, the
/// value from `second` is used as-is (nested objects are not merged).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMergeConsolidator;

impl PayloadConsolidator for JsonMergeConsolidator {
    fn consolidate(&self, first: &Value, second: &Value) -> CommandSyncResult<Value> {
        let (Value::Object(first), Value::Object(second)) = (first, second) else {
            return Err(CommandSyncError::Consolidation(format!(
                "can only merge JSON objects, got {} and {}",
                kind(first),
                kind(second)
            )));
        };

        let mut merged: Map<String, Value> = first.clone();
        for (key, value) in second {
            merged.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(merged))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
