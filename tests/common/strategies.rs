use chrono::{TimeZone, Utc};
use command_sync::{CommandMetadata, CommandStatus, DomainCommand, QueueInfo};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for generating JSON field names
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}

/// Strategy for generating scalar JSON values
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for generating flat JSON objects
pub fn json_object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(field_name_strategy(), scalar_value_strategy(), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

pub fn status_strategy() -> impl Strategy<Value = CommandStatus> {
    prop_oneof![
        Just(CommandStatus::Initial),
        Just(CommandStatus::Processing),
        Just(CommandStatus::Complete),
    ]
}

/// Strategy for generating queue bookkeeping records
pub fn queue_info_strategy() -> impl Strategy<Value = QueueInfo> {
    (0u32..20, 0i64..4_000_000_000, status_strategy()).prop_map(
        |(attempt_no, seconds, status)| QueueInfo {
            attempt_no,
            date_created: Utc
                .timestamp_opt(seconds, 0)
                .single()
                .expect("timestamp in range"),
            status,
        },
    )
}

/// Strategy for generating resource-scoped domain commands
pub fn domain_command_strategy() -> impl Strategy<Value = DomainCommand> {
    (
        "[a-z_]{1,16}",
        json_object_strategy(),
        prop::option::of("[a-z0-9]{1,8}"),
        prop::option::of("[a-z0-9]{1,8}"),
        any::<bool>(),
    )
        .prop_map(|(command_type, payload, resource_id, context_id, is_patch)| {
            let mut metadata = CommandMetadata::new();
            metadata.resource_id = resource_id;
            metadata.context_id = context_id;
            metadata.is_patch = is_patch;
            DomainCommand::new(command_type, Value::Object(payload), metadata)
        })
}
