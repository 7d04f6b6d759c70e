//! Normalization of `xo.getAllObjects` into an [`Inventory`].
//!
//! The remote object graph is loosely typed: identities live in `id` or
//! `UUID`, snapshots are listed by `ref` on some servers and by id on
//! others, numbers sometimes arrive as strings. This is the only place
//! that knows about it; records that can't be read are skipped with a
//! log line instead of failing the run.

use serde_json::{Map, Value};

use crate::error::RotateError;
use crate::model::{Identity, Inventory, PowerState, Snapshot, VirtualMachine};

const VM_TYPE: &str = "VM";
const SNAPSHOT_TYPE: &str = "VM-snapshot";

/// Build an inventory from the raw answer, a map keyed by object id or a
/// plain array of objects.
pub fn from_objects(objects: Value) -> Result<Inventory, RotateError> {
    let records: Vec<Value> = match objects {
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Array(items) => items,
        other => {
            return Err(RotateError::Inventory {
                message: format!("expected an object map, got {}", kind(&other)),
            });
        }
    };

    let mut inventory = Inventory::new();
    for record in &records {
        let Value::Object(obj) = record else {
            continue;
        };
        match obj.get("type").and_then(Value::as_str) {
            Some(VM_TYPE) => match read_vm(obj) {
                Some(vm) => inventory.insert_vm(vm),
                None => tracing::warn!("skipping VM record without identity"),
            },
            Some(SNAPSHOT_TYPE) => match read_snapshot(obj) {
                Some(snapshot) => inventory.insert_snapshot(snapshot),
                None => tracing::warn!("skipping snapshot record without identity"),
            },
            _ => {}
        }
    }

    tracing::debug!(
        objects = records.len(),
        vms = inventory.vm_count(),
        snapshots = inventory.snapshot_count(),
        "inventory loaded"
    );
    Ok(inventory)
}

/// The object's identity: `id`, falling back to `UUID`.
pub fn identity(obj: &Map<String, Value>) -> Option<Identity> {
    obj.get("id")
        .and_then(as_identity)
        .or_else(|| obj.get("UUID").and_then(as_identity))
}

fn read_vm(obj: &Map<String, Value>) -> Option<VirtualMachine> {
    let id = identity(obj)?;
    let name = obj
        .get("name_label")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string());
    let power_state = PowerState::parse(
        obj.get("power_state")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    );
    let snapshots = obj
        .get("snapshots")
        .and_then(Value::as_array)
        .map(|refs| refs.iter().filter_map(as_identity).collect())
        .unwrap_or_default();

    Some(VirtualMachine {
        id,
        name,
        power_state,
        snapshots,
    })
}

fn read_snapshot(obj: &Map<String, Value>) -> Option<Snapshot> {
    let id = identity(obj)?;
    let reference = obj
        .get("ref")
        .and_then(as_identity)
        .unwrap_or_else(|| id.clone());
    Some(Snapshot {
        reference,
        vm: obj.get("$snapshot_of").and_then(as_identity),
        name: obj
            .get("name_label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        created: obj.get("snapshot_time").map(as_timestamp).unwrap_or(0),
        id,
    })
}

fn as_identity(v: &Value) -> Option<Identity> {
    match v {
        Value::String(s) if !s.is_empty() => Some(Identity::new(s.as_str())),
        Value::Number(n) => Some(Identity::new(n.to_string())),
        _ => None,
    }
}

/// `snapshot_time` as whole seconds. Unreadable values sort first.
fn as_timestamp(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        _ => 0,
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
