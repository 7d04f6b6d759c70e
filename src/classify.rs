//! Automatic-snapshot classification and naming.

use std::collections::HashSet;
use std::time::SystemTime;

use crate::model::{Inventory, Snapshot, VirtualMachine};
use crate::util::iso8601;

/// Name prefix marking snapshots created by rotation. Case-sensitive.
pub const AUTO_PREFIX: &str = "auto-";

/// Name for a snapshot taken at `now`: `auto-2024-05-01T03:00:00.000Z`.
pub fn snapshot_name(now: SystemTime) -> String {
    format!("{AUTO_PREFIX}{}", iso8601(now))
}

/// Automatic snapshots of `vm` known to the inventory.
///
/// References the index doesn't know about are skipped; the inventory is
/// one possibly-stale read and a dangling reference must not fail the VM.
pub fn classify(inventory: &Inventory, vm: &VirtualMachine) -> Vec<Snapshot> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for reference in &vm.snapshots {
        let Some(snapshot) = inventory.snapshot(reference) else {
            tracing::debug!(vm = %vm.name, snapshot = %reference, "snapshot missing from inventory");
            continue;
        };
        if !snapshot.is_automatic() || !seen.insert(snapshot.reference.clone()) {
            continue;
        }
        out.push(snapshot.clone());
    }

    out
}
