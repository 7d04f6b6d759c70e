//! Domain records shared by the inventory, the classifier and the planner.
//!
//! Everything here is plain data owned by one run. The control plane owns
//! the real VMs and snapshots; these are read-only copies of one
//! `xo.getAllObjects` answer.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::classify::AUTO_PREFIX;

/// Canonical identity of a remote object.
///
/// The remote API names objects through several fields (`id`, `UUID`,
/// `ref`, sometimes numbers); the inventory maps all of them into this one
/// type. Ordering is plain string ordering, which the planner relies on to
/// break timestamp ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    Running,
    Halted,
    Other(String),
}

impl PowerState {
    pub fn parse(s: &str) -> Self {
        match s {
            "Running" => PowerState::Running,
            "Halted" => PowerState::Halted,
            other => PowerState::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMachine {
    pub id: Identity,
    pub name: String,
    pub power_state: PowerState,
    /// Snapshot references as listed by the VM record. Order carries no
    /// meaning and entries may point at snapshots missing from the index.
    pub snapshots: Vec<Identity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Identity passed to the delete call.
    pub id: Identity,
    /// Identity used by VM records to list this snapshot.
    pub reference: Identity,
    /// Owning VM, when the record carries it.
    pub vm: Option<Identity>,
    pub name: String,
    /// Platform `snapshot_time` (seconds since the epoch).
    pub created: i64,
}

impl Snapshot {
    /// Whether this snapshot was made by a rotation run. Derived from the
    /// name each time it is asked.
    pub fn is_automatic(&self) -> bool {
        self.name.starts_with(AUTO_PREFIX)
    }
}

/// "Keep at most N automatic snapshots". A disabled policy never deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    keep: Option<usize>,
}

impl RetentionPolicy {
    pub fn disabled() -> Self {
        Self { keep: None }
    }

    /// Build a policy from a user-supplied count. Zero and negative counts
    /// disable pruning.
    pub fn from_count(count: Option<i64>) -> Self {
        match count {
            Some(n) if n > 0 => Self {
                keep: usize::try_from(n).ok(),
            },
            _ => Self::disabled(),
        }
    }

    /// Number of automatic snapshots retained, `None` when disabled.
    pub fn keep(&self) -> Option<usize> {
        self.keep
    }

    pub fn is_enabled(&self) -> bool {
        self.keep.is_some()
    }
}

/// Snapshots selected for removal, oldest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeletionPlan(Vec<Snapshot>);

impl DeletionPlan {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self(snapshots)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.0.iter()
    }
}

impl IntoIterator for DeletionPlan {
    type Item = Snapshot;
    type IntoIter = std::vec::IntoIter<Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// One run's read-only view of the cluster.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    vms: BTreeMap<Identity, VirtualMachine>,
    snapshots: BTreeMap<Identity, Snapshot>,
    /// Snapshot `id` → `reference`, for VM records that list ids.
    aliases: HashMap<Identity, Identity>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_vm(&mut self, vm: VirtualMachine) {
        self.vms.insert(vm.id.clone(), vm);
    }

    pub fn insert_snapshot(&mut self, snapshot: Snapshot) {
        if snapshot.id != snapshot.reference {
            self.aliases
                .insert(snapshot.id.clone(), snapshot.reference.clone());
        }
        self.snapshots.insert(snapshot.reference.clone(), snapshot);
    }

    /// VMs in identity order.
    pub fn vms(&self) -> impl Iterator<Item = &VirtualMachine> {
        self.vms.values()
    }

    pub fn vm(&self, id: &Identity) -> Option<&VirtualMachine> {
        self.vms.get(id)
    }

    /// Look up a snapshot by reference, falling back to its id.
    pub fn snapshot(&self, key: &Identity) -> Option<&Snapshot> {
        self.snapshots.get(key).or_else(|| {
            self.aliases
                .get(key)
                .and_then(|reference| self.snapshots.get(reference))
        })
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}
