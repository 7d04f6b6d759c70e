//! Rotation orchestrator.
//!
//! Each running VM goes through the same linear sequence:
//!
//! ```text
//! Idle -> Creating -> Classifying -> Planning -> Deleting -> Done
//!            \
//!             -> Failed
//! ```
//!
//! A VM only reaches `Classifying` once its new snapshot exists, so a
//! failed snapshot never leads to deletions. Deletion failures are
//! recorded per snapshot and never turn the VM into `Failed`.
//!
//! All VMs are rotated on the calling task: their futures are polled
//! together (optionally bounded) and share the inventory read-only.
//! Progress is published as [`RotationEvent`]s; the caller decides how
//! to render them.

use std::fmt;
use std::time::SystemTime;

use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::mpsc;

use crate::backend::ControlPlane;
use crate::classify::{classify, snapshot_name};
use crate::error::RotateError;
use crate::model::{Identity, Inventory, PowerState, RetentionPolicy, Snapshot, VirtualMachine};
use crate::retention;

// ── State ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Idle,
    Creating,
    Classifying,
    Planning,
    Deleting,
    Done,
    /// The snapshot could not be created. Nothing was deleted.
    Failed,
}

impl RotationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RotationState::Done | RotationState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RotationState::Idle => "idle",
            RotationState::Creating => "creating",
            RotationState::Classifying => "classifying",
            RotationState::Planning => "planning",
            RotationState::Deleting => "deleting",
            RotationState::Done => "done",
            RotationState::Failed => "failed",
        }
    }
}

impl fmt::Display for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Progress records, one stream for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub enum RotationEvent {
    Transition {
        vm: String,
        vm_id: Identity,
        from: RotationState,
        to: RotationState,
    },
    /// The new snapshot exists (or would, in a dry run).
    Created {
        vm: String,
        vm_id: Identity,
        snapshot: String,
        dry_run: bool,
    },
    CreateFailed {
        vm: String,
        vm_id: Identity,
        error: String,
    },
    Deleted {
        vm: String,
        vm_id: Identity,
        snapshot: String,
        id: Identity,
    },
    DeleteFailed {
        vm: String,
        vm_id: Identity,
        snapshot: String,
        id: Identity,
        error: String,
    },
    /// Planned for deletion but left alone because of a dry run.
    DeleteSkipped {
        vm: String,
        vm_id: Identity,
        snapshot: String,
        id: Identity,
    },
    Finished {
        vm: String,
        vm_id: Identity,
        state: RotationState,
        deleted: usize,
        failed: usize,
    },
}

impl RotationEvent {
    /// Display name of the VM. Not unique across a pool.
    pub fn vm(&self) -> &str {
        match self {
            RotationEvent::Transition { vm, .. }
            | RotationEvent::Created { vm, .. }
            | RotationEvent::CreateFailed { vm, .. }
            | RotationEvent::Deleted { vm, .. }
            | RotationEvent::DeleteFailed { vm, .. }
            | RotationEvent::DeleteSkipped { vm, .. }
            | RotationEvent::Finished { vm, .. } => vm,
        }
    }

    pub fn vm_id(&self) -> &Identity {
        match self {
            RotationEvent::Transition { vm_id, .. }
            | RotationEvent::Created { vm_id, .. }
            | RotationEvent::CreateFailed { vm_id, .. }
            | RotationEvent::Deleted { vm_id, .. }
            | RotationEvent::DeleteFailed { vm_id, .. }
            | RotationEvent::DeleteSkipped { vm_id, .. }
            | RotationEvent::Finished { vm_id, .. } => vm_id,
        }
    }
}

pub type EventSink = mpsc::UnboundedSender<RotationEvent>;

fn publish(events: &EventSink, event: RotationEvent) {
    // No receiver is fine.
    let _ = events.send(event);
}

// ── Outcomes ────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum DeletionResult {
    Deleted,
    Failed(RotateError),
    Skipped,
}

#[derive(Debug)]
pub struct DeletionOutcome {
    pub snapshot: Snapshot,
    pub result: DeletionResult,
}

#[derive(Debug)]
pub struct RotationOutcome {
    pub vm: Identity,
    pub vm_name: String,
    pub state: RotationState,
    /// Name of the snapshot created by this run.
    pub snapshot: Option<String>,
    /// Why creation failed, when `state` is `Failed`.
    pub error: Option<RotateError>,
    /// One entry per planned deletion, oldest first.
    pub deletions: Vec<DeletionOutcome>,
}

impl RotationOutcome {
    pub fn deleted(&self) -> usize {
        self.count(|r| matches!(r, DeletionResult::Deleted))
    }

    pub fn delete_failures(&self) -> usize {
        self.count(|r| matches!(r, DeletionResult::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&DeletionResult) -> bool) -> usize {
        self.deletions.iter().filter(|d| pred(&d.result)).count()
    }
}

/// Outcomes of every rotated VM, in inventory order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<RotationOutcome>,
}

impl RunReport {
    pub fn snapshotted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == RotationState::Done)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == RotationState::Failed)
            .count()
    }

    pub fn deleted(&self) -> usize {
        self.outcomes.iter().map(RotationOutcome::deleted).sum()
    }

    pub fn delete_failures(&self) -> usize {
        self.outcomes.iter().map(RotationOutcome::delete_failures).sum()
    }
}

// ── Options ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RotateOptions {
    pub policy: RetentionPolicy,
    /// Passed through to the delete call.
    pub delete_disks: bool,
    /// Plan only: no snapshot is created and nothing is deleted.
    pub dry_run: bool,
    /// Maximum VMs rotated at once; `None` means all of them.
    pub concurrency: Option<usize>,
}

impl Default for RotateOptions {
    fn default() -> Self {
        Self {
            policy: RetentionPolicy::disabled(),
            delete_disks: true,
            dry_run: false,
            concurrency: None,
        }
    }
}

// ── Orchestration ───────────────────────────────────────────────────

/// Fetch the inventory and rotate every running VM.
///
/// Only an inventory failure is an error; per-VM problems end up in the
/// report.
pub async fn run<P: ControlPlane>(
    plane: &P,
    options: &RotateOptions,
    events: EventSink,
) -> Result<RunReport, RotateError> {
    let inventory = plane.fetch_inventory().await?;
    Ok(rotate_all(plane, &inventory, options, events).await)
}

/// VMs a run should snapshot: the running ones.
pub fn select_targets(inventory: &Inventory) -> Vec<&VirtualMachine> {
    inventory
        .vms()
        .filter(|vm| vm.power_state == PowerState::Running)
        .collect()
}

/// Rotate every running VM of `inventory`. Takes the event sink by value
/// so the stream ends when the run does.
pub async fn rotate_all<P: ControlPlane>(
    plane: &P,
    inventory: &Inventory,
    options: &RotateOptions,
    events: EventSink,
) -> RunReport {
    let targets = select_targets(inventory);
    tracing::info!(
        vms = targets.len(),
        keep = ?options.policy.keep(),
        dry_run = options.dry_run,
        "starting rotation"
    );

    let name = snapshot_name(SystemTime::now());
    let limit = options.concurrency.unwrap_or(targets.len()).max(1);

    let (name, sink) = (name.as_str(), &events);
    let outcomes: Vec<RotationOutcome> = stream::iter(
        targets
            .into_iter()
            .map(move |vm| rotate(plane, vm, inventory, options, name, sink)),
    )
    .buffered(limit)
    .collect()
    .await;

    RunReport { outcomes }
}

/// Rotate one VM: snapshot it under `name`, then prune its automatic
/// snapshots down to the policy.
async fn rotate<P: ControlPlane>(
    plane: &P,
    vm: &VirtualMachine,
    inventory: &Inventory,
    options: &RotateOptions,
    name: &str,
    events: &EventSink,
) -> RotationOutcome {
    let mut tracker = Tracker::new(vm, events);
    let mut outcome = RotationOutcome {
        vm: vm.id.clone(),
        vm_name: vm.name.clone(),
        state: RotationState::Idle,
        snapshot: None,
        error: None,
        deletions: Vec::new(),
    };

    tracker.advance(RotationState::Creating);
    if options.dry_run {
        tracing::info!(vm = %vm.name, snapshot = name, "would snapshot");
    } else {
        match plane.create_snapshot(&vm.id, name).await {
            Ok(id) => {
                tracing::info!(vm = %vm.name, snapshot = name, %id, "snapshotted");
            }
            Err(source) => {
                let error = RotateError::SnapshotCreate {
                    vm: vm.name.clone(),
                    source,
                };
                tracing::warn!(vm = %vm.name, error = %error.chain(), "snapshot failed");
                tracker.emit(RotationEvent::CreateFailed {
                    vm: vm.name.clone(),
                    vm_id: vm.id.clone(),
                    error: error.chain(),
                });
                outcome.error = Some(error);
                tracker.advance(RotationState::Failed);
                return tracker.finish(outcome);
            }
        }
    }
    outcome.snapshot = Some(name.to_string());
    tracker.emit(RotationEvent::Created {
        vm: vm.name.clone(),
        vm_id: vm.id.clone(),
        snapshot: name.to_string(),
        dry_run: options.dry_run,
    });

    // The new snapshot isn't in the loaded inventory, so only pre-existing
    // ones are considered here.
    tracker.advance(RotationState::Classifying);
    let automatic = classify(inventory, vm);

    tracker.advance(RotationState::Planning);
    let plan = retention::plan(&automatic, options.policy);
    tracing::debug!(
        vm = %vm.name,
        automatic = automatic.len(),
        planned = plan.len(),
        "retention planned"
    );
    if plan.is_empty() {
        tracker.advance(RotationState::Done);
        return tracker.finish(outcome);
    }

    tracker.advance(RotationState::Deleting);
    for snapshot in plan {
        let result = delete(plane, vm, &snapshot, options, &tracker).await;
        outcome.deletions.push(DeletionOutcome { snapshot, result });
    }

    tracker.advance(RotationState::Done);
    tracker.finish(outcome)
}

async fn delete<P: ControlPlane>(
    plane: &P,
    vm: &VirtualMachine,
    snapshot: &Snapshot,
    options: &RotateOptions,
    tracker: &Tracker<'_>,
) -> DeletionResult {
    if options.dry_run {
        tracing::info!(vm = %vm.name, snapshot = %snapshot.name, "would delete old snapshot");
        tracker.emit(RotationEvent::DeleteSkipped {
            vm: vm.name.clone(),
            vm_id: vm.id.clone(),
            snapshot: snapshot.name.clone(),
            id: snapshot.id.clone(),
        });
        return DeletionResult::Skipped;
    }

    match plane
        .delete_snapshot(&snapshot.id, options.delete_disks)
        .await
    {
        Ok(()) => {
            tracing::info!(vm = %vm.name, snapshot = %snapshot.name, "old snapshot deleted");
            tracker.emit(RotationEvent::Deleted {
                vm: vm.name.clone(),
                vm_id: vm.id.clone(),
                snapshot: snapshot.name.clone(),
                id: snapshot.id.clone(),
            });
            DeletionResult::Deleted
        }
        Err(source) => {
            let error = RotateError::SnapshotDelete {
                vm: vm.name.clone(),
                snapshot: snapshot.name.clone(),
                source,
            };
            tracing::warn!(
                vm = %vm.name,
                snapshot = %snapshot.name,
                error = %error.chain(),
                "old snapshot deletion failed"
            );
            tracker.emit(RotationEvent::DeleteFailed {
                vm: vm.name.clone(),
                vm_id: vm.id.clone(),
                snapshot: snapshot.name.clone(),
                id: snapshot.id.clone(),
                error: error.chain(),
            });
            DeletionResult::Failed(error)
        }
    }
}

/// Current state of one VM's rotation, publishing every move.
struct Tracker<'a> {
    vm: &'a str,
    vm_id: &'a Identity,
    state: RotationState,
    events: &'a EventSink,
}

impl<'a> Tracker<'a> {
    fn new(vm: &'a VirtualMachine, events: &'a EventSink) -> Self {
        Self {
            vm: &vm.name,
            vm_id: &vm.id,
            state: RotationState::Idle,
            events,
        }
    }

    fn advance(&mut self, next: RotationState) {
        tracing::trace!(vm = self.vm, from = %self.state, to = %next, "transition");
        self.emit(RotationEvent::Transition {
            vm: self.vm.to_string(),
            vm_id: self.vm_id.clone(),
            from: self.state,
            to: next,
        });
        self.state = next;
    }

    fn emit(&self, event: RotationEvent) {
        publish(self.events, event);
    }

    fn finish(self, mut outcome: RotationOutcome) -> RotationOutcome {
        outcome.state = self.state;
        self.emit(RotationEvent::Finished {
            vm: self.vm.to_string(),
            vm_id: self.vm_id.clone(),
            state: self.state,
            deleted: outcome.deleted(),
            failed: outcome.delete_failures(),
        });
        outcome
    }
}

// ── Tests ───────────────────────────────────────────────────────────
