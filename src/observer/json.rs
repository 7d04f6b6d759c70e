//! JSON-lines observer: one object per event, then one summary object.

use std::io::Write;

use super::Observer;
use crate::model::Identity;
use crate::rotation::{RotationEvent, RunReport};

#[derive(facet::Facet)]
struct EventRecord {
    event: String,
    vm: String,
    vm_id: String,
    snapshot: Option<String>,
    id: Option<String>,
    state: Option<String>,
    deleted: Option<u64>,
    failed: Option<u64>,
    error: Option<String>,
}

impl EventRecord {
    fn new(event: &str, vm: &str, vm_id: &Identity) -> Self {
        Self {
            event: event.to_string(),
            vm: vm.to_string(),
            vm_id: vm_id.to_string(),
            snapshot: None,
            id: None,
            state: None,
            deleted: None,
            failed: None,
            error: None,
        }
    }
}

#[derive(facet::Facet)]
struct SummaryRecord {
    event: String,
    snapshotted: u64,
    failed: u64,
    deleted: u64,
    delete_failures: u64,
}

pub struct JsonObserver<W: Write> {
    out: W,
}

impl<W: Write> JsonObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit<E: std::fmt::Debug>(&mut self, line: Result<String, E>) {
        match line {
            Ok(line) => {
                let _ = writeln!(self.out, "{line}");
            }
            Err(e) => tracing::warn!(error = ?e, "failed to serialize event"),
        }
    }
}

fn record(event: &RotationEvent) -> Option<EventRecord> {
    let base = |name: &str| EventRecord::new(name, event.vm(), event.vm_id());
    let rec = match event {
        RotationEvent::Transition { .. } => return None,
        RotationEvent::Created {
            snapshot, dry_run, ..
        } => EventRecord {
            snapshot: Some(snapshot.clone()),
            ..base(if *dry_run { "would_create" } else { "created" })
        },
        RotationEvent::CreateFailed { error, .. } => EventRecord {
            error: Some(error.clone()),
            ..base("create_failed")
        },
        RotationEvent::Deleted { snapshot, id, .. } => EventRecord {
            snapshot: Some(snapshot.clone()),
            id: Some(id.to_string()),
            ..base("deleted")
        },
        RotationEvent::DeleteFailed {
            snapshot,
            id,
            error,
            ..
        } => EventRecord {
            snapshot: Some(snapshot.clone()),
            id: Some(id.to_string()),
            error: Some(error.clone()),
            ..base("delete_failed")
        },
        RotationEvent::DeleteSkipped { snapshot, id, .. } => EventRecord {
            snapshot: Some(snapshot.clone()),
            id: Some(id.to_string()),
            ..base("would_delete")
        },
        RotationEvent::Finished {
            state,
            deleted,
            failed,
            ..
        } => EventRecord {
            state: Some(state.to_string()),
            deleted: Some(*deleted as u64),
            failed: Some(*failed as u64),
            ..base("finished")
        },
    };
    Some(rec)
}

impl<W: Write> Observer for JsonObserver<W> {
    fn on_event(&mut self, event: &RotationEvent) {
        if let Some(rec) = record(event) {
            self.emit(facet_json::to_string(&rec));
        }
    }

    fn on_finish(&mut self, report: &RunReport) {
        let summary = SummaryRecord {
            event: "summary".to_string(),
            snapshotted: report.snapshotted() as u64,
            failed: report.failed() as u64,
            deleted: report.deleted() as u64,
            delete_failures: report.delete_failures() as u64,
        };
        self.emit(facet_json::to_string(&summary));
        let _ = self.out.flush();
    }
}
