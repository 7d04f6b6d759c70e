//! Plain text observer. No ANSI, one line per event.

use std::io::Write;

use super::{Observer, summary};
use crate::rotation::{RotationEvent, RunReport};

const OK: &str = "\u{2714}";
const FAIL: &str = "\u{2716}";

/// Successes go to `out`, failures to `err`.
pub struct PlainObserver<O: Write, E: Write> {
    out: O,
    err: E,
}

impl<O: Write, E: Write> PlainObserver<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> Observer for PlainObserver<O, E> {
    fn on_event(&mut self, event: &RotationEvent) {
        let _ = match event {
            RotationEvent::Created {
                vm,
                snapshot,
                dry_run: false,
                ..
            } => writeln!(self.out, "{OK} {vm} snapshotted ({snapshot})"),
            RotationEvent::Created {
                vm,
                snapshot,
                dry_run: true,
                ..
            } => writeln!(self.out, "- {vm} would be snapshotted ({snapshot})"),
            RotationEvent::CreateFailed { vm, error, .. } => {
                writeln!(self.err, "{FAIL} {vm} snapshot failed: {error}")
            }
            RotationEvent::Deleted { vm, snapshot, .. } => {
                writeln!(self.out, "{OK} {vm} old snapshot deleted {snapshot}")
            }
            RotationEvent::DeleteFailed {
                vm,
                snapshot,
                error,
                ..
            } => writeln!(
                self.err,
                "{FAIL} {vm} old snapshot deletion failed {snapshot}: {error}"
            ),
            RotationEvent::DeleteSkipped { vm, snapshot, .. } => {
                writeln!(self.out, "- {vm} would delete old snapshot {snapshot}")
            }
            RotationEvent::Transition { .. } | RotationEvent::Finished { .. } => Ok(()),
        };
    }

    fn on_finish(&mut self, report: &RunReport) {
        let _ = writeln!(self.out, "{}", summary(report));
        let _ = self.out.flush();
        let _ = self.err.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::RotationState;

    fn render(events: &[RotationEvent]) -> (String, String) {
        let mut obs = PlainObserver::new(Vec::new(), Vec::new());
        for e in events {
            obs.on_event(e);
        }
        obs.on_finish(&RunReport::default());
        let (out, err) = obs.into_inner();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn successes_on_stdout_failures_on_stderr() {
        let (out, err) = render(&[
            RotationEvent::Transition {
                vm: "web1".into(),
                vm_id: "vm-web1".into(),
                from: RotationState::Idle,
                to: RotationState::Creating,
            },
            RotationEvent::Created {
                vm: "web1".into(),
                vm_id: "vm-web1".into(),
                snapshot: "auto-now".into(),
                dry_run: false,
            },
            RotationEvent::Deleted {
                vm: "web1".into(),
                vm_id: "vm-web1".into(),
                snapshot: "auto-old".into(),
                id: "s1".into(),
            },
            RotationEvent::DeleteFailed {
                vm: "web1".into(),
                vm_id: "vm-web1".into(),
                snapshot: "auto-older".into(),
                id: "s0".into(),
                error: "broken pipe".into(),
            },
            RotationEvent::CreateFailed {
                vm: "db1".into(),
                vm_id: "vm-db1".into(),
                error: "not enough permissions".into(),
            },
        ]);

        assert_eq!(
            out,
            "\u{2714} web1 snapshotted (auto-now)\n\
             \u{2714} web1 old snapshot deleted auto-old\n\
             0 VM(s) snapshotted, 0 failed\n"
        );
        assert_eq!(
            err,
            "\u{2716} web1 old snapshot deletion failed auto-older: broken pipe\n\
             \u{2716} db1 snapshot failed: not enough permissions\n"
        );
    }

    #[test]
    fn dry_run_lines() {
        let (out, _) = render(&[
            RotationEvent::Created {
                vm: "web1".into(),
                vm_id: "vm-web1".into(),
                snapshot: "auto-now".into(),
                dry_run: true,
            },
            RotationEvent::DeleteSkipped {
                vm: "web1".into(),
                vm_id: "vm-web1".into(),
                snapshot: "auto-old".into(),
                id: "s1".into(),
            },
        ]);
        assert!(out.contains("- web1 would be snapshotted (auto-now)\n"));
        assert!(out.contains("- web1 would delete old snapshot auto-old\n"));
    }
}
