//! Interactive TTY observer: one spinner per VM, colored results.

use std::collections::HashMap;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::{Observer, summary};
use crate::model::Identity;
use crate::rotation::{RotationEvent, RotationState, RunReport};

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn done_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Bars are keyed by VM identity; display names may repeat.
pub struct InteractiveObserver {
    multi: MultiProgress,
    bars: HashMap<Identity, ProgressBar>,
}

impl InteractiveObserver {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
        }
    }

    fn bar(&mut self, vm_id: &Identity, vm: &str) -> &ProgressBar {
        let multi = &self.multi;
        self.bars.entry(vm_id.clone()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new_spinner());
            bar.set_style(spinner_style());
            bar.set_prefix(vm.to_string());
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        })
    }
}

impl Default for InteractiveObserver {
    fn default() -> Self {
        Self::new()
    }
}

fn progress_message(state: RotationState) -> &'static str {
    match state {
        RotationState::Creating => "creating snapshot",
        RotationState::Classifying => "looking for old snapshots",
        RotationState::Planning => "planning rotation",
        RotationState::Deleting => "deleting old snapshots",
        _ => state.as_str(),
    }
}

impl Observer for InteractiveObserver {
    fn on_event(&mut self, event: &RotationEvent) {
        let (vm_id, vm) = (event.vm_id(), event.vm());
        match event {
            RotationEvent::Transition { to, .. } if !to.is_terminal() => {
                self.bar(vm_id, vm).set_message(progress_message(*to));
            }
            RotationEvent::Transition { .. } => {}
            RotationEvent::Created { snapshot, .. } => {
                self.bar(vm_id, vm).set_message(format!("created {snapshot}"));
            }
            RotationEvent::CreateFailed { error, .. } => {
                let bar = self.bar(vm_id, vm).clone();
                bar.set_style(done_style());
                bar.finish_with_message(format!(
                    "{} {}",
                    style("\u{2717}").red(),
                    style(format!("snapshot failed: {error}")).red()
                ));
            }
            RotationEvent::Deleted { snapshot, .. } => {
                self.bar(vm_id, vm).set_message(format!("deleted {snapshot}"));
            }
            RotationEvent::DeleteFailed {
                snapshot, error, ..
            } => {
                self.multi
                    .println(format!(
                        "{} {vm} old snapshot deletion failed {snapshot}: {error}",
                        style("\u{2717}").red()
                    ))
                    .ok();
            }
            RotationEvent::DeleteSkipped { snapshot, .. } => {
                self.multi
                    .println(format!("- {vm} would delete old snapshot {snapshot}"))
                    .ok();
            }
            RotationEvent::Finished {
                state: RotationState::Done,
                deleted,
                failed,
                ..
            } => {
                let bar = self.bar(vm_id, vm).clone();
                let mut msg = format!("{} snapshotted", style("\u{2713}").green());
                if *deleted > 0 || *failed > 0 {
                    msg.push_str(&format!(", {deleted} old deleted"));
                }
                if *failed > 0 {
                    msg.push_str(&format!(", {}", style(format!("{failed} failed")).red()));
                }
                bar.set_style(done_style());
                bar.finish_with_message(msg);
            }
            RotationEvent::Finished { .. } => {
                // CreateFailed already finished the bar.
                if let Some(bar) = self.bars.get(vm_id) {
                    if !bar.is_finished() {
                        bar.finish();
                    }
                }
            }
        }
    }

    fn on_finish(&mut self, report: &RunReport) {
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.finish();
            }
        }
        self.multi.println(summary(report)).ok();
    }
}
