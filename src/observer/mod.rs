//! Rendering of the rotation event stream.
//!
//! Rotation itself never prints. It publishes [`RotationEvent`]s on a
//! channel; an observer drains the channel alongside the run and renders
//! each event, then the final [`RunReport`]. Implementations cover
//! interactive TTY, plain text and JSON lines.

pub mod interactive;
pub mod json;
pub mod plain;

use tokio::sync::mpsc;

use crate::cli::OutputFormat;
use crate::rotation::{RotationEvent, RunReport};

pub trait Observer {
    /// Called for each event, in publication order.
    fn on_event(&mut self, event: &RotationEvent);

    /// Called once after the run with every VM's outcome.
    fn on_finish(&mut self, report: &RunReport);
}

/// Feed events to `observer` until every sender is gone.
pub async fn drive(mut events: mpsc::UnboundedReceiver<RotationEvent>, observer: &mut dyn Observer) {
    while let Some(event) = events.recv().await {
        observer.on_event(&event);
    }
}

/// Observer for a resolved output format (`Auto` renders as plain).
pub fn create(format: OutputFormat) -> Box<dyn Observer> {
    match format {
        OutputFormat::Json => Box::new(json::JsonObserver::new(std::io::stdout())),
        OutputFormat::Interactive => Box::new(interactive::InteractiveObserver::new()),
        OutputFormat::Plain | OutputFormat::Auto => Box::new(plain::PlainObserver::new(
            std::io::stdout(),
            std::io::stderr(),
        )),
    }
}

/// One-line run summary shared by the text observers.
pub fn summary(report: &RunReport) -> String {
    let mut line = format!(
        "{} VM(s) snapshotted, {} failed",
        report.snapshotted(),
        report.failed()
    );
    let deleted = report.deleted();
    let delete_failures = report.delete_failures();
    if deleted > 0 || delete_failures > 0 {
        line.push_str(&format!(
            "; {deleted} old snapshot(s) deleted, {delete_failures} failed"
        ));
    }
    line
}
