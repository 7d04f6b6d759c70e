use std::io::IsTerminal;

use clap::Parser;
use tokio::sync::mpsc;

use xo_rotate::auth;
use xo_rotate::backend::xo::XoSession;
use xo_rotate::cli::{Cli, OutputFormat};
use xo_rotate::config;
use xo_rotate::logging;
use xo_rotate::observer;
use xo_rotate::rotation;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let output_format = resolve_output_format(cli.output);
    logging::init(output_format, cli.verbose, cli.log_file.as_deref())?;

    let file_config = config::load(cli.config.as_deref())?;
    let settings = config::resolve(&cli, file_config)?;
    tracing::debug!(url = %settings.api_url, options = ?settings.options, "resolved settings");

    let credentials = auth::credentials(settings.auth.clone())?;
    let session = XoSession::sign_in(&settings.api_url, &credentials).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut obs = observer::create(output_format);
    let (report, ()) = tokio::join!(
        rotation::run(&session, &settings.options, tx),
        observer::drive(rx, &mut *obs),
    );
    let report = report?;
    obs.on_finish(&report);

    tracing::info!(
        snapshotted = report.snapshotted(),
        failed = report.failed(),
        deleted = report.deleted(),
        delete_failures = report.delete_failures(),
        "run finished"
    );
    Ok(())
}

/// `Auto` becomes interactive only when both ends are a terminal.
fn resolve_output_format(format: OutputFormat) -> OutputFormat {
    match format {
        OutputFormat::Auto => {
            if !std::io::stdout().is_terminal() || !std::io::stdin().is_terminal() {
                OutputFormat::Plain
            } else {
                OutputFormat::Interactive
            }
        }
        other => other,
    }
}
