use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::OutputFormat;
use crate::error::RotateError;

/// Install the global subscriber.
///
/// The terminal layer stays quiet by default: observers own stdout and
/// the spinners own the terminal. `--verbose` turns on debug output,
/// `RUST_LOG` works as usual. `--log-file` adds an always-on debug layer.
pub fn init(
    format: OutputFormat,
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<(), RotateError> {
    let terminal_filter = if verbose {
        EnvFilter::new("xo_rotate=debug")
    } else {
        match format {
            OutputFormat::Interactive => EnvFilter::new("off"),
            _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")),
        }
    };

    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter);

    let file_layer = match log_file {
        Some(path) => {
            let writer = LogFile::open(path).map_err(|source| RotateError::LogFile {
                path: path.display().to_string(),
                source,
            })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(EnvFilter::new("xo_rotate=debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();
    Ok(())
}

// ── LogFile ──────────────────────────────────────────────

/// A `MakeWriter` appending to one shared file.
#[derive(Clone)]
pub struct LogFile {
    inner: Arc<Mutex<File>>,
}

impl LogFile {
    /// Open `path` in append mode, creating parent directories.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

/// Writer returned by `MakeWriter::make_writer`.
pub struct LogFileWriter {
    inner: Arc<Mutex<File>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.inner.lock() {
            Ok(mut f) => f.write(buf),
            // A panic mid-write poisoned the lock; drop the line.
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.inner.lock() {
            Ok(mut f) => f.flush(),
            Err(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileWriter {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_appends_through_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("xo-rotate.log");

        let log = LogFile::open(&path).unwrap();
        log.make_writer().write_all(b"first\n").unwrap();
        log.make_writer().write_all(b"second\n").unwrap();

        let again = LogFile::open(&path).unwrap();
        again.make_writer().write_all(b"third\n").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\nthird\n");
    }
}
