//! Centralised tracing initialisation for smuggler binaries.
//!
//! Resource stdout is reserved for the response document, so log lines go
//! to a log file (`SMUGGLER_LOG`, default `/tmp/smuggler.log`). Echoing to
//! stderr can be switched on after the request has been read, once
//! `smuggler_debug` is known.
//!
//! Safe to call [`init_tracing`] more than once; only the first call takes
//! effect (the global subscriber can only be set once per process).

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Variable naming the log file.
pub const LOG_PATH_VAR: &str = "SMUGGLER_LOG";
/// Log file used when [`LOG_PATH_VAR`] is unset.
pub const DEFAULT_LOG_PATH: &str = "/tmp/smuggler.log";

/// Destination for log lines: an optional file plus a stderr echo switch.
///
/// Without a file every line goes to stderr.
#[derive(Debug, Clone)]
pub struct LogSink {
    file: Option<Arc<Mutex<File>>>,
    echo: Arc<AtomicBool>,
}

impl LogSink {
    /// Truncate or create the log file at `path`.
    pub fn to_file(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
            echo: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn stderr() -> Self {
        Self {
            file: None,
            echo: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Copy every subsequent line to stderr as well.
    pub fn echo_to_stderr(&self, enabled: bool) {
        self.echo.store(enabled || self.file.is_none(), Ordering::Relaxed);
    }

    pub fn echoes_to_stderr(&self) -> bool {
        self.echo.load(Ordering::Relaxed)
    }
}

/// Writer handed out per log event by [`LogSink`].
pub struct LogWriter {
    sink: LogSink,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(file) = &self.sink.file {
            if let Ok(mut file) = file.lock() {
                file.write_all(buf)?;
            }
        }
        if self.sink.echoes_to_stderr() {
            io::stderr().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = &self.sink.file {
            if let Ok(mut file) = file.lock() {
                file.flush()?;
            }
        }
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter { sink: self.clone() }
    }
}

/// Initialise the global tracing subscriber.
///
/// * `json`: when `true`, emit newline-delimited JSON log lines.
/// * `level`: default verbosity when `RUST_LOG` is not set.
/// * `sink`: where lines are written.
///
/// Respects the `RUST_LOG` environment variable for fine-grained filtering.
pub fn init_tracing(json: bool, level: Level, sink: LogSink) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_ansi(false).with_writer(sink).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_ansi(false).with_writer(sink))
            .try_init()
            .ok();
    }
}
