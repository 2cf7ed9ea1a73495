use std::{
    borrow::Cow,
    io::{self, Write},
    time::Duration,
};

#[cfg(test)]
use std::sync::{Arc, Mutex, PoisonError};

/// Lines shared between a test console and its [`Captured`] output.
#[cfg(test)]
type SharedLines = Arc<Mutex<Vec<String>>>;

use indicatif::ProgressBar;

/// Spinner redraw period.
const TICK_INTERVAL: Duration = Duration::from_millis(150);

/// Destination of operator-facing output.
enum Sink {
    /// Process standard output.
    Stdout,

    /// Process standard error.
    Stderr,

    /// In-memory buffer that collects everything written.
    #[cfg(test)]
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl Sink {
    /// Write the whole `bytes` slice and flush it immediately.
    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(bytes)?;
                stdout.flush()
            }
            Sink::Stderr => {
                let mut stderr = io::stderr().lock();
                stderr.write_all(bytes)?;
                stderr.flush()
            }
            #[cfg(test)]
            Sink::Buffer(buffer) => {
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(bytes);
                Ok(())
            }
        }
    }
}

/// Operator terminal.
///
/// [`Console`] owns the verbosity setting and decides where status indicators,
/// echoed sub-process output and error reports end up.
pub(crate) struct Console {
    /// Echo captured sub-process standard output.
    verbose: bool,

    /// Regular output destination.
    out: Sink,

    /// Error report destination.
    err: Sink,

    /// Draw spinners on the terminal.
    draw: bool,

    /// Final messages of finished status indicators.
    #[cfg(test)]
    finished: Option<SharedLines>,
}

impl Console {
    /// Create new console attached to the process standard streams.
    pub(crate) fn new(verbose: bool) -> Self {
        Self {
            verbose,
            out: Sink::Stdout,
            err: Sink::Stderr,
            draw: true,
            #[cfg(test)]
            finished: None,
        }
    }

    /// Check whether captured sub-process output should be echoed.
    pub(crate) fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Start a new status indicator with the provided text.
    pub(crate) fn status(&self, message: impl Into<Cow<'static, str>>) -> Status {
        let bar = if self.draw {
            let bar = ProgressBar::new_spinner();
            bar.enable_steady_tick(TICK_INTERVAL);
            bar
        } else {
            ProgressBar::hidden()
        };

        bar.set_message(message);

        Status {
            bar,
            #[cfg(test)]
            finished: self.finished.clone(),
        }
    }

    /// Echo captured sub-process output, if the console is verbose.
    pub(crate) fn echo(&self, status: &Status, output: &[u8]) -> io::Result<()> {
        if !self.verbose || output.is_empty() {
            return Ok(());
        }

        status.bar.suspend(|| self.out.write_all(output))
    }

    /// Write captured sub-process error output verbatim.
    pub(crate) fn report(&self, status: &Status, output: &[u8]) -> io::Result<()> {
        if output.is_empty() {
            return Ok(());
        }

        status.bar.suspend(|| self.err.write_all(output))
    }

    /// Print a single line of regular output.
    pub(crate) fn println(&self, line: impl AsRef<str>) -> io::Result<()> {
        self.out.write_all(format!("{}\n", line.as_ref()).as_bytes())
    }
}

/// Live status indicator for a single operation.
pub(crate) struct Status {
    /// Underlying spinner.
    bar: ProgressBar,

    /// Collector of the final message.
    #[cfg(test)]
    finished: Option<SharedLines>,
}

impl Status {
    /// Replace the status text.
    pub(crate) fn update_text(&self, message: impl Into<Cow<'static, str>>) {
        self.bar.set_message(message);
    }

    /// Current status text.
    #[cfg(test)]
    pub(crate) fn text(&self) -> String {
        self.bar.message()
    }

    /// Mark the operation as completed successfully.
    pub(crate) fn success(self, message: impl AsRef<str>) {
        let message = format!("✓ {}", message.as_ref());
        #[cfg(test)]
        self.record(&message);
        self.bar.finish_with_message(message);
    }

    /// Mark the operation as failed, keeping the current status text.
    pub(crate) fn fail(self) {
        let message = format!("✗ {}", self.bar.message());
        #[cfg(test)]
        self.record(&message);
        self.bar.abandon_with_message(message);
    }

    /// Keep the final message for inspection by tests.
    #[cfg(test)]
    fn record(&self, message: &str) {
        if let Some(finished) = &self.finished {
            finished
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message.to_owned());
        }
    }
}

/// Output written to a test console.
#[cfg(test)]
pub(crate) struct Captured {
    /// Regular output.
    out: Arc<Mutex<Vec<u8>>>,

    /// Error reports.
    err: Arc<Mutex<Vec<u8>>>,

    /// Final messages of finished status indicators.
    finished: SharedLines,
}

#[cfg(test)]
impl Captured {
    /// Everything written as regular output so far.
    pub(crate) fn stdout(&self) -> Vec<u8> {
        self.out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Everything written as error reports so far.
    pub(crate) fn stderr(&self) -> Vec<u8> {
        self.err
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Final messages of every finished status indicator, in completion order.
    pub(crate) fn statuses(&self) -> Vec<String> {
        self.finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
impl Console {
    /// Create new console without spinners that collects output in memory.
    pub(crate) fn captured(verbose: bool) -> (Self, Captured) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let err = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(Mutex::new(Vec::new()));

        let console = Self {
            verbose,
            out: Sink::Buffer(out.clone()),
            err: Sink::Buffer(err.clone()),
            draw: false,
            finished: Some(finished.clone()),
        };

        (console, Captured { out, err, finished })
    }
}
