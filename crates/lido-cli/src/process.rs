use std::{
    io, mem,
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
};
use tracing::debug;

/// Size of a single read from a child process pipe.
const READ_CHUNK_SIZE: usize = 4096;

/// Output buffer shared between a [`ProcessHandle`] and its pipe readers.
type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Output collected from a process since the previous sample.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct OutputSample {
    /// Standard output bytes.
    pub stdout: Vec<u8>,

    /// Standard error bytes.
    pub stderr: Vec<u8>,
}

/// Source of incrementally captured process output.
pub(crate) trait OutputSampler {
    /// Take everything captured since the previous call, leaving the buffers empty.
    fn drain(&mut self) -> OutputSample;
}

/// A single external process invocation.
///
/// The handle owns standard output and standard error buffers, which are reused
/// between invocations: each [`run`](ProcessHandle::run) or
/// [`spawn`](ProcessHandle::spawn) call overwrites them.
#[derive(Default)]
pub(crate) struct ProcessHandle {
    /// Process that is still running in the background, if any.
    child: Option<Child>,

    /// Captured standard output.
    stdout: SharedBuffer,

    /// Captured standard error.
    stderr: SharedBuffer,

    /// Exit status of the last finished process.
    status: Option<ExitStatus>,
}

impl ProcessHandle {
    /// Run `command` to completion, capturing its output in full.
    pub(crate) async fn run(&mut self, command: &mut Command) -> io::Result<ExitStatus> {
        let output = command
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        *lock(&self.stdout) = output.stdout;
        *lock(&self.stderr) = output.stderr;
        self.status = Some(output.status);

        debug!(status = %output.status, "process finished");

        Ok(output.status)
    }

    /// Start `command` in the background.
    ///
    /// Output is appended to the handle buffers as it arrives. The process is killed
    /// when the handle is dropped.
    pub(crate) fn spawn(&mut self, command: &mut Command) -> io::Result<()> {
        if self.child.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "process is already running",
            ));
        }

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        lock(&self.stdout).clear();
        lock(&self.stderr).clear();
        self.status = None;

        capture(child.stdout.take(), self.stdout.clone());
        capture(child.stderr.take(), self.stderr.clone());

        debug!(pid = child.id(), "process spawned");

        self.child = Some(child);

        Ok(())
    }

    /// Terminate the background process, if there is one.
    ///
    /// Returns `false` if no process was recorded.
    pub(crate) async fn kill(&mut self) -> io::Result<bool> {
        let Some(mut child) = self.child.take() else {
            return Ok(false);
        };

        let status = match child.try_wait()? {
            Some(status) => status,
            None => {
                child.kill().await?;
                child.wait().await?
            }
        };

        debug!(%status, "process terminated");
        self.status = Some(status);

        Ok(true)
    }

    /// Check whether a background process is recorded.
    pub(crate) fn is_active(&self) -> bool {
        self.child.is_some()
    }

    /// Exit status of the last finished process.
    pub(crate) fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Copy of the captured standard output.
    #[cfg(test)]
    pub(crate) fn stdout(&self) -> Vec<u8> {
        lock(&self.stdout).clone()
    }

    /// Copy of the captured standard error.
    pub(crate) fn stderr(&self) -> Vec<u8> {
        lock(&self.stderr).clone()
    }

    /// Take the captured standard output, leaving the buffer empty.
    pub(crate) fn take_stdout(&mut self) -> Vec<u8> {
        mem::take(&mut *lock(&self.stdout))
    }
}

impl OutputSampler for ProcessHandle {
    fn drain(&mut self) -> OutputSample {
        OutputSample {
            stdout: mem::take(&mut *lock(&self.stdout)),
            stderr: mem::take(&mut *lock(&self.stderr)),
        }
    }
}

/// Lock the buffer, ignoring poisoning since readers only ever append bytes.
fn lock(buffer: &SharedBuffer) -> MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spawn a task that copies everything from `reader` into `buffer` until EOF.
fn capture<R>(reader: Option<R>, buffer: SharedBuffer)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(mut reader) = reader else {
        return;
    };

    tokio::spawn(async move {
        let mut chunk = [0; READ_CHUNK_SIZE];

        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(len) => lock(&buffer).extend_from_slice(&chunk[..len]),
                Err(error) => {
                    debug!(%error, "unable to read process output");
                    break;
                }
            }
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use tokio::process::Command;

    use super::{OutputSampler, ProcessHandle};

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.args(["-c", script]);
        command
    }

    #[tokio::test]
    async fn run_captures_output_and_status() {
        let mut handle = ProcessHandle::default();

        let status = handle
            .run(&mut shell("printf 'deployed'; printf 'warning' >&2; exit 4"))
            .await
            .unwrap();

        assert_eq!(status.code(), Some(4));
        assert_eq!(handle.status(), Some(status));
        assert_eq!(handle.stdout(), b"deployed");
        assert_eq!(handle.stderr(), b"warning");
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn run_overwrites_previous_output() {
        let mut handle = ProcessHandle::default();

        handle
            .run(&mut shell("echo first; echo first >&2"))
            .await
            .unwrap();
        assert_eq!(handle.take_stdout(), b"first\n");
        assert!(handle.stdout().is_empty());

        let status = handle.run(&mut shell("echo second")).await.unwrap();

        assert!(status.success());
        assert_eq!(handle.stdout(), b"second\n");
        assert!(handle.stderr().is_empty());
    }

    #[tokio::test]
    async fn run_reports_missing_program() {
        let mut handle = ProcessHandle::default();

        let error = handle
            .run(&mut Command::new("./definitely-not-a-program"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn spawned_output_is_drained_and_process_killed() {
        let mut handle = ProcessHandle::default();

        handle
            .spawn(&mut shell("echo started; echo noise >&2; exec sleep 30"))
            .unwrap();
        assert!(handle.is_active());

        let mut sample = handle.drain();
        for _ in 0..250 {
            if !sample.stdout.is_empty() && !sample.stderr.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            let next = handle.drain();
            sample.stdout.extend(next.stdout);
            sample.stderr.extend(next.stderr);
        }

        assert_eq!(sample.stdout, b"started\n");
        assert_eq!(sample.stderr, b"noise\n");
        assert!(handle.drain().stdout.is_empty());

        assert!(handle
            .spawn(&mut shell("true"))
            .is_err_and(|error| error.kind() == std::io::ErrorKind::AlreadyExists));

        assert!(handle.kill().await.unwrap());
        assert!(!handle.is_active());
        assert!(handle.status().is_some_and(|status| !status.success()));

        assert!(!handle.kill().await.unwrap());
    }
}
