// src/exec/process.rs

//! External-process task.

use std::io::{self, ErrorKind};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{BoxFuture, Reporter, Task, TaskOutcome};

/// How long a terminated process gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// How long output readers may keep draining after the child is gone.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Runs a command to completion; exit status 0 is success, anything else
/// (including death by signal) is failure.
///
/// Cancellation sends SIGTERM to a running child and reaps it. A task
/// canceled before `run` never spawns anything. Stdin input is written
/// while the child runs, so cancel and timeout apply to a child that never
/// reads it.
#[derive(Debug)]
pub struct ProcessTask {
    cmd: Vec<String>,
    input: Option<Vec<u8>>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl ProcessTask {
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            input: None,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Bytes written to the child's stdin, which is closed afterwards.
    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Terminate the child and fail if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn command_line(&self) -> String {
        self.cmd.join(" ")
    }

    /// `None` means the run was canceled and has nothing to report.
    async fn run_inner(&self) -> Result<Option<TaskOutcome>> {
        let (program, args) = self.cmd.split_first().context("empty command")?;
        let cmd_line = self.command_line();

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if self.input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process `{cmd_line}`"))?;

        info!(cmd = %cmd_line, pid = ?child.id(), "started process");

        let feed = match &self.input {
            Some(input) => {
                let stdin = child.stdin.take().context("child stdin was not captured")?;
                Some((stdin, input.as_slice()))
            }
            None => None,
        };

        let readers = [
            forward_lines(child.stdout.take(), cmd_line.clone(), "stdout"),
            forward_lines(child.stderr.take(), cmd_line.clone(), "stderr"),
        ];

        let deadline = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                info!(cmd = %cmd_line, "cancellation requested; terminating process");
                terminate(&mut child, &cmd_line).await;
                Ok(None)
            }

            (fed, status) = wait_feeding(&mut child, feed) => {
                status
                    .with_context(|| format!("waiting for process `{cmd_line}`"))
                    .and_then(|status| {
                        if let Some(Err(e)) = fed {
                            return Err(e)
                                .with_context(|| format!("writing stdin of `{cmd_line}`"));
                        }

                        info!(
                            cmd = %cmd_line,
                            exit_code = ?status.code(),
                            success = status.success(),
                            "process exited"
                        );

                        Ok(Some(if status.success() {
                            TaskOutcome::Succeeded
                        } else {
                            TaskOutcome::Failed
                        }))
                    })
            }

            _ = deadline => {
                warn!(cmd = %cmd_line, timeout = ?self.timeout, "process timed out; terminating");
                terminate(&mut child, &cmd_line).await;
                Ok(Some(TaskOutcome::Failed))
            }
        };

        finish_readers(readers, &cmd_line).await;
        result
    }
}

impl Task for ProcessTask {
    fn run(&self, reporter: Reporter) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                debug!(cmd = %self.command_line(), "process task canceled before spawn");
                return;
            }

            match self.run_inner().await {
                Ok(Some(outcome)) => reporter.report(outcome).await,
                Ok(None) => {}
                Err(err) => {
                    error!(
                        cmd = %self.command_line(),
                        error = %format!("{err:#}"),
                        "process task error"
                    );
                    reporter.failed().await;
                }
            }
        })
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Ask the child to stop, then reap it; escalate to a kill after
/// [`TERMINATE_GRACE`].
async fn terminate(child: &mut Child, cmd_line: &str) {
    send_sigterm(child, cmd_line);

    match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(cmd = %cmd_line, ?status, "terminated process reaped");
        }
        Ok(Err(e)) => {
            warn!(cmd = %cmd_line, error = %e, "failed to reap terminated process");
        }
        Err(_) => {
            warn!(cmd = %cmd_line, "process ignored SIGTERM; killing");
            if let Err(e) = child.kill().await {
                warn!(cmd = %cmd_line, error = %e, "failed to kill process");
            }
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child, cmd_line: &str) {
    // `id()` is `None` once the child has been reaped; nothing to signal.
    let Some(pid) = child.id() else {
        debug!(cmd = %cmd_line, "process already exited; nothing to terminate");
        return;
    };

    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        debug!(
            cmd = %cmd_line,
            pid,
            error = %std::io::Error::last_os_error(),
            "SIGTERM not delivered; process likely already gone"
        );
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child, cmd_line: &str) {
    if let Err(e) = child.start_kill() {
        debug!(cmd = %cmd_line, error = %e, "process already exited");
    }
}

/// Wait for the child to exit while writing its stdin.
///
/// The write result is `None` if the child exited before the write
/// finished; the pending write is then dropped, closing the pipe.
async fn wait_feeding(
    child: &mut Child,
    feed: Option<(ChildStdin, &[u8])>,
) -> (Option<io::Result<()>>, io::Result<ExitStatus>) {
    let write = write_stdin(feed);
    tokio::pin!(write);

    let mut fed = None;
    loop {
        tokio::select! {
            result = &mut write, if fed.is_none() => fed = Some(result),
            status = child.wait() => return (fed, status),
        }
    }
}

/// Write `input` and close the pipe. A child that exits without reading
/// everything is not an error; its exit status decides the outcome.
async fn write_stdin(feed: Option<(ChildStdin, &[u8])>) -> io::Result<()> {
    let Some((mut stdin, input)) = feed else {
        return Ok(());
    };

    match stdin.write_all(input).await {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("child closed stdin before reading all input");
            Ok(())
        }
        other => other,
    }
}

/// Drain a child output stream, logging each line at debug.
fn forward_lines<R>(
    reader: Option<R>,
    cmd_line: String,
    stream: &'static str,
) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let reader = reader?;

    Some(tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(cmd = %cmd_line, stream, "{}", line);
        }
    }))
}

/// Give the output readers [`OUTPUT_DRAIN_GRACE`] to hit EOF, then abort
/// them. A grandchild that inherited the pipes keeps them open otherwise.
async fn finish_readers(readers: [Option<JoinHandle<()>>; 2], cmd_line: &str) {
    for mut reader in readers.into_iter().flatten() {
        if tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut reader)
            .await
            .is_err()
        {
            debug!(cmd = %cmd_line, "output still open after exit; detaching reader");
            reader.abort();
        }
    }
}
