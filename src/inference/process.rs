//! Child process supervision: incremental output capture, deadline and
//! cancellation, process-group kill.

use super::error::InferenceError;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long to wait for a killed process to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Reads a stream line by line into a growing buffer until EOF.
fn spawn_reader<R>(stream: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut text = String::new();
        let Some(stream) = stream else {
            return text;
        };
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => text.push_str(&String::from_utf8_lossy(&line)),
                Err(e) => {
                    debug!("Stopped reading child output: {}", e);
                    break;
                }
            }
        }
        text
    })
}

enum Outcome {
    Exited(std::io::Result<ProcessOutput>),
    TimedOut,
    Cancelled,
}

async fn wait_and_drain(
    child: &mut Child,
    stdout: JoinHandle<String>,
    stderr: JoinHandle<String>,
) -> std::io::Result<ProcessOutput> {
    let status = child.wait().await?;
    let stdout = stdout.await.unwrap_or_default();
    let stderr = stderr.await.unwrap_or_default();
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

/// Spawns `command` and waits for it, bounded by `timeout` and `cancel`.
///
/// The child is placed in its own process group so that, when the deadline
/// or cancellation fires, everything it spawned is killed along with it.
pub async fn run_to_completion(
    mut command: Command,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, InferenceError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(InferenceError::Spawn)?;
    // Also the process group id. Kept because `Child::id` is gone once reaped.
    let pid = child.id();
    debug!("Started inference process pid={:?}", pid);

    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let outcome = {
        let run = wait_and_drain(&mut child, stdout, stderr);
        tokio::pin!(run);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::Cancelled,
            _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            result = &mut run => Outcome::Exited(result),
        }
    };

    match outcome {
        Outcome::Exited(result) => Ok(result?),
        Outcome::TimedOut => {
            warn!("Inference process exceeded {:?}, killing it", timeout);
            kill_process_tree(&mut child, pid).await;
            Err(InferenceError::TimedOut(timeout))
        }
        Outcome::Cancelled => {
            warn!("Inference cancelled by caller, killing process");
            kill_process_tree(&mut child, pid).await;
            Err(InferenceError::Cancelled)
        }
    }
}

/// Best effort: failures are logged and otherwise ignored.
///
/// `pid` is the id the child was spawned with, which is also its process
/// group. The group is signalled even when the child itself has already
/// exited, so that anything it left behind is killed too.
pub async fn kill_process_tree(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        let group = format!("-{}", pid);
        match Command::new("kill")
            .args(["-s", "KILL", "--", group.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) if !status.success() => {
                debug!("kill of process group {} exited with {}", pid, status)
            }
            Ok(_) => {}
            Err(e) => debug!("Could not run kill for process group {}: {}", pid, e),
        }
    }

    match child.try_wait() {
        Ok(Some(status)) => {
            debug!("Inference process {:?} already exited: {}", pid, status);
            return;
        }
        Ok(None) => {}
        Err(e) => debug!("Could not poll process {:?}: {}", pid, e),
    }

    if let Err(e) = child.start_kill() {
        debug!("Could not kill process {:?}: {}", pid, e);
    }

    match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => debug!("Inference process {:?} reaped: {}", pid, status),
        Ok(Err(e)) => debug!("Failed to reap process {:?}: {}", pid, e),
        Err(_) => warn!("Process {:?} not reaped after {:?}", pid, REAP_TIMEOUT),
    }
}
