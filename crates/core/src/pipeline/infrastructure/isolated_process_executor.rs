use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use crate::pipeline::analyze_video_use_case::PalsyReport;
use crate::pipeline::infrastructure::worker_protocol::{parse_reply_line, WorkerReply};
use crate::pipeline::pipeline_executor::{AnalysisRequest, PipelineExecutor};
use crate::shared::error::PalsyError;

/// Hidden flag that switches the binary into worker mode.
pub const WORKER_FLAG: &str = "--worker";

type ReplyResult = Result<WorkerReply, serde_json::Error>;

/// Runs each request in a fresh worker process.
///
/// Native aborts in the worker surface as [`PalsyError::WorkerCrash`] and the
/// caller keeps running. There is no timeout: a hung worker blocks the caller.
pub struct IsolatedProcessExecutor {
    program: PathBuf,
    args: Vec<String>,
}

impl IsolatedProcessExecutor {
    /// Re-runs the current executable with [`WORKER_FLAG`].
    pub fn current_exe() -> Result<Self, PalsyError> {
        let program = std::env::current_exe().map_err(|e| {
            PalsyError::WorkerProtocol(format!("cannot locate current executable: {e}"))
        })?;
        Ok(Self::with_command(program, vec![WORKER_FLAG.to_string()]))
    }

    pub fn with_command(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn spawn(&self) -> Result<Child, PalsyError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                PalsyError::WorkerProtocol(format!(
                    "cannot start worker {}: {e}",
                    self.program.display()
                ))
            })
    }
}

impl PipelineExecutor for IsolatedProcessExecutor {
    fn execute(&self, request: &AnalysisRequest) -> Result<PalsyReport, PalsyError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| PalsyError::WorkerProtocol(format!("cannot encode request: {e}")))?;
        let mut child = self.spawn()?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PalsyError::WorkerProtocol("worker stdout not captured".into()));
        };
        let (reply_tx, reply_rx) = crossbeam_channel::bounded::<ReplyResult>(1);
        let reader = thread::spawn(move || {
            let mut sent = false;
            // Keep draining after the reply so the worker never blocks on a full pipe.
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                match parse_reply_line(&line) {
                    Some(reply) if !sent => {
                        sent = reply_tx.send(reply).is_ok();
                    }
                    Some(_) => log::warn!("Ignoring extra worker reply"),
                    None => log::debug!("worker: {line}"),
                }
            }
        });

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&payload) {
                // The worker may exit before reading its request.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => {
                    abandon(&mut child, reader);
                    return Err(PalsyError::WorkerProtocol(format!(
                        "cannot send request to worker: {e}"
                    )));
                }
                Ok(()) => {}
            }
        }

        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => {
                abandon(&mut child, reader);
                return Err(PalsyError::WorkerProtocol(format!(
                    "cannot wait for worker: {e}"
                )));
            }
        };
        if reader.join().is_err() {
            log::warn!("Worker output reader panicked");
        }

        if !status.success() {
            log::error!("Worker terminated abnormally: {status}");
            return Err(crash_error(status));
        }
        match reply_rx.try_recv() {
            Ok(Ok(reply)) => reply.into_result(),
            Ok(Err(e)) => Err(PalsyError::WorkerProtocol(format!("malformed reply: {e}"))),
            Err(_) => Err(PalsyError::WorkerProtocol(
                "worker exited without a reply".into(),
            )),
        }
    }
}

/// Kills the worker and joins its output reader; used on every early return.
fn abandon(child: &mut Child, reader: thread::JoinHandle<()>) {
    let _ = child.kill();
    let _ = child.wait();
    if reader.join().is_err() {
        log::warn!("Worker output reader panicked");
    }
}

fn crash_error(status: ExitStatus) -> PalsyError {
    PalsyError::WorkerCrash {
        status: status.to_string(),
        code: status.code(),
        signal: exit_signal(status),
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}
