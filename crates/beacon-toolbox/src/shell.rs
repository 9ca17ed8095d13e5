//! Shell command execution with a hard wall-time limit.

use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use tracing::info;

use beacon_types::{Command, CommandResult, ProcessorError};

use crate::feature::{Feature, SHELL_TRIGGER};

/// How often the child process is polled for exit while waiting.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for the shell execution feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Interpreter invoked with `-c`.
    pub interpreter: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            interpreter: "/bin/sh".to_string(),
        }
    }
}

/// Run the remainder of the command as a shell script.
pub struct Shell {
    config: ShellConfig,
}

impl Shell {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }
}

impl Feature for Shell {
    fn trigger(&self) -> &'static str {
        SHELL_TRIGGER
    }

    fn is_configured(&self) -> bool {
        !self.config.interpreter.is_empty()
    }

    fn initialise(&mut self) -> Result<(), ProcessorError> {
        if !Path::new(&self.config.interpreter).exists() {
            return Err(ProcessorError::bad_config(format!(
                "shell interpreter {} does not exist",
                self.config.interpreter
            )));
        }
        Ok(())
    }

    fn self_test(&self) -> Result<(), ProcessorError> {
        let run = run_with_deadline(&self.config.interpreter, "printf beacon-shell-ok", 10)?;
        if run.combined.contains("beacon-shell-ok") {
            Ok(())
        } else {
            Err(ProcessorError::feature(format!(
                "shell self test produced unexpected output: {}",
                run.combined
            )))
        }
    }

    fn execute(&self, mut cmd: Command) -> CommandResult {
        if let Some(reject) = cmd.trim() {
            return reject;
        }
        match run_with_deadline(&self.config.interpreter, &cmd.content, cmd.timeout_secs.max(1)) {
            Ok(run) => {
                let mut ret = CommandResult::with_output(run.combined);
                if run.timed_out {
                    ret.error = Some(ProcessorError::feature(format!(
                        "shell command timed out after {} seconds",
                        cmd.timeout_secs.max(1)
                    )));
                } else if run.exit_code != Some(0) {
                    ret.error = Some(ProcessorError::feature(match run.exit_code {
                        Some(code) => format!("exit status {code}"),
                        None => "terminated by signal".to_string(),
                    }));
                }
                ret
            }
            Err(err) => CommandResult::from_error(err),
        }
    }
}

struct ShellRun {
    combined: String,
    exit_code: Option<i32>,
    timed_out: bool,
}

/// Spawn `interpreter -c script` and wait for it, killing it once the
/// deadline passes. Partial output captured before the kill is preserved.
fn run_with_deadline(
    interpreter: &str,
    script: &str,
    timeout_secs: u64,
) -> Result<ShellRun, ProcessorError> {
    let mut command = ProcessCommand::new(interpreter);
    command
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Each script runs in its own session, so the deadline kill reaches
    // every descendant and none of them can keep the output pipes open.
    //
    // Safety: setsid is async-signal-safe and the child exec's right after.
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid().map_err(std::io::Error::from)?;
            Ok(())
        });
    }
    let mut child = command
        .spawn()
        .map_err(|e| ProcessorError::feature(format!("failed to spawn {interpreter}: {e}")))?;

    let stdout_reader = drain_pipe(child.stdout.take());
    let stderr_reader = drain_pipe(child.stderr.take());

    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    let mut timed_out = false;
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if Instant::now() >= deadline {
                    timed_out = true;
                    kill_and_reap(&mut child);
                    break None;
                }
                std::thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(ProcessorError::feature(format!(
                    "failed to wait for shell command: {e}"
                )));
            }
        }
    };

    let mut combined = stdout_reader.join().unwrap_or_default();
    combined.push_str(&stderr_reader.join().unwrap_or_default());
    info!(
        exit_code,
        timed_out,
        output_bytes = combined.len(),
        "shell command finished"
    );
    Ok(ShellRun {
        combined,
        exit_code,
        timed_out,
    })
}

fn kill_and_reap(child: &mut Child) {
    // setsid above made the child a process group leader, so its pid doubles
    // as the group id.
    let _ = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
    let _ = child.kill();
    let _ = child.wait();
}

/// Drain a child pipe on its own thread so a full pipe buffer cannot wedge
/// the waiting loop.
fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
