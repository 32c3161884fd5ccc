//! Subprocess execution for the adb transport
//!
//! This is the only place in torq that spawns processes.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tq_core::error::{Fault, Result};
use tq_core::{BackendHandle, CommandOutput, CommandRequest};
use tracing::{debug, warn};

/// How often a bounded call checks whether its child has exited
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Grace period between SIGTERM and SIGKILL when halting a backend
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

fn describe(program: &Path, args: &[String]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().cloned());
    parts.join(" ")
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        buf
    })
}

fn feed_stdin(child: &mut Child, input: Option<&str>) -> Option<JoinHandle<()>> {
    let input = input?.to_string();
    let mut stdin = child.stdin.take()?;
    Some(std::thread::spawn(move || {
        if let Err(e) = stdin.write_all(input.as_bytes()) {
            warn!("Failed to write child stdin: {}", e);
        }
    }))
}

/// Run `program args` to completion and check its exit status against `request`
pub(crate) fn run(program: &Path, args: &[String], request: &CommandRequest) -> Result<CommandOutput> {
    let command = describe(program, args);
    debug!(command = %command, capture = request.capture_output, "Running command");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if request.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Fault::Spawn {
            command: command.clone(),
            source,
        })?;

    let writer = feed_stdin(&mut child, request.input.as_deref());
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let status = match request.timeout {
        None => child.wait()?,
        Some(timeout) => {
            let deadline = Instant::now() + timeout;
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Fault::CommandTimeout { command, timeout });
                }
                std::thread::sleep(WAIT_POLL);
            }
        }
    };

    if let Some(writer) = writer {
        let _ = writer.join();
    }
    let output = CommandOutput {
        stdout: stdout.and_then(|h| h.join().ok()).unwrap_or_default(),
        stderr: stderr.and_then(|h| h.join().ok()).unwrap_or_default(),
        exit_code: status
            .code()
            .ok_or_else(|| Fault::Signalled {
                command: command.clone(),
            })?,
    };

    if !request.accepts(output.exit_code) {
        return Err(Fault::UnexpectedExit {
            command,
            code: output.exit_code,
            stderr: output.stderr_str().trim().to_string(),
        });
    }

    debug!(command = %command, code = output.exit_code, "Command finished");
    Ok(output)
}

/// Start `program args` without waiting, optionally feeding `input` to stdin
pub(crate) fn spawn(program: &Path, args: &[String], input: Option<&str>) -> Result<ChildHandle> {
    let command = describe(program, args);
    debug!(command = %command, "Starting command in background");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .spawn()
        .map_err(|source| Fault::Spawn {
            command: command.clone(),
            source,
        })?;

    if let Some(input) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
    }

    Ok(ChildHandle { command, child })
}

/// Handle on a background adb process
pub struct ChildHandle {
    command: String,
    child: Child,
}

impl ChildHandle {
    #[cfg(unix)]
    fn request_stop(&mut self) {
        // SIGTERM lets adb forward the interrupt so the device side can flush
        unsafe {
            libc::kill(self.child.id() as libc::pid_t, libc::SIGTERM);
        }
    }

    #[cfg(not(unix))]
    fn request_stop(&mut self) {
        let _ = self.child.kill();
    }
}

impl BackendHandle for ChildHandle {
    fn is_running(&mut self) -> Result<bool> {
        Ok(self.child.try_wait()?.is_none())
    }

    fn terminate(&mut self) -> Result<()> {
        if !self.is_running()? {
            return Ok(());
        }
        debug!(command = %self.command, "Terminating background command");
        self.request_stop();

        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if self.child.try_wait()?.is_some() {
                return Ok(());
            }
            std::thread::sleep(WAIT_POLL);
        }

        warn!(command = %self.command, "Background command ignored SIGTERM, killing");
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }

    fn wait(&mut self) -> Result<Option<i32>> {
        Ok(self.child.wait()?.code())
    }
}
