use std::io::{self, Read, Write};
use std::process::{Child, ChildStdout, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::runtime::RuntimeError;

use super::engine::Engine;
use super::types::{CommandOutput, DockerCommand};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run a command to completion, capturing stdout and stderr.
///
/// A non-zero exit is *not* an error here; callers classify it. The child
/// is killed once `cmd.timeout` elapses.
pub fn run(engine: &Engine, cmd: &DockerCommand) -> Result<CommandOutput, RuntimeError> {
    let stdin = if cmd.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    let mut child = engine
        .command()
        .args(&cmd.args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RuntimeError::Spawn)?;

    if let Some(input) = &cmd.stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        // Dropping the pipe closes the child's stdin.
        if let Err(e) = pipe.write_all(input.as_bytes()) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RuntimeError::Spawn(e));
        }
    }

    let stdout_handle = child.stdout.take().map(drain);
    let stderr_handle = child.stderr.take().map(drain);

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RuntimeError::Spawn(e));
            }
        }

        if start.elapsed() > cmd.timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RuntimeError::Timeout {
                command: cmd.display(),
                secs: cmd.timeout.as_secs(),
            });
        }

        std::thread::sleep(POLL_INTERVAL);
    };

    Ok(CommandOutput {
        success: status.success(),
        exit_code: status.code(),
        stdout: stdout_handle.map(join_output).unwrap_or_default(),
        stderr: stderr_handle.map(join_output).unwrap_or_default(),
    })
}

/// Spawn a command whose stdout is consumed as a byte stream.
pub fn stream(engine: &Engine, args: &[String]) -> Result<ProcessStream, RuntimeError> {
    let mut child = engine
        .command()
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RuntimeError::Spawn)?;

    let stdout = match child.stdout.take() {
        Some(s) => s,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RuntimeError::Spawn(io::Error::other("child stdout was not piped")));
        }
    };
    let stderr = child.stderr.take().map(drain);

    Ok(ProcessStream {
        command: format!("docker {}", args.join(" ")),
        child,
        stdout,
        stderr,
        finished: false,
    })
}

/// Stdout of a running child process.
///
/// EOF reaps the child; a non-zero exit turns into an I/O error carrying
/// the captured stderr. Dropping the stream before EOF kills the child.
pub struct ProcessStream {
    command: String,
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<Vec<u8>>>,
    finished: bool,
}

impl Read for ProcessStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }

        let n = self.stdout.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.finished = true;
            let status = self.child.wait()?;
            let stderr = self.stderr.take().map(join_output).unwrap_or_default();
            if !status.success() {
                return Err(io::Error::other(format!(
                    "`{}` exited with {}: {}",
                    self.command,
                    status,
                    stderr.trim()
                )));
            }
        }
        Ok(n)
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        // A read error just truncates the captured output.
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_output(handle: JoinHandle<Vec<u8>>) -> String {
    handle
        .join()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

// These drive `sh` through the same code paths instead of docker.
#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh() -> Engine {
        Engine::new("sh", None)
    }

    fn script(body: &str, timeout: Duration) -> DockerCommand {
        DockerCommand::new(vec!["-c".into(), body.into()], timeout)
    }

    #[test]
    fn captures_stdout_and_stderr() {
        let out = run(&sh(), &script("echo out; echo err >&2", Duration::from_secs(5))).unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn non_zero_exit_is_reported_not_raised() {
        let out = run(&sh(), &script("echo boom >&2; exit 3", Duration::from_secs(5))).unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stderr.trim(), "boom");
    }

    #[test]
    fn stdin_is_written_and_closed() {
        let mut cmd = script("cat", Duration::from_secs(5));
        cmd.stdin = Some("secret".into());
        let out = run(&sh(), &cmd).unwrap();
        assert_eq!(out.stdout, "secret");
    }

    #[test]
    fn timeout_kills_the_child() {
        let started = Instant::now();
        let err = run(&sh(), &script("sleep 10", Duration::from_millis(200))).unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout { .. }), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let engine = Engine::new("definitely-not-a-docker-binary", None);
        let err = run(&engine, &script("true", Duration::from_secs(1))).unwrap_err();
        assert!(matches!(err, RuntimeError::Spawn(_)));
    }

    #[test]
    fn stream_yields_stdout_then_eof() {
        let mut s = stream(&sh(), &["-c".into(), "printf 'a\\nb\\n'".into()]).unwrap();
        let mut buf = String::new();
        s.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "a\nb\n");
    }

    #[test]
    fn stream_failure_surfaces_at_eof() {
        let mut s = stream(&sh(), &["-c".into(), "echo partial; echo denied >&2; exit 1".into()])
            .unwrap();
        let mut buf = String::new();
        let err = s.read_to_string(&mut buf).unwrap_err();
        assert!(err.to_string().contains("denied"), "got {err}");
    }

    #[test]
    fn dropping_stream_early_does_not_hang() {
        let s = stream(&sh(), &["-c".into(), "sleep 10".into()]).unwrap();
        let started = Instant::now();
        drop(s);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
