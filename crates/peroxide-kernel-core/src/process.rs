//! The interpreter child process.
//!
//! Owns the process handle, a writer into its input and an [`Expecter`] over
//! its merged stdout/stderr. Output is pumped by reader threads into a
//! channel so that waits can time out.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;

use regex::Regex;

use crate::config::{InterpreterConfig, Transport};
use crate::error::{Error, Result};
use crate::expect::{Expecter, Match};

/// A running interpreter.
pub struct ChildProcess {
    child: Child,
    input: Box<dyn Write + Send>,
    output: Expecter,
    killed: bool,
}

impl ChildProcess {
    /// Spawn the interpreter described by `config`.
    pub fn spawn(config: &InterpreterConfig) -> Result<Self> {
        let mut command = Command::new(&config.program);
        command.args(&config.args).envs(&config.env);

        let (tx, rx) = mpsc::channel();

        let (child, input): (Child, Box<dyn Write + Send>) = match config.transport {
            Transport::Pty => spawn_pty(command, config, tx)?,
            Transport::Pipe => spawn_pipes(command, config, tx)?,
        };

        tracing::info!(
            "Spawned interpreter {} (pid {}, {:?})",
            config.program.display(),
            child.id(),
            config.transport
        );

        Ok(Self {
            child,
            input,
            output: Expecter::new(rx),
            killed: false,
        })
    }

    /// Limit every wait for output to `timeout`.
    pub fn set_timeout(&mut self, timeout: Option<std::time::Duration>) {
        self.output.set_timeout(timeout);
    }

    /// Write `line` followed by a newline.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        if self.killed {
            return Err(Error::ChildExited {
                pending: String::new(),
            });
        }
        self.input.write_all(line.as_bytes())?;
        self.input.write_all(b"\n")?;
        self.input.flush()?;
        Ok(())
    }

    /// Wait for one of `patterns` in the interpreter's output.
    pub fn expect(&mut self, patterns: &[Regex]) -> Result<Match> {
        self.output.expect(patterns)
    }

    /// Check if the interpreter is still running.
    pub fn is_alive(&mut self) -> bool {
        if self.killed {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Kill the interpreter and reap it.
    pub fn kill(&mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }
        self.killed = true;

        if let Err(e) = self.child.kill() {
            // InvalidInput means the process already exited
            if e.kind() != std::io::ErrorKind::InvalidInput {
                tracing::warn!("Failed to kill interpreter: {}", e);
            }
        }
        let status = self.child.wait()?;
        tracing::debug!("Interpreter exited with {}", status);
        Ok(())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        let _ = self.kill();
    }
}

#[cfg(unix)]
fn spawn_pty(
    mut command: Command,
    config: &InterpreterConfig,
    tx: mpsc::Sender<Vec<u8>>,
) -> Result<(Child, Box<dyn Write + Send>)> {
    use crate::pty::PtyPair;

    let pair = PtyPair::open()?;
    pair.attach(&mut command)?;

    let child = command.spawn().map_err(|e| spawn_error(config, e))?;
    // Close our copies of the slave so EOF reaches the master when the child exits.
    drop(command);
    let PtyPair { master, slave } = pair;
    drop(slave);

    spawn_reader(master.try_clone()?, tx);
    Ok((child, Box::new(master)))
}

#[cfg(not(unix))]
fn spawn_pty(
    _command: Command,
    _config: &InterpreterConfig,
    _tx: mpsc::Sender<Vec<u8>>,
) -> Result<(Child, Box<dyn Write + Send>)> {
    Err(Error::Unsupported(
        "pseudo-terminals are only available on unix".to_string(),
    ))
}

fn spawn_pipes(
    mut command: Command,
    config: &InterpreterConfig,
    tx: mpsc::Sender<Vec<u8>>,
) -> Result<(Child, Box<dyn Write + Send>)> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(config, e))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| spawn_error(config, "failed to get stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spawn_error(config, "failed to get stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| spawn_error(config, "failed to get stderr"))?;

    spawn_reader(stdout, tx.clone());
    spawn_reader(stderr, tx);
    Ok((child, Box::new(stdin)))
}

fn spawn_error(config: &InterpreterConfig, e: impl std::fmt::Display) -> Error {
    Error::Spawn {
        program: config.program.clone(),
        message: e.to_string(),
    }
}

/// Pump `stream` into `tx` until EOF.
///
/// A pty master reports EIO once the slave side is gone; that is treated
/// as EOF like any other read error.
fn spawn_reader<R>(mut stream: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match stream.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::debug!("Interpreter output closed: {}", err);
                    break;
                }
            }
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn cat(transport: Transport) -> InterpreterConfig {
        InterpreterConfig::new("/bin/cat")
            .with_args(Vec::<String>::new())
            .with_transport(transport)
    }

    #[test]
    fn test_pipe_roundtrip() {
        let mut child = ChildProcess::spawn(&cat(Transport::Pipe)).unwrap();
        child.send_line("hello").unwrap();

        let m = child.expect(&[Regex::new("hello\n").unwrap()]).unwrap();
        assert_eq!(m.index, 0);
        assert!(child.is_alive());
    }

    #[test]
    fn test_pty_does_not_echo() {
        let mut child = ChildProcess::spawn(&cat(Transport::Pty)).unwrap();
        child.send_line("ping").unwrap();

        // cat writes the line back once; with echo on it would appear twice
        let m = child.expect(&[Regex::new("ping\n").unwrap()]).unwrap();
        assert_eq!(m.before, "");
        child.send_line("pong").unwrap();
        let m = child.expect(&[Regex::new("pong\n").unwrap()]).unwrap();
        assert_eq!(m.before, "");
    }

    #[test]
    fn test_spawn_missing_binary() {
        let config = InterpreterConfig::new("/nonexistent/peroxide").with_transport(Transport::Pipe);
        assert!(matches!(
            ChildProcess::spawn(&config),
            Err(Error::Spawn { .. })
        ));
    }

    #[test]
    fn test_kill_then_send_fails() {
        let mut child = ChildProcess::spawn(&cat(Transport::Pipe)).unwrap();
        child.kill().unwrap();
        assert!(!child.is_alive());
        assert!(child.send_line("x").is_err());
    }
}
