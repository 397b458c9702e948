//! Typed invocation layer for the external pipeline tools
//!
//! Every external tool run goes through [`ToolCommand`], which builds an argument vector
//! (never a shell-interpolated string), captures exit status and stderr, and supports an
//! optional wall-clock timeout with deterministic kill-on-expiry.
//!

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use simple_error::{SimpleResult, bail};

/// Poll interval used while waiting on a child process with a timeout
const TIMEOUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Max stderr lines retained for diagnostics
const STDERR_TAIL_LINE_COUNT: usize = 20;

/// How an external tool run ended
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolExit {
    /// Process ran to completion with the given exit code (-1 if killed by a signal)
    Exited(i32),

    /// Process was killed after exceeding its wall-clock timeout
    TimedOut,
}

impl ToolExit {
    pub fn success(&self) -> bool {
        matches!(self, ToolExit::Exited(0))
    }
}

pub struct ToolResult {
    pub exit: ToolExit,

    /// Final lines of the tool's stderr stream, for diagnostic messages
    ///
    /// Empty when stderr was redirected to a log file instead of captured.
    pub stderr_tail: String,
}

/// One external tool invocation
///
pub struct ToolCommand {
    /// Short human-readable name used in log and error messages
    label: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    stdout_path: Option<Utf8PathBuf>,
    stderr_path: Option<Utf8PathBuf>,
}

impl ToolCommand {
    pub fn new(label: &str, program: &str) -> Self {
        Self {
            label: label.to_string(),
            program: program.to_string(),
            args: Vec::new(),
            timeout: None,
            stdout_path: None,
            stderr_path: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|x| x.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Redirect the tool's stdout to a file
    ///
    /// Without this the tool's stdout is discarded.
    ///
    pub fn stdout_to(mut self, path: &Utf8Path) -> Self {
        self.stdout_path = Some(path.to_owned());
        self
    }

    /// Redirect the tool's stderr to a log file instead of capturing it in memory
    ///
    pub fn stderr_to(mut self, path: &Utf8Path) -> Self {
        self.stderr_path = Some(path.to_owned());
        self
    }

    /// Full command line for log messages
    ///
    pub fn command_line(&self) -> String {
        let mut cmdline = self.program.clone();
        for arg in self.args.iter() {
            cmdline.push(' ');
            cmdline.push_str(arg);
        }
        cmdline
    }

    /// Run the tool to completion and report how it exited
    ///
    /// Failure to launch or plumb the process at all is a hard error; a non-zero exit or
    /// timeout is reported in the returned [`ToolResult`] for the caller to interpret.
    ///
    pub fn run(&self) -> SimpleResult<ToolResult> {
        debug!("Running {}: {}", self.label, self.command_line());

        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null());

        match &self.stdout_path {
            Some(path) => {
                command.stdout(Stdio::from(create_redirect_file(path, &self.label)?));
            }
            None => {
                command.stdout(Stdio::null());
            }
        }
        match &self.stderr_path {
            Some(path) => {
                command.stderr(Stdio::from(create_redirect_file(path, &self.label)?));
            }
            None => {
                command.stderr(Stdio::piped());
            }
        }

        let mut child = match command.spawn() {
            Ok(x) => x,
            Err(e) => {
                bail!("Can't launch {} ('{}'): {e}", self.label, self.program);
            }
        };

        // Drain stderr on a separate thread so a chatty tool can't fill the pipe and stall
        let stderr_thread = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let exit = match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout, &self.label)?,
            None => match child.wait() {
                Ok(status) => ToolExit::Exited(status.code().unwrap_or(-1)),
                Err(e) => {
                    bail!("Can't wait on {}: {e}", self.label);
                }
            },
        };

        let stderr_tail = match stderr_thread {
            Some(handle) => tail_lines(&handle.join().unwrap_or_default()),
            None => String::new(),
        };

        Ok(ToolResult { exit, stderr_tail })
    }

    /// Run the tool and convert any unsuccessful exit into a hard error
    ///
    pub fn run_checked(&self) -> SimpleResult<()> {
        let result = self.run()?;
        match result.exit {
            ToolExit::Exited(0) => Ok(()),
            ToolExit::Exited(code) => {
                bail!(
                    "{} failed with exit code {code}: {}{}",
                    self.label,
                    self.command_line(),
                    format_stderr_tail(&result.stderr_tail)
                );
            }
            ToolExit::TimedOut => {
                bail!("{} timed out: {}", self.label, self.command_line());
            }
        }
    }
}

fn create_redirect_file(path: &Utf8Path, label: &str) -> SimpleResult<std::fs::File> {
    match std::fs::File::create(path) {
        Ok(x) => Ok(x),
        Err(e) => {
            bail!("Can't create {label} redirect file '{path}': {e}");
        }
    }
}

/// Wait for child exit, killing the process when the wall-clock timeout expires
///
fn wait_with_timeout(child: &mut Child, timeout: Duration, label: &str) -> SimpleResult<ToolExit> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok(ToolExit::Exited(status.code().unwrap_or(-1)));
            }
            Ok(None) => {}
            Err(e) => {
                bail!("Can't wait on {label}: {e}");
            }
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(ToolExit::TimedOut);
        }
        std::thread::sleep(TIMEOUT_POLL_INTERVAL);
    }
}

fn tail_lines(text: &str) -> String {
    let lines = text.lines().collect::<Vec<_>>();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINE_COUNT);
    lines[skip..].join("\n")
}

fn format_stderr_tail(stderr_tail: &str) -> String {
    if stderr_tail.is_empty() {
        String::new()
    } else {
        format!("\ntool stderr tail:\n{stderr_tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_exit() {
        let result = ToolCommand::new("test tool", "true").run().unwrap();
        assert_eq!(result.exit, ToolExit::Exited(0));
        assert!(result.exit.success());
    }

    #[test]
    fn test_nonzero_exit() {
        let result = ToolCommand::new("test tool", "false").run().unwrap();
        assert_eq!(result.exit, ToolExit::Exited(1));
        assert!(!result.exit.success());
        assert!(ToolCommand::new("test tool", "false").run_checked().is_err());
    }

    #[test]
    fn test_missing_program_is_hard_error() {
        assert!(
            ToolCommand::new("test tool", "garfish-no-such-tool")
                .run()
                .is_err()
        );
    }

    #[test]
    fn test_stderr_capture() {
        let result = ToolCommand::new("test tool", "sh")
            .arg("-c")
            .arg("echo plumbing detail >&2; exit 3")
            .run()
            .unwrap();
        assert_eq!(result.exit, ToolExit::Exited(3));
        assert_eq!(result.stderr_tail, "plumbing detail");
    }

    #[test]
    fn test_timeout_kills_process() {
        let start = Instant::now();
        let result = ToolCommand::new("test tool", "sleep")
            .arg("30")
            .timeout(Duration::from_millis(300))
            .run()
            .unwrap();
        assert_eq!(result.exit, ToolExit::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_stdout_redirect() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let out_path = Utf8Path::from_path(tmp_dir.path()).unwrap().join("out.txt");
        ToolCommand::new("test tool", "sh")
            .arg("-c")
            .arg("echo captured")
            .stdout_to(&out_path)
            .run_checked()
            .unwrap();
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "captured\n");
    }
}
