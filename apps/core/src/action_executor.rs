use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::logging;

pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    EmptyPath,
    MissingPath(PathBuf),
    LaunchFailed { message: String, code: Option<i32> },
}

impl Display for LaunchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "empty path"),
            Self::MissingPath(path) => write!(f, "path does not exist: {}", path.display()),
            Self::LaunchFailed {
                message,
                code: Some(code),
            } => write!(f, "launch failed (os error {code}): {message}"),
            Self::LaunchFailed {
                message,
                code: None,
            } => write!(f, "launch failed: {message}"),
        }
    }
}

impl std::error::Error for LaunchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub command_line: String,
    /// `None` when the wait timed out or the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

pub trait ProcessLauncher {
    fn launch(&mut self, program: &Path, args: &[String]) -> Result<LaunchReport, LaunchError>;
}

impl<L: ProcessLauncher> ProcessLauncher for Rc<RefCell<L>> {
    fn launch(&mut self, program: &Path, args: &[String]) -> Result<LaunchReport, LaunchError> {
        self.borrow_mut().launch(program, args)
    }
}

/// Spawns real processes, waiting at most `timeout` before leaving the child to run on its own.
pub struct SystemLauncher {
    timeout: Duration,
}

impl SystemLauncher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_LAUNCH_TIMEOUT)
    }
}

impl ProcessLauncher for SystemLauncher {
    fn launch(&mut self, program: &Path, args: &[String]) -> Result<LaunchReport, LaunchError> {
        launch_process(program, args, self.timeout)
    }
}

/// Records invocations instead of spawning.
#[derive(Default)]
pub struct MockLauncher {
    invocations: Vec<(PathBuf, Vec<String>)>,
    failure: Option<LaunchError>,
}

impl MockLauncher {
    pub fn failing(error: LaunchError) -> Self {
        Self {
            invocations: Vec::new(),
            failure: Some(error),
        }
    }

    pub fn invocations(&self) -> &[(PathBuf, Vec<String>)] {
        &self.invocations
    }
}

impl ProcessLauncher for MockLauncher {
    fn launch(&mut self, program: &Path, args: &[String]) -> Result<LaunchReport, LaunchError> {
        validate_program(program)?;
        self.invocations.push((program.to_path_buf(), args.to_vec()));
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(LaunchReport {
            command_line: build_command_line(program, args),
            exit_code: Some(0),
            timed_out: false,
        })
    }
}

pub fn launch_process(
    program: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<LaunchReport, LaunchError> {
    validate_program(program)?;

    let command_line = build_command_line(program, args);
    logging::info(&format!("launching: {command_line}"));

    let mut command = Command::new(program);
    append_args(&mut command, args);
    if let Some(dir) = program.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|error| LaunchError::LaunchFailed {
        message: error.to_string(),
        code: error.raw_os_error(),
    })?;

    let report = match wait_with_timeout(&mut child, timeout) {
        Ok(Some(status)) => {
            if !status.success() {
                logging::warn(&format!(
                    "process exited with status {status}: {command_line}"
                ));
            }
            LaunchReport {
                command_line,
                exit_code: status.code(),
                timed_out: false,
            }
        }
        Ok(None) => {
            logging::warn(&format!(
                "process still running after {}s, leaving it detached: {command_line}",
                timeout.as_secs()
            ));
            LaunchReport {
                command_line,
                exit_code: None,
                timed_out: true,
            }
        }
        Err(error) => {
            logging::warn(&format!("failed to wait for process: {error}"));
            LaunchReport {
                command_line,
                exit_code: None,
                timed_out: false,
            }
        }
    };

    Ok(report)
}

/// Program and arguments joined by single spaces. An argument with whitespace is wrapped in
/// double quotes unless it already starts or ends with one; embedded quotes are not escaped.
pub fn build_command_line(program: &Path, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(quote_if_needed(&program.to_string_lossy()));
    parts.extend(args.iter().map(|arg| quote_if_needed(arg)));
    parts.join(" ")
}

fn quote_if_needed(arg: &str) -> String {
    let touches_quote = arg.starts_with('"') || arg.ends_with('"');
    if arg.chars().any(char::is_whitespace) && !touches_quote {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}

fn is_quoted(arg: &str) -> bool {
    arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"')
}

fn validate_program(program: &Path) -> Result<(), LaunchError> {
    if program.as_os_str().is_empty() {
        return Err(LaunchError::EmptyPath);
    }
    if !program.exists() {
        return Err(LaunchError::MissingPath(program.to_path_buf()));
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn append_args(command: &mut Command, args: &[String]) {
    use std::os::windows::process::CommandExt;

    for arg in args {
        command.raw_arg(quote_if_needed(arg));
    }
}

#[cfg(not(target_os = "windows"))]
fn append_args(command: &mut Command, args: &[String]) {
    for arg in args {
        let plain = if is_quoted(arg) {
            &arg[1..arg.len() - 1]
        } else {
            arg.as_str()
        };
        command.arg(plain);
    }
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<ExitStatus>, std::io::Error> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= timeout {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
