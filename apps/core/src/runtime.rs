use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::config::{self, ConfigError};
use crate::core_service::{CoreService, ServiceError};
use crate::logging;

#[derive(Debug)]
pub enum RuntimeError {
    Config(ConfigError),
    Service(ServiceError),
    Io(std::io::Error),
    Rejected(String),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(error) => write!(f, "config error: {error}"),
            Self::Service(error) => write!(f, "service error: {error}"),
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::Rejected(message) => write!(f, "wrong input: {message}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<ConfigError> for RuntimeError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ServiceError> for RuntimeError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Submit { input: String, config_mode: bool },
    History { json: bool },
    Serve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub command: CliCommand,
    pub config_path: Option<PathBuf>,
    pub storage_path: Option<PathBuf>,
    pub starter_path: Option<PathBuf>,
}

pub const USAGE: &str = "usage: run1c-core [--config <path>] [--storage <path>] [--starter <path>] \
<submit <text> [--config-mode] | history [--json] | serve>";

pub fn parse_cli_args(args: &[String]) -> Result<CliOptions, String> {
    let mut config_path = None;
    let mut storage_path = None;
    let mut starter_path = None;
    let mut config_mode = false;
    let mut json = false;
    let mut positional: Vec<&str> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config_path = Some(PathBuf::from(option_value(&mut iter, arg)?)),
            "--storage" => storage_path = Some(PathBuf::from(option_value(&mut iter, arg)?)),
            "--starter" => starter_path = Some(PathBuf::from(option_value(&mut iter, arg)?)),
            "--config-mode" => config_mode = true,
            "--json" => json = true,
            other if other.starts_with("--") => {
                return Err(format!("unknown option '{other}'. {USAGE}"));
            }
            other => positional.push(other),
        }
    }

    let command = match positional.as_slice() {
        ["submit", input] => CliCommand::Submit {
            input: (*input).to_string(),
            config_mode,
        },
        ["submit"] => return Err(format!("submit requires the text to launch. {USAGE}")),
        ["history"] => CliCommand::History { json },
        ["serve"] => CliCommand::Serve,
        [] => return Err(format!("missing command. {USAGE}")),
        _ => return Err(format!("unexpected arguments: {}. {USAGE}", positional.join(" "))),
    };

    if config_mode && !matches!(command, CliCommand::Submit { .. }) {
        return Err("--config-mode only applies to submit".to_string());
    }
    if json && !matches!(command, CliCommand::History { .. }) {
        return Err("--json only applies to history".to_string());
    }

    Ok(CliOptions {
        command,
        config_path,
        storage_path,
        starter_path,
    })
}

fn option_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a str, String> {
    iter.next()
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| format!("{flag} requires a value"))
}

pub fn run_with_options(options: CliOptions) -> Result<(), RuntimeError> {
    enable_utf8_console();

    let mut config = config::load(options.config_path.as_deref())?;
    if let Some(path) = options.storage_path {
        config.storage_path = Some(path);
    }
    if let Some(path) = options.starter_path {
        config.starter_path = Some(path);
    }

    if let Err(error) = logging::init() {
        eprintln!("[run1c-core] file logging unavailable: {error}");
    }
    logging::info(&format!(
        "startup config_path={} storage_path={} starter_path={}",
        config.config_path.display(),
        config.resolved_storage_path().display(),
        config.resolved_starter_path().display(),
    ));

    let mut service = CoreService::new(config)?;
    let result = match options.command {
        CliCommand::Submit { input, config_mode } => {
            let outcome = service.submit(&input, config_mode);
            if outcome.ok {
                println!("{}", outcome.message);
                Ok(())
            } else {
                Err(RuntimeError::Rejected(outcome.message))
            }
        }
        CliCommand::History { json } => print_history(&service.history(), json),
        CliCommand::Serve => serve(&mut service),
    };

    service.persist();
    result
}

fn print_history(entries: &[String], json: bool) -> Result<(), RuntimeError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        let encoded = serde_json::to_string(entries)
            .map_err(|error| RuntimeError::Io(std::io::Error::other(error)))?;
        writeln!(out, "{encoded}")?;
        return Ok(());
    }

    // Most recent first, the way the history list is shown.
    for entry in entries.iter().rev() {
        writeln!(out, "{entry}")?;
    }
    Ok(())
}

fn serve(service: &mut CoreService) -> Result<(), RuntimeError> {
    logging::info("serving JSON requests on stdin");
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = crate::transport::handle_json(service, &line);
        writeln!(out, "{response}")?;
        out.flush()?;
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn enable_utf8_console() {
    use windows_sys::Win32::Globalization::CP_UTF8;
    use windows_sys::Win32::System::Console::SetConsoleOutputCP;

    unsafe {
        SetConsoleOutputCP(CP_UTF8);
    }
}

#[cfg(not(target_os = "windows"))]
fn enable_utf8_console() {}
