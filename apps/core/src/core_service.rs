use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::action_executor::{LaunchError, LaunchReport, ProcessLauncher, SystemLauncher};
use crate::config::{is_starter_valid, validate, Config};
use crate::contract::{CoreRequest, CoreResponse, HistoryResponse, SubmitResponse};
use crate::extract::extract_path;
use crate::history::{self, HISTORY_KEY};
use crate::logging;
use crate::storage::Store;

#[derive(Debug)]
pub enum ServiceError {
    Config(String),
    InvalidInput,
    ExecutableNotFound(PathBuf),
    NoPathFound(String),
    PathNotFound(String),
    Launch(LaunchError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(error) => write!(f, "config error: {error}"),
            Self::InvalidInput => write!(f, "empty input"),
            Self::ExecutableNotFound(path) => {
                write!(f, "1C starter not found at: {}", path.display())
            }
            Self::NoPathFound(input) => {
                write!(f, "could not extract a path from input: {input}")
            }
            Self::PathNotFound(path) => write!(f, "database path does not exist: {path}"),
            Self::Launch(error) => write!(f, "launch error: {error}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<LaunchError> for ServiceError {
    fn from(value: LaunchError) -> Self {
        Self::Launch(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Enterprise,
    Configurator,
}

impl LaunchMode {
    pub fn from_config_flag(config_mode: bool) -> Self {
        if config_mode {
            Self::Configurator
        } else {
            Self::Enterprise
        }
    }

    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Enterprise => "ENTERPRISE",
            Self::Configurator => "CONFIG",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub input: &'a str,
    pub mode: LaunchMode,
}

/// What the UI shows after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub ok: bool,
    pub message: String,
}

pub struct CoreService {
    config: Config,
    store: Store,
    launcher: Box<dyn ProcessLauncher>,
}

impl CoreService {
    pub fn new(config: Config) -> Result<Self, ServiceError> {
        validate(&config).map_err(ServiceError::Config)?;
        let mut store = Store::open(config.resolved_storage_path());
        store.load();
        let launcher = SystemLauncher::new(Duration::from_secs(config.launch_timeout_secs));
        Ok(Self {
            config,
            store,
            launcher: Box::new(launcher),
        })
    }

    pub fn with_parts(
        config: Config,
        store: Store,
        launcher: Box<dyn ProcessLauncher>,
    ) -> Result<Self, ServiceError> {
        validate(&config).map_err(ServiceError::Config)?;
        Ok(Self {
            config,
            store,
            launcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn history(&self) -> Vec<String> {
        history::entries(&self.store)
    }

    /// Runs one request to completion. Nothing after the first failing step executes, and
    /// history is only touched once the launcher has accepted the request.
    pub fn launch(&mut self, request: LaunchRequest<'_>) -> Result<LaunchReport, ServiceError> {
        if request.input.is_empty() {
            return Err(ServiceError::InvalidInput);
        }

        // Re-checked per request so a starter moved mid-session is noticed.
        let starter = self.config.resolved_starter_path();
        if !is_starter_valid(&starter) {
            return Err(ServiceError::ExecutableNotFound(starter));
        }

        logging::info(&format!("processing input: {}", request.input));
        let mut args = vec![request.mode.as_arg().to_string()];

        let path = extract_path(request.input)
            .ok_or_else(|| ServiceError::NoPathFound(request.input.to_string()))?;
        logging::info(&format!("extracted path: {path}"));
        if !Path::new(path).exists() {
            return Err(ServiceError::PathNotFound(path.to_string()));
        }

        args.push("/F".to_string());
        args.push(format!("\"{path}\""));

        let report = self.launcher.launch(&starter, &args)?;
        self.remember(request.input);
        Ok(report)
    }

    /// UI-facing wrapper: every failure is logged and folded into the outcome message.
    pub fn submit(&mut self, input: &str, config_mode: bool) -> SubmitOutcome {
        let request = LaunchRequest {
            input,
            mode: LaunchMode::from_config_flag(config_mode),
        };
        match self.launch(request) {
            Ok(report) => SubmitOutcome {
                ok: true,
                message: format!("launched: {}", report.command_line),
            },
            Err(error) => {
                logging::error(&format!("submit rejected: {error}"));
                SubmitOutcome {
                    ok: false,
                    message: error.to_string(),
                }
            }
        }
    }

    pub fn handle_command(&mut self, request: CoreRequest) -> Result<CoreResponse, ServiceError> {
        match request {
            CoreRequest::Submit(submit) => {
                let mode = LaunchMode::from_config_flag(submit.config_mode);
                let report = self.launch(LaunchRequest {
                    input: &submit.input,
                    mode,
                })?;
                Ok(CoreResponse::Submit(SubmitResponse {
                    ok: true,
                    message: format!("launched: {}", report.command_line),
                }))
            }
            CoreRequest::History => Ok(CoreResponse::History(HistoryResponse {
                entries: self.history(),
            })),
        }
    }

    /// Flushes the store; called on shutdown.
    pub fn persist(&self) {
        if let Err(error) = self.store.save() {
            logging::error(&format!("failed to persist storage: {error}"));
        }
    }

    fn remember(&mut self, input: &str) {
        if !history::is_recordable(input) {
            logging::warn(&format!("input not kept in history: {input:?}"));
            return;
        }
        history::record(self.store.array_mut(HISTORY_KEY), input);
        self.persist();
    }
}
