//! Proxy configuration, environment overrides and validation.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the worker executable.
pub const WORKER_PATH_ENV: &str = "GRIDIO_WORKER_PATH";
/// Environment variable overriding the per-call timeout, in milliseconds.
pub const CALL_TIMEOUT_ENV: &str = "GRIDIO_CALL_TIMEOUT_MS";
/// Executable name of the worker.
pub const WORKER_NAME: &str = "gridio-worker";

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ── ConfigError ────────────────────────────────────────────────

/// Errors detected during [`ProxyConfig::validate()`] or environment parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The worker program path is empty.
    EmptyWorkerProgram,
    /// `call_timeout` is zero.
    ZeroCallTimeout,
    /// An environment variable holds an unusable value.
    InvalidEnv {
        /// The variable.
        var: &'static str,
        /// Its value.
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWorkerProgram => write!(f, "worker program path is empty"),
            Self::ZeroCallTimeout => write!(f, "call_timeout must be greater than zero"),
            Self::InvalidEnv { var, value } => {
                write!(f, "invalid value {value:?} for {var}")
            }
        }
    }
}

impl Error for ConfigError {}

// ── ProxyConfig ────────────────────────────────────────────────

/// How the proxy launches and talks to its worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Worker executable. Default: `gridio-worker` next to the current
    /// executable when present, else looked up on `PATH`.
    pub worker_program: PathBuf,
    /// Longest a single call may take before the worker is considered hung.
    /// Default: 60 s.
    pub call_timeout: Duration,
    /// Time the worker gets to exit after a shutdown request before it is
    /// killed. Default: 2 s.
    pub shutdown_grace: Duration,
    /// Extra environment variables for the worker process.
    pub env: Vec<(String, String)>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            worker_program: default_worker_program(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            env: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Configuration for a specific worker executable.
    pub fn for_worker(program: impl Into<PathBuf>) -> Self {
        Self {
            worker_program: program.into(),
            ..Self::default()
        }
    }

    /// Defaults with overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply [`WORKER_PATH_ENV`] and [`CALL_TIMEOUT_ENV`] as reported by
    /// `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup(WORKER_PATH_ENV) {
            self.worker_program = PathBuf::from(path);
        }
        if let Some(raw) = lookup(CALL_TIMEOUT_ENV) {
            let ms: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: CALL_TIMEOUT_ENV,
                value: raw.clone(),
            })?;
            self.call_timeout = Duration::from_millis(ms);
        }
        self.validate()?;
        Ok(self)
    }

    /// Set an environment variable for the worker process.
    pub fn with_worker_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_program.as_os_str().is_empty() {
            return Err(ConfigError::EmptyWorkerProgram);
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::ZeroCallTimeout);
        }
        Ok(())
    }
}

fn default_worker_program() -> PathBuf {
    let file_name = format!("{WORKER_NAME}{}", std::env::consts::EXE_SUFFIX);
    // Test binaries live one level below the worker, in `deps/`.
    std::env::current_exe()
        .ok()
        .and_then(|exe| {
            exe.ancestors()
                .skip(1)
                .take(2)
                .map(|dir| dir.join(&file_name))
                .find(|candidate| candidate.is_file())
        })
        .unwrap_or_else(|| PathBuf::from(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ProxyConfig::default();
        assert_eq!(config.call_timeout, Duration::from_secs(60));
        assert_eq!(config.shutdown_grace, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_apply() {
        let config = ProxyConfig::default()
            .with_overrides(|var| match var {
                WORKER_PATH_ENV => Some("/opt/gridio/worker".into()),
                CALL_TIMEOUT_ENV => Some("250".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.worker_program, PathBuf::from("/opt/gridio/worker"));
        assert_eq!(config.call_timeout, Duration::from_millis(250));
    }

    #[test]
    fn unparsable_timeout_is_rejected() {
        let err = ProxyConfig::default()
            .with_overrides(|var| (var == CALL_TIMEOUT_ENV).then(|| "soon".into()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: CALL_TIMEOUT_ENV,
                value: "soon".into()
            }
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ProxyConfig::default()
            .with_overrides(|var| (var == CALL_TIMEOUT_ENV).then(|| "0".into()))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCallTimeout);
    }

    #[test]
    fn empty_program_is_rejected() {
        let config = ProxyConfig::for_worker("");
        assert_eq!(config.validate(), Err(ConfigError::EmptyWorkerProgram));
    }
}
