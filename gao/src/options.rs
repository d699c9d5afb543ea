//! Orchestrator configuration.

use crate::logging::LogLevel;
use crate::util::resolve_binary;
use gao_shared::errors::{GaoError, GaoResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the directory that holds per-architecture
/// sandbox executables. Read only by [`OrchestratorOptions::from_env`].
pub const BIN_DIR_ENV: &str = "GAO_BIN_DIR";

/// Everything needed to spawn and drive one sandbox subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorOptions {
    /// Sandbox executable to spawn.
    pub binary: PathBuf,
    /// Extra arguments passed to the executable.
    pub args: Vec<String>,
    /// Extra environment for the subprocess, on top of the inherited one.
    pub env: Vec<(String, String)>,
    /// Kill the subprocess when the owning process dies instead of leaving
    /// it running as an orphan. Linux only. The kernel ties this to the
    /// spawning thread, so spawn from a thread that outlives the orchestrator.
    pub terminate_with_parent: bool,
    pub log_level: LogLevel,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::new(),
            args: Vec::new(),
            env: Vec::new(),
            terminate_with_parent: true,
            log_level: LogLevel::default(),
        }
    }
}

impl OrchestratorOptions {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ..Default::default()
        }
    }

    /// Options for the executable matching this CPU under `base_dir`.
    pub fn for_bin_dir(base_dir: &Path) -> GaoResult<Self> {
        Ok(Self::new(resolve_binary(base_dir)?))
    }

    /// Options for the executable under `$GAO_BIN_DIR`.
    pub fn from_env() -> GaoResult<Self> {
        let base_dir = std::env::var_os(BIN_DIR_ENV)
            .ok_or_else(|| GaoError::Config(format!("{} is not set", BIN_DIR_ENV)))?;
        Self::for_bin_dir(Path::new(&base_dir))
    }

    pub fn from_json_str(json: &str) -> GaoResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| GaoError::Config(format!("invalid orchestrator options: {}", e)))
    }

    pub fn from_json_file(path: &Path) -> GaoResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            GaoError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn terminate_with_parent(mut self, terminate: bool) -> Self {
        self.terminate_with_parent = terminate;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Validate before spawning anything.
    pub(crate) fn validate(&self) -> GaoResult<()> {
        if self.binary.as_os_str().is_empty() {
            return Err(GaoError::Config("no sandbox executable configured".into()));
        }
        Ok(())
    }
}
