//! Global configuration parsing, validation, and engine command resolution.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::spawner::SpawnConfig;
use crate::{AppError, Result};

/// How the supervisor decides a freshly spawned engine is ready.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Send a `ping` and wait for the first well-formed response.
    #[default]
    Probe,
    /// Sleep for `startup_grace_ms` and assume the engine is up.
    Delay,
}

fn default_java() -> String {
    "java".into()
}

fn default_classpath() -> Vec<String> {
    vec!["java/target/classes".into(), "java/target/*".into()]
}

fn default_main_class() -> String {
    "com.gephi.mcp.GephiService".into()
}

fn default_startup_grace_ms() -> u64 {
    1000
}

fn default_startup_timeout_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_health_check_timeout_ms() -> u64 {
    5_000
}

/// Engine process settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct EngineConfig {
    /// Installation root; relative classpath entries resolve against it.
    /// Defaults to the parent of the directory holding the executable.
    #[serde(default)]
    pub install_root: Option<PathBuf>,
    /// Java launcher binary.
    #[serde(default = "default_java")]
    pub java: String,
    /// Extra JVM arguments placed before `-cp`.
    #[serde(default)]
    pub jvm_args: Vec<String>,
    /// Classpath entries, relative to `install_root` unless absolute.
    #[serde(default = "default_classpath")]
    pub classpath: Vec<String>,
    /// Engine entry point.
    #[serde(default = "default_main_class")]
    pub main_class: String,
    /// Directory prepended to `PATH` for the engine (e.g. a JDK `bin`).
    #[serde(default)]
    pub path_prefix: Option<String>,
    /// Full command override (program followed by arguments). When set,
    /// `java`, `jvm_args`, `classpath` and `main_class` are ignored.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    /// Readiness strategy after spawn.
    #[serde(default)]
    pub readiness: Readiness,
    /// Fixed delay used by [`Readiness::Delay`].
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,
    /// Upper bound on the readiness probe.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    /// Window for a single request/response exchange.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Window for the liveness check that follows a timed-out exchange.
    #[serde(default = "default_health_check_timeout_ms")]
    pub health_check_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            install_root: None,
            java: default_java(),
            jvm_args: Vec::new(),
            classpath: default_classpath(),
            main_class: default_main_class(),
            path_prefix: None,
            command: None,
            readiness: Readiness::default(),
            startup_grace_ms: default_startup_grace_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            health_check_timeout_ms: default_health_check_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Exchange window as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Liveness-check window as a [`Duration`].
    #[must_use]
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    /// Resolve the installation root, falling back to the executable layout
    /// `<root>/bin/<exe>`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no root is configured and the
    /// executable path cannot be determined.
    pub fn resolve_install_root(&self) -> Result<PathBuf> {
        if let Some(ref root) = self.install_root {
            return Ok(root.clone());
        }

        let exe = std::env::current_exe()
            .map_err(|err| AppError::Config(format!("cannot locate executable: {err}")))?;
        exe.parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or_else(|| AppError::Config("cannot derive install root from executable".into()))
    }

    /// Joined classpath with every relative entry anchored at `root`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an entry contains the platform path
    /// separator.
    pub fn classpath_for(&self, root: &Path) -> Result<OsString> {
        let entries = self.classpath.iter().map(|entry| {
            let path = Path::new(entry);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            }
        });
        std::env::join_paths(entries)
            .map_err(|err| AppError::Config(format!("invalid classpath entry: {err}")))
    }

    /// Build the spawn parameters for the engine process.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the install root or classpath cannot
    /// be resolved.
    pub fn spawn_config(&self) -> Result<SpawnConfig> {
        let (program, args) = match self.command.as_deref() {
            Some([program, rest @ ..]) => (
                OsString::from(program),
                rest.iter().map(OsString::from).collect(),
            ),
            Some([]) => return Err(AppError::Config("engine.command must not be empty".into())),
            None => {
                let root = self.resolve_install_root()?;
                let mut args: Vec<OsString> = self.jvm_args.iter().map(OsString::from).collect();
                args.push("-cp".into());
                args.push(self.classpath_for(&root)?);
                args.push(self.main_class.clone().into());
                (OsString::from(&self.java), args)
            }
        };

        Ok(SpawnConfig {
            program,
            args,
            working_dir: self.install_root.clone(),
            path_prefix: self.path_prefix.clone(),
            readiness: self.readiness,
            startup_grace: Duration::from_millis(self.startup_grace_ms),
            startup_timeout: Duration::from_millis(self.startup_timeout_ms),
        })
    }

    fn validate(&self) -> Result<()> {
        let windows = [
            ("request_timeout_ms", self.request_timeout_ms),
            ("health_check_timeout_ms", self.health_check_timeout_ms),
            ("startup_timeout_ms", self.startup_timeout_ms),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "engine.{name} must be greater than zero"
                )));
            }
        }

        if matches!(self.command.as_deref(), Some([])) {
            return Err(AppError::Config("engine.command must not be empty".into()));
        }

        if self.command.is_none() && self.main_class.trim().is_empty() {
            return Err(AppError::Config("engine.main_class must not be empty".into()));
        }

        Ok(())
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Engine process settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Override the install root, canonicalizing the supplied path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the path does not exist.
    pub fn set_install_root(&mut self, root: &Path) -> Result<()> {
        let canonical = root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("invalid install root override: {err}")))?;
        self.engine.install_root = Some(canonical);
        Ok(())
    }
}
