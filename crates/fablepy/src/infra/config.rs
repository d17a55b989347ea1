//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, ensure};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".fablepy/config.toml";

/// Layered configuration loaded from defaults, user, workspace, explicit file, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub markers: Markers,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub backend: Backend,
}

/// Literal cell markers in the F# source and the compiled Python.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
    #[serde(default = "Markers::default_source")]
    pub source: String,
    #[serde(default = "Markers::default_derived")]
    pub derived: String,
}

impl Markers {
    fn default_source() -> String {
        "NEW_CELL".into()
    }

    fn default_derived() -> String {
        "# %%".into()
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            source: Self::default_source(),
            derived: Self::default_derived(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    #[serde(default = "Paths::default_source_extensions")]
    pub source_extensions: Vec<String>,
    #[serde(default = "Paths::default_derived_extension")]
    pub derived_extension: String,
}

impl Paths {
    fn default_source_extensions() -> Vec<String> {
        vec!["fs".into(), "fsx".into()]
    }

    fn default_derived_extension() -> String {
        "py".into()
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            source_extensions: Self::default_source_extensions(),
            derived_extension: Self::default_derived_extension(),
        }
    }
}

/// Poll cadence while waiting for the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "SyncSettings::default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "SyncSettings::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SyncSettings {
    fn default_interval_ms() -> u64 {
        200
    }

    fn default_timeout_ms() -> u64 {
        5000
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// Where payloads are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Print the payload on standard output.
    Stdout,
    /// Pipe the payload into a configured program.
    Command,
    /// Copy the payload to the system clipboard.
    Clipboard,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "command" => Ok(Self::Command),
            "clipboard" => Ok(Self::Clipboard),
            other => Err(anyhow!("unknown backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Backend {
    #[serde(default)]
    kind: Option<BackendKind>,
    #[serde(default)]
    command: Option<Vec<String>>,
}

impl Backend {
    fn default_kind() -> BackendKind {
        BackendKind::Stdout
    }

    fn default_command() -> Vec<String> {
        vec!["python3".into(), "-i".into()]
    }

    pub fn kind(&self) -> BackendKind {
        self.kind.unwrap_or_else(Self::default_kind)
    }

    pub fn set_kind(&mut self, kind: BackendKind) {
        self.kind = Some(kind);
    }

    /// Program and arguments for the `command` backend.
    pub fn command(&self) -> Vec<String> {
        self.command.clone().unwrap_or_else(Self::default_command)
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    backend: Option<String>,
    timeout_ms: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            backend: env::var("FABLEPY_BACKEND").ok(),
            timeout_ms: env::var("FABLEPY_TIMEOUT_MS").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(backend: &str, timeout_ms: &str) -> Self {
        Self {
            backend: Some(backend.to_owned()),
            timeout_ms: Some(timeout_ms.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user config, workspace config, an optional
    /// explicit file, and env overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, explicit.map(Path::to_path_buf), env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        explicit: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        // An explicitly requested file must exist.
        if let Some(explicit_path) = explicit {
            layers.push(Self::from_file(&explicit_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        let config = apply_env_overrides(merged, env_overrides)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.sync.interval_ms > 0, "sync.interval_ms must be at least 1");
        Ok(())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            markers: merge_markers(self.markers, other.markers),
            paths: merge_paths(self.paths, other.paths),
            sync: merge_sync(self.sync, other.sync),
            backend: merge_backend(self.backend, other.backend),
        }
    }
}

fn merge_markers(base: Markers, overlay: Markers) -> Markers {
    Markers {
        source: choose(base.source, overlay.source, Markers::default_source),
        derived: choose(base.derived, overlay.derived, Markers::default_derived),
    }
}

fn merge_paths(base: Paths, overlay: Paths) -> Paths {
    Paths {
        source_extensions: choose(
            base.source_extensions,
            overlay.source_extensions,
            Paths::default_source_extensions,
        ),
        derived_extension: choose(
            base.derived_extension,
            overlay.derived_extension,
            Paths::default_derived_extension,
        ),
    }
}

fn merge_sync(base: SyncSettings, overlay: SyncSettings) -> SyncSettings {
    SyncSettings {
        interval_ms: choose(
            base.interval_ms,
            overlay.interval_ms,
            SyncSettings::default_interval_ms,
        ),
        timeout_ms: choose(
            base.timeout_ms,
            overlay.timeout_ms,
            SyncSettings::default_timeout_ms,
        ),
    }
}

fn merge_backend(mut base: Backend, overlay: Backend) -> Backend {
    if let Some(kind) = overlay.kind {
        base.kind = Some(kind);
    }
    if let Some(command) = overlay.command {
        base.command = Some(command);
    }
    base
}

/// Overlay wins unless it still holds the built-in default.
fn choose<T: PartialEq>(base: T, overlay: T, default_fn: fn() -> T) -> T {
    if overlay != default_fn() {
        overlay
    } else {
        base
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("fablepy/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Result<Config> {
    if let Some(backend) = env.backend {
        let kind = backend
            .parse()
            .context("FABLEPY_BACKEND must be one of stdout, command, clipboard")?;
        config.backend.set_kind(kind);
    }
    if let Some(timeout) = env.timeout_ms {
        config.sync.timeout_ms = timeout
            .trim()
            .parse()
            .with_context(|| format!("FABLEPY_TIMEOUT_MS is not a number: {timeout}"))?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.markers.source, "NEW_CELL");
        assert_eq!(config.markers.derived, "# %%");
        assert_eq!(config.paths.source_extensions, vec!["fs", "fsx"]);
        assert_eq!(config.sync.interval_ms, 200);
        assert_eq!(config.sync.timeout_ms, 5000);
        assert_eq!(config.backend.kind(), BackendKind::Stdout);
        assert_eq!(config.backend.command(), vec!["python3", "-i"]);
    }

    #[test]
    fn merge_global_workspace_and_explicit() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[sync]
timeout_ms = 8000
[backend]
kind = "command"
command = ["ipython", "--simple-prompt"]
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".fablepy"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".fablepy/config.toml"),
            r#"
[markers]
source = "(* %% *)"
[sync]
interval_ms = 50
"#,
        )?;

        let explicit = temp.path().join("explicit.toml");
        fs::write(&explicit, "[paths]\nderived_extension = \"pyi\"\n")?;

        let config = Config::load_with_layers(
            Some(global),
            Some(workspace_dir.join(".fablepy/config.toml")),
            Some(explicit),
            EnvOverrides::default(),
        )?;

        assert_eq!(config.markers.source, "(* %% *)");
        assert_eq!(config.markers.derived, "# %%");
        assert_eq!(config.sync.interval_ms, 50);
        assert_eq!(config.sync.timeout_ms, 8000);
        assert_eq!(config.paths.derived_extension, "pyi");
        assert_eq!(config.backend.kind(), BackendKind::Command);
        assert_eq!(config.backend.command(), vec!["ipython", "--simple-prompt"]);
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("clipboard", "750");
        let config = Config::load_with_layers(None, None, None, overrides)?;
        assert_eq!(config.backend.kind(), BackendKind::Clipboard);
        assert_eq!(config.sync.timeout_ms, 750);
        Ok(())
    }

    #[test]
    fn invalid_env_override_is_an_error() {
        let overrides = EnvOverrides::for_tests("jupyter", "750");
        assert!(Config::load_with_layers(None, None, None, overrides).is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let explicit = temp.path().join("explicit.toml");
        fs::write(&explicit, "[sync]\ninterval_ms = 0\n")?;

        let err = Config::load_with_layers(None, None, Some(explicit), EnvOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("interval_ms"));
        Ok(())
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Config::load_with_layers(
            None,
            None,
            Some(PathBuf::from("/definitely/not/here.toml")),
            EnvOverrides::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let err = Config::from_file(&file).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
        Ok(())
    }

    #[test]
    fn find_repo_root_walks_up_to_git() -> Result<()> {
        let temp = tempfile::tempdir()?;
        fs::create_dir_all(temp.path().join(".git"))?;
        fs::create_dir_all(temp.path().join("src/deep"))?;
        let root = find_repo_root(&temp.path().join("src/deep"));
        assert_eq!(root.as_deref(), Some(temp.path()));
        Ok(())
    }
}
