//! Configuration for minutes paths and service connections.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MINUTES_HOME, MINUTES_MAILBOX, MINUTES_CHAT_*,
//!    MINUTES_WEBEX_*, MINUTES_JIRA_*)
//! 2. Config file (.minutes/config.yaml)
//! 3. Defaults (~/.minutes)
//!
//! Config file discovery:
//! - Searches current directory and parents for .minutes/config.yaml
//! - Paths in config file are relative to the .minutes/ directory
//!
//! Credentials are read from the environment only. Pipeline behaviour
//! (folder, intervals, toggles) lives in the state document, not here.

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::generator::GeneratorConfig;
use crate::adapters::jira::JiraConfig;
use crate::adapters::webex::WebexConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub generator: Option<GeneratorSection>,
    #[serde(default)]
    pub webex: Option<WebexSection>,
    #[serde(default)]
    pub jira: Option<JiraSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory
    pub home: Option<String>,
    /// Mailbox root; folders are its sub-directories
    pub mailbox: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratorSection {
    pub api_base: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebexSection {
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraSection {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub project_key: Option<String>,
    pub acceptance_field: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory (state.json, reviews.json, tasks.jsonl)
    pub home: PathBuf,
    /// Mailbox root directory
    pub mailbox: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub generator: GeneratorConfig,
    pub webex: WebexConfig,
    pub jira: JiraConfig,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".minutes").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".minutes");

    let file = match find_config_file() {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    Ok(resolve(default_home, file, |key| std::env::var(key).ok()))
}

/// Merge defaults, the config file and the environment
fn resolve(
    default_home: PathBuf,
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path), config),
        None => (None, ConfigFile::default()),
    };

    // Relative paths in the file are anchored at .minutes/
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);
    let from_file = |value: &Option<String>| -> Option<PathBuf> {
        let value = value.as_deref()?;
        Some(match &config_dir {
            Some(dir) => resolve_path(dir, value),
            None => PathBuf::from(value),
        })
    };

    let home = env("MINUTES_HOME")
        .map(PathBuf::from)
        .or_else(|| from_file(&config.paths.home))
        .unwrap_or(default_home);

    let mailbox = env("MINUTES_MAILBOX")
        .map(PathBuf::from)
        .or_else(|| from_file(&config.paths.mailbox))
        .unwrap_or_else(|| home.join("mailbox"));

    let gen = config.generator.unwrap_or_default();
    let generator = GeneratorConfig {
        api_key: env("MINUTES_CHAT_API_KEY"),
        api_base: env("MINUTES_CHAT_API_BASE").or(gen.api_base),
        model: env("MINUTES_CHAT_MODEL").or(gen.model),
    };

    let webex = WebexConfig {
        bot_token: env("MINUTES_WEBEX_BOT_TOKEN"),
        access_token: env("MINUTES_WEBEX_ACCESS_TOKEN"),
        api_base: config.webex.unwrap_or_default().api_base,
    };

    let jira_file = config.jira.unwrap_or_default();
    let jira = JiraConfig {
        base_url: env("MINUTES_JIRA_URL").or(jira_file.base_url),
        email: env("MINUTES_JIRA_EMAIL").or(jira_file.email),
        api_token: env("MINUTES_JIRA_TOKEN"),
        project_key: env("MINUTES_JIRA_PROJECT").or(jira_file.project_key),
        acceptance_field: jira_file.acceptance_field,
    };

    ResolvedConfig {
        home,
        mailbox,
        config_file,
        generator,
        webex,
        jira,
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the minutes home directory (state files).
pub fn minutes_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the mailbox root directory.
pub fn mailbox_root() -> Result<PathBuf> {
    Ok(config()?.mailbox.clone())
}
