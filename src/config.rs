//! Configuration for backfillr.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BACKFILLR_HOME, FLICKR_API_KEY, USER_AGENT,
//!    COMMONS_USERNAME, COMMONS_ACCESS_TOKEN)
//! 2. Config file (.backfillr/config.yaml)
//! 3. Defaults (~/.backfillr)
//!
//! Config file discovery:
//! - Searches current directory and parents for .backfillr/config.yaml
//! - `paths.home` is relative to the .backfillr/ directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::{commons, flickr};
use crate::core::{ReplacePolicy, RetryPolicy};
use crate::domain::{LicenseEntry, PageIdSource, Vocabulary};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_SEARCH_QUERY: &str =
    r#"file: insource:flickr insource:"Category:Flickr" -haswbstatement:P12120"#;

const DEFAULT_EDIT_SUMMARY: &str =
    "Update [[Commons:Structured data|SDC]] based on metadata from Flickr";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub flickr: FlickrConfig,
    #[serde(default)]
    pub commons: CommonsConfig,
    /// Extra license-table entries, keyed by Flickr license id
    #[serde(default)]
    pub licenses: HashMap<String, LicenseEntry>,
    /// Extra institutional accounts with page ids in their machine tags
    #[serde(default)]
    pub institutions: Vec<PageIdSource>,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .backfillr/)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlickrConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonsConfig {
    pub api_url: Option<String>,
    pub username: Option<String>,
    pub user_agent: Option<String>,
    pub search_query: Option<String>,
    pub edit_summary: Option<String>,
    pub edit_tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    pub retry: Option<RetryPolicy>,
    pub replace_policy: Option<ReplacePolicy>,
    pub category_prefixes: Option<Vec<String>>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Absolute path to backfillr home (run logs)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub user_agent: String,
    pub flickr: FlickrSettings,
    pub commons: CommonsSettings,
    pub vocabulary: Vocabulary,
    pub bot: BotSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlickrSettings {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommonsSettings {
    pub api_url: String,
    /// Account the bot edits as
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub search_query: String,
    pub edit_summary: String,
    pub edit_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotSettings {
    pub retry: RetryPolicy,
    pub replace_policy: ReplacePolicy,
    pub category_prefixes: Vec<String>,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            replace_policy: ReplacePolicy::Never,
            category_prefixes: vec!["Flickr images".to_string(), "Files from Flickr".to_string()],
        }
    }
}

impl ResolvedConfig {
    /// Directory holding one subdirectory per run
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".backfillr").join("config.yaml");
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

/// Resolve a path that may be relative to the config file's parent
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

/// Combine defaults, an optional parsed config file and the environment
fn resolve(
    default_home: PathBuf,
    config_file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let (config_path, file) = match config_file {
        Some((path, file)) => (Some(path), file),
        None => (None, ConfigFile::default()),
    };

    let home = if let Some(env_home) = env("BACKFILLR_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(path), Some(home_path)) = (&config_path, &file.paths.home) {
        let config_dir = path.parent().unwrap_or(Path::new("."));
        resolve_path(config_dir, home_path)
    } else {
        default_home
    };

    let user_agent = env("USER_AGENT")
        .or(file.commons.user_agent)
        .unwrap_or_else(|| format!("backfillr/{}", env!("CARGO_PKG_VERSION")));

    let flickr = FlickrSettings {
        api_key: env("FLICKR_API_KEY").or(file.flickr.api_key),
        api_url: file
            .flickr
            .api_url
            .unwrap_or_else(|| flickr::DEFAULT_API_URL.to_string()),
    };

    let commons = CommonsSettings {
        api_url: file
            .commons
            .api_url
            .unwrap_or_else(|| commons::DEFAULT_API_URL.to_string()),
        username: env("COMMONS_USERNAME").or(file.commons.username),
        access_token: env("COMMONS_ACCESS_TOKEN"),
        search_query: file
            .commons
            .search_query
            .unwrap_or_else(|| DEFAULT_SEARCH_QUERY.to_string()),
        edit_summary: file
            .commons
            .edit_summary
            .unwrap_or_else(|| DEFAULT_EDIT_SUMMARY.to_string()),
        edit_tags: file
            .commons
            .edit_tags
            .unwrap_or_else(|| vec!["BotSDC".to_string()]),
    };

    let mut vocabulary = Vocabulary::default();
    vocabulary.licenses.extend(file.licenses);
    for institution in file.institutions {
        vocabulary
            .page_id_sources
            .retain(|s| s.user_id != institution.user_id);
        vocabulary.page_id_sources.push(institution);
    }

    let defaults = BotSettings::default();
    let bot = BotSettings {
        retry: file.bot.retry.unwrap_or(defaults.retry),
        replace_policy: file.bot.replace_policy.unwrap_or(defaults.replace_policy),
        category_prefixes: file
            .bot
            .category_prefixes
            .unwrap_or(defaults.category_prefixes),
    };

    ResolvedConfig {
        home,
        config_file: config_path,
        user_agent,
        flickr,
        commons,
        vocabulary,
        bot,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".backfillr");

    let config_file = match find_config_file() {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    Ok(resolve(default_home, config_file, |key| std::env::var(key).ok()))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the runs directory ($BACKFILLR_HOME/runs)
pub fn runs_dir() -> Result<PathBuf> {
    Ok(config()?.runs_dir())
}
