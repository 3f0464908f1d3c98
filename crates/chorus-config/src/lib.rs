//! Multi-tier TOML configuration for Chorus.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > `~/.chorus/config.toml` > defaults

use chorus_mcp::McpServersConfig;
use chorus_types::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use chorus_core::{DEFAULT_MAX_RETRIES, DEFAULT_MAX_TURNS};

/// The default Anthropic API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// The default model to use.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// The default max tokens for a response.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Servers file picked up from the working directory when none is configured.
pub const DEFAULT_SERVERS_FILE: &str = "config.json";

/// Resolved configuration for a Chorus process.
#[derive(Debug, Clone)]
pub struct ChorusConfig {
    /// Only needed to talk to the model; see [`ChorusConfig::require_api_key`].
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub api_base_url: String,
    pub max_turns: usize,
    pub max_retries: u32,
    pub annotate_tool_calls: bool,
    /// File declaring the MCP servers, if any.
    pub servers_file: Option<PathBuf>,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub conversation: ConversationSettings,
    #[serde(default)]
    pub servers: ServersSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSettings {
    pub max_turns: Option<usize>,
    pub max_retries: Option<u32>,
    pub annotate_tool_calls: Option<bool>,
}

/// Where the MCP server declarations live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServersSettings {
    /// Relative paths are resolved against the config directory.
    pub file: Option<PathBuf>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub max_turns: Option<usize>,
    pub servers_file: Option<PathBuf>,
}

/// The environment variables configuration reads.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_var("ANTHROPIC_API_KEY"),
            model: non_empty_var("CHORUS_MODEL"),
            base_url: non_empty_var("ANTHROPIC_API_BASE_URL"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ChorusConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Global config (~/.chorus/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let settings = load_settings_file(&config_dir.join("config.toml"));
        let mut config = Self::resolve(overrides, EnvOverrides::from_env(), settings, config_dir)?;
        if config.servers_file.is_none() {
            config.servers_file = default_servers_file(Path::new("."));
        }
        Ok(config)
    }

    /// Apply precedence to already-gathered sources.
    pub fn resolve(
        overrides: CliOverrides,
        env: EnvOverrides,
        settings: SettingsFile,
        config_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        // Resolve API key: CLI > env > config file
        let api_key = overrides
            .api_key
            .or(env.api_key)
            .or(settings.api.api_key);

        let model = overrides
            .model
            .or(env.model)
            .or(settings.api.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let max_tokens = overrides
            .max_tokens
            .or(settings.api.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_tokens".into(),
                message: "must be at least 1".into(),
            });
        }

        let api_base_url = env
            .base_url
            .or(settings.api.base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let max_turns = overrides
            .max_turns
            .or(settings.conversation.max_turns)
            .unwrap_or(DEFAULT_MAX_TURNS);
        if max_turns == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_turns".into(),
                message: "must be at least 1".into(),
            });
        }

        // CLI paths are taken as given; file paths are relative to the config dir
        let servers_file = overrides.servers_file.or_else(|| {
            settings.servers.file.map(|file| {
                if file.is_relative() {
                    config_dir.join(file)
                } else {
                    file
                }
            })
        });

        Ok(ChorusConfig {
            api_key,
            model,
            max_tokens,
            api_base_url,
            max_turns,
            max_retries: settings
                .conversation
                .max_retries
                .unwrap_or(DEFAULT_MAX_RETRIES),
            annotate_tool_calls: settings.conversation.annotate_tool_calls.unwrap_or(true),
            servers_file,
            config_dir,
        })
    }

    /// The API key, or an error naming where to set it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingKey {
                key: "api_key (set ANTHROPIC_API_KEY or add to ~/.chorus/config.toml)".into(),
            })
    }
}

/// Get the Chorus config directory path (~/.chorus/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHORUS_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chorus")
}

/// Load and parse a TOML settings file, returning defaults on any error.
pub fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

/// `config.json` in `dir`, if there is one.
///
/// Used when neither the command line nor the settings file names a servers
/// file.
pub fn default_servers_file(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(DEFAULT_SERVERS_FILE);
    if path.is_file() {
        tracing::debug!("Using MCP server declarations from {}", path.display());
        Some(path)
    } else {
        None
    }
}

/// Load MCP server declarations: `{"mcpServers": {...}}`.
///
/// JSON unless the file has a `.toml` extension.
pub fn load_servers_file(path: &Path) -> Result<McpServersConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let parse_error = |message: String| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    };

    let config: McpServersConfig = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
    } else {
        serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?
    };

    tracing::debug!(
        "Loaded {} MCP server(s) from {}",
        config.servers.len(),
        path.display()
    );
    Ok(config)
}
