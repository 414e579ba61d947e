use base64::Engine;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::ConfigError;

/// Location checked for an allow-list when `AUTHORIZED_USERS_FILE` is unset.
pub const DEFAULT_AUTHORIZED_USERS_FILE: &str = "/app/authorized_users.yaml";

/// Read a variable through `lookup`, treating empty values as unset.
fn var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(lookup, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub agents: AgentBackendConfig,
    pub auth: AuthConfig,
    pub authorization: AuthorizationSource,
    pub webapp: WebappConfig,
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(process_env, |p| p.exists())
    }

    pub fn from_vars<F, E>(lookup: F, file_exists: E) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
        E: Fn(&Path) -> bool,
    {
        Ok(Self {
            server: ServerConfig::from_vars(&lookup)?,
            logging: LoggingConfig::from_vars(&lookup),
            agents: AgentBackendConfig::from_vars(&lookup)?,
            auth: AuthConfig::from_vars(&lookup)?,
            authorization: AuthorizationSource::from_vars(&lookup, file_exists),
            webapp: WebappConfig::from_vars(&lookup),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&process_env)
    }

    pub fn from_vars<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self, ConfigError> {
        Ok(Self {
            host: var(lookup, "SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(lookup, "SERVER_PORT", 8000)?,
        })
    }
}

/// Logging Configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub modules: HashMap<String, String>,
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(&process_env)
    }

    pub fn from_vars<F: Fn(&str) -> Option<String>>(lookup: &F) -> Self {
        let mut modules = HashMap::new();

        // Load module-specific log levels
        for (key, module) in [
            ("LOG_MODULE_API", "api"),
            ("LOG_MODULE_SERVICES", "services"),
            ("LOG_MODULE_CLI", "cli"),
        ] {
            if let Some(level) = var(lookup, key) {
                modules.insert(module.to_string(), level);
            }
        }

        Self {
            level: var(lookup, "LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: var(lookup, "LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
            modules,
        }
    }

    /// Filter directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn filter_directive(&self) -> String {
        let mut filter = self.level.clone();
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        for (module, level) in modules {
            filter.push_str(&format!(",{module}={level}"));
        }
        filter
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("api".to_string(), "debug".to_string());
        modules.insert("services".to_string(), "debug".to_string());

        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            modules,
        }
    }
}

/// Connection and defaults for the hosted agent backend (Letta).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentBackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub agent_name: String,
    pub memory_capacity: u32,
    pub llm_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub tools: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for AgentBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8283".to_string(),
            api_key: None,
            agent_name: "modaletta-agent".to_string(),
            memory_capacity: 2000,
            llm_model: "openai/gpt-4.1".to_string(),
            embedding_model: "openai/text-embedding-3-small".to_string(),
            temperature: 0.7,
            tools: Vec::new(),
            timeout_secs: 60,
        }
    }
}

impl AgentBackendConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&process_env)
    }

    pub fn from_vars<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: var(lookup, "LETTA_SERVER_URL").unwrap_or(defaults.base_url),
            api_key: var(lookup, "LETTA_API_KEY"),
            agent_name: var(lookup, "MODALETTA_AGENT_NAME").unwrap_or(defaults.agent_name),
            memory_capacity: parse_var(
                lookup,
                "MODALETTA_MEMORY_CAPACITY",
                defaults.memory_capacity,
            )?,
            llm_model: var(lookup, "MODALETTA_LLM_MODEL").unwrap_or(defaults.llm_model),
            embedding_model: var(lookup, "MODALETTA_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            temperature: parse_var(lookup, "MODALETTA_TEMPERATURE", defaults.temperature)?,
            tools: var(lookup, "MODALETTA_TOOLS")
                .map(|tools| split_list(&tools))
                .unwrap_or_default(),
            timeout_secs: parse_var(lookup, "LETTA_TIMEOUT_SECS", defaults.timeout_secs)?,
        })
    }

    /// Key/value pairs for display with secrets masked.
    pub fn display_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("base_url", self.base_url.clone()),
            ("api_key", mask_secret(self.api_key.as_deref())),
            ("agent_name", self.agent_name.clone()),
            ("memory_capacity", self.memory_capacity.to_string()),
            ("llm_model", self.llm_model.clone()),
            ("embedding_model", self.embedding_model.clone()),
            ("temperature", self.temperature.to_string()),
            ("tools", self.tools.join(", ")),
            ("timeout_secs", self.timeout_secs.to_string()),
        ]
    }
}

/// `***` when a secret is present, `Not set` otherwise.
pub fn mask_secret(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => "***".to_string(),
        _ => "Not set".to_string(),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Google OAuth and session-token settings.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub jwt_secret: String,
    pub jwt_algorithm: String,
    pub jwt_expiration_hours: i64,
    /// Fixed callback URL; derived from the request when unset.
    pub redirect_uri: Option<String>,
    pub http_timeout_secs: u64,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("jwt_secret", &"***")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_hours", &self.jwt_expiration_hours)
            .field("redirect_uri", &self.redirect_uri)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

const HMAC_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

/// Longest accepted session lifetime (one year).
pub const MAX_JWT_EXPIRATION_HOURS: i64 = 24 * 366;

impl OAuthConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&process_env)
    }

    pub fn from_vars<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self, ConfigError> {
        let client_id = var(lookup, "GOOGLE_CLIENT_ID").ok_or(ConfigError::MissingVar {
            key: "GOOGLE_CLIENT_ID",
        })?;
        let client_secret =
            var(lookup, "GOOGLE_CLIENT_SECRET").ok_or(ConfigError::MissingVar {
                key: "GOOGLE_CLIENT_SECRET",
            })?;

        let jwt_secret = match var(lookup, "JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "JWT_SECRET not set, generated a random signing secret; sessions will not survive a restart"
                );
                generate_secret()
            }
        };

        let jwt_algorithm = var(lookup, "JWT_ALGORITHM")
            .map(|a| a.trim().to_uppercase())
            .unwrap_or_else(|| "HS256".to_string());
        if !HMAC_ALGORITHMS.contains(&jwt_algorithm.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "JWT_ALGORITHM",
                value: jwt_algorithm,
                reason: format!("expected one of {}", HMAC_ALGORITHMS.join(", ")),
            });
        }

        let jwt_expiration_hours: i64 = parse_var(lookup, "JWT_EXPIRATION_HOURS", 24)?;
        if !(1..=MAX_JWT_EXPIRATION_HOURS).contains(&jwt_expiration_hours) {
            return Err(ConfigError::InvalidValue {
                key: "JWT_EXPIRATION_HOURS",
                value: jwt_expiration_hours.to_string(),
                reason: format!("must be between 1 and {MAX_JWT_EXPIRATION_HOURS}"),
            });
        }

        Ok(Self {
            client_id,
            client_secret,
            jwt_secret,
            jwt_algorithm,
            jwt_expiration_hours,
            redirect_uri: var(lookup, "OAUTH_REDIRECT_URI"),
            http_timeout_secs: parse_var(lookup, "OAUTH_HTTP_TIMEOUT_SECS", 10)?,
        })
    }
}

fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether the web API is protected by Google sign-in.
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    #[default]
    Disabled,
    Enabled(OAuthConfig),
}

impl AuthConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&process_env)
    }

    /// Neither credential set disables auth; a half-configured client is an error.
    pub fn from_vars<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self, ConfigError> {
        let has_id = var(lookup, "GOOGLE_CLIENT_ID").is_some();
        let has_secret = var(lookup, "GOOGLE_CLIENT_SECRET").is_some();
        if !has_id && !has_secret {
            return Ok(Self::Disabled);
        }
        OAuthConfig::from_vars(lookup).map(Self::Enabled)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    pub fn oauth(&self) -> Option<&OAuthConfig> {
        match self {
            Self::Enabled(config) => Some(config),
            Self::Disabled => None,
        }
    }
}

/// Where the email allow-list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationSource {
    /// Raw comma-separated `AUTHORIZED_USERS` value.
    EnvList(String),
    File(PathBuf),
    AllowAll,
}

impl AuthorizationSource {
    pub fn from_env() -> Self {
        Self::from_vars(&process_env, |p| p.exists())
    }

    /// Precedence: `AUTHORIZED_USERS`, then `AUTHORIZED_USERS_FILE` if the file
    /// exists, then the default file if it exists, then allow-all.
    pub fn from_vars<F, E>(lookup: &F, file_exists: E) -> Self
    where
        F: Fn(&str) -> Option<String>,
        E: Fn(&Path) -> bool,
    {
        if let Some(users) = var(lookup, "AUTHORIZED_USERS") {
            return Self::EnvList(users);
        }

        if let Some(path) = var(lookup, "AUTHORIZED_USERS_FILE").map(PathBuf::from) {
            if file_exists(&path) {
                return Self::File(path);
            }
        }

        let default_path = PathBuf::from(DEFAULT_AUTHORIZED_USERS_FILE);
        if file_exists(&default_path) {
            return Self::File(default_path);
        }

        Self::AllowAll
    }
}

/// Settings for the browser-facing chat API.
#[derive(Debug, Clone)]
pub struct WebappConfig {
    pub default_agent_id: Option<String>,
    pub default_project_id: Option<String>,
    pub debug_log_file: PathBuf,
    pub static_dir: PathBuf,
}

impl Default for WebappConfig {
    fn default() -> Self {
        Self {
            default_agent_id: None,
            default_project_id: None,
            debug_log_file: PathBuf::from("/tmp/voice-debug-logs.jsonl"),
            static_dir: PathBuf::from("assets"),
        }
    }
}

impl WebappConfig {
    pub fn from_env() -> Self {
        Self::from_vars(&process_env)
    }

    pub fn from_vars<F: Fn(&str) -> Option<String>>(lookup: &F) -> Self {
        let defaults = Self::default();
        Self {
            default_agent_id: var(lookup, "DEFAULT_AGENT_ID"),
            default_project_id: var(lookup, "DEFAULT_PROJECT_ID"),
            debug_log_file: var(lookup, "DEBUG_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.debug_log_file),
            static_dir: var(lookup, "STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        }
    }
}

/// Scheduled jobs: data directory, cron expressions (with seconds) and digest target.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub data_dir: PathBuf,
    pub wakeup_cron: String,
    pub digest_cron: String,
    pub digest_agent_id: Option<String>,
    pub digest_config_file: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/data"),
            wakeup_cron: "0 */15 * * * *".to_string(),
            digest_cron: "0 0 8 * * *".to_string(),
            digest_agent_id: None,
            digest_config_file: None,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(&process_env)
    }

    pub fn from_vars<F: Fn(&str) -> Option<String>>(lookup: &F) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: var(lookup, "MODALETTA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            wakeup_cron: var(lookup, "WAKEUP_CRON").unwrap_or(defaults.wakeup_cron),
            digest_cron: var(lookup, "DIGEST_CRON").unwrap_or(defaults.digest_cron),
            digest_agent_id: var(lookup, "DIGEST_AGENT_ID"),
            digest_config_file: var(lookup, "DIGEST_CONFIG_FILE").map(PathBuf::from),
        }
    }

    pub fn roster_path(&self) -> PathBuf {
        self.data_dir.join("agents.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DigestConfig {
    pub bluesky: BlueskyConfig,
    pub digest: DigestWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueskyConfig {
    pub api_base: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    pub default_limit: u32,
    pub default_filter: String,
    pub sources: Vec<FeedSource>,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        let sources = [
            ("void.comind.network", "Void - philosophical, meta-cognitive"),
            ("luna.pds.witchcraft.systems", "Luna - playful, chaotic"),
            (
                "herald.comind.network",
                "Herald - identity synthesis, Team Turtle",
            ),
            ("archivist.comind.network", "Archivist - preservation, koans"),
            ("yetanotheruseless.com", "Jake - snark, AI news, bon mots"),
        ];

        Self {
            api_base: "https://public.api.bsky.app/xrpc".to_string(),
            timeout: 10,
            default_limit: 20,
            default_filter: "posts_no_replies".to_string(),
            sources: sources
                .into_iter()
                .map(|(handle, description)| FeedSource {
                    handle: handle.to_string(),
                    description: description.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub handle: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestWindow {
    pub since_hours: i64,
}

impl Default for DigestWindow {
    fn default() -> Self {
        Self { since_hours: 24 }
    }
}
