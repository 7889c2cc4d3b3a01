use famreg_core::{Authority, MessagesetEntry, Source};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration loaded from YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
    pub webhook: WebhookSettings,
    pub messaging: MessagingSettings,
    pub sources: Vec<SourceSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub registrations_db: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub enabled: bool,
    /// Sent as `Authorization: Token <auth_token>`.
    pub auth_token: String,
    pub timeout_secs: u64,
    pub endpoints: Vec<WebhookEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub url: String,
    pub events: Vec<String>,
}

/// Stage-based messaging service and the messagesets it offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    /// Base URL; when set the catalog is refreshed from it at startup.
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub messagesets: Vec<MessagesetEntry>,
}

/// A submitting party and the API token it authenticates with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub id: String,
    pub name: String,
    pub authority: Authority,
    pub token: String,
    /// May manage sources through the API.
    #[serde(default)]
    pub admin: bool,
}

impl SourceSettings {
    pub fn to_source(&self) -> Source {
        Source {
            id: self.id.clone(),
            name: self.name.clone(),
            authority: self.authority,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            registrations_db: "registrations.sqlite".to_string(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            auth_token: "REPLACEME".to_string(),
            timeout_secs: 10,
            endpoints: Vec::new(),
        }
    }
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout_secs: 10,
            messagesets: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override settings from environment-style variables
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("FAMREG_PORT")
            && let Ok(port_num) = port.parse()
        {
            self.server.port = port_num;
        }

        if let Some(host) = var("FAMREG_HOST") {
            self.server.host = host;
        }

        if let Some(data_dir) = var("FAMREG_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Some(token) = var("HOOK_AUTH_TOKEN") {
            self.webhook.auth_token = token;
        }

        if let Some(url) = var("STAGE_BASED_MESSAGING_URL") {
            self.messaging.url = Some(url);
        }

        if let Some(token) = var("STAGE_BASED_MESSAGING_TOKEN") {
            self.messaging.token = Some(token);
        }
    }

    /// Get the full path to the registrations database
    pub fn registrations_db_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.registrations_db)
    }

    /// Source authenticating with the given API token
    pub fn source_for_token(&self, token: &str) -> Option<&SourceSettings> {
        self.sources.iter().find(|source| source.token == token)
    }
}
