use config::ConfigError;
use std::time::Duration;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub tokens: TokenSettings,
    #[serde(default)]
    pub session_store: SessionStoreSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "{}/{}{}",
            self.connection_string_without_db(),
            self.database_name,
            self.ssl_suffix()
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }

    fn ssl_suffix(&self) -> &'static str {
        if self.require_ssl {
            "?sslmode=require"
        } else {
            ""
        }
    }
}

/// Token signing settings
///
/// Expiry values are duration strings such as `15m` or `7d`.
#[derive(serde::Deserialize, Clone)]
pub struct TokenSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry: String,
    pub refresh_token_expiry: String,
    pub issuer: String,
    pub audience: String,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("access_token_secret", &"[redacted]")
            .field("refresh_token_secret", &"[redacted]")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct SessionStoreSettings {
    /// Upper bound for a single store call
    pub timeout_milliseconds: u64,
}

impl SessionStoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

impl Default for SessionStoreSettings {
    fn default() -> Self {
        Self {
            timeout_milliseconds: 3000,
        }
    }
}

/// Load settings from `configuration.{yaml,toml,json}` and `APP__*` environment variables
///
/// Environment variables win, e.g. `APP__TOKENS__ACCESS_TOKEN_SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
