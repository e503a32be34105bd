//! Daemon configuration handling.
//!
//! Settings come from `daemon.toml` in the platform config directory, then
//! from a `.env` file and the process environment, which take precedence.

use adbroker_core::{
    ads_client::ADS_API_BASE,
    provider::{ProviderConfig, ADS_CAMPAIGN_SCOPE, LWA_AUTH_URL, LWA_TOKEN_URL},
    store::StoreBackend,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Keyring service name used when the keyring backend is selected.
pub const KEYRING_SERVICE: &str = "adbroker";

/// Upper bound for `oauth.state_ttl_secs`.
pub const MAX_STATE_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory for the credential database.
    pub data_dir: PathBuf,

    /// Logging level, used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Browser front end; enables redirects from `/` and `/auth/callback`.
    pub frontend_origin: Option<String>,

    pub oauth: OAuthSettings,
    pub ads: AdsSettings,
    pub store: StoreSettings,
}

/// `[oauth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub request_timeout_secs: u64,
    /// Lifetime of a pending authorization nonce.
    pub state_ttl_secs: i64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_uri: None,
            auth_url: LWA_AUTH_URL.to_string(),
            token_url: LWA_TOKEN_URL.to_string(),
            scopes: vec![ADS_CAMPAIGN_SCOPE.to_string()],
            request_timeout_secs: 30,
            state_ttl_secs: 600,
        }
    }
}

/// `[ads]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsSettings {
    pub api_base: String,
    /// Profile used by `/ads/campaigns` when the request names none.
    pub profile_id: Option<String>,
}

impl Default for AdsSettings {
    fn default() -> Self {
        Self {
            api_base: ADS_API_BASE.to_string(),
            profile_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Keyring,
    Memory,
}

/// `[store]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreKind,
    /// SQLite database file; defaults to `adbroker.db` in `data_dir`.
    pub path: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".adbroker"));

        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            config_path: PathBuf::new(),
            data_dir,
            log_level: "info".to_string(),
            frontend_origin: None,
            oauth: OAuthSettings::default(),
            ads: AdsSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl DaemonConfig {
    /// Apply environment overrides, reading variables through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LWA_CLIENT_ID") {
            self.oauth.client_id = v;
        }
        if let Some(v) = get("LWA_CLIENT_SECRET") {
            self.oauth.client_secret = Some(v);
        }
        if let Some(v) = get("LWA_REDIRECT_URI") {
            self.oauth.redirect_uri = Some(v);
        }
        if let Some(v) = get("LWA_AUTH_URL") {
            self.oauth.auth_url = v;
        }
        if let Some(v) = get("LWA_TOKEN_URL") {
            self.oauth.token_url = v;
        }
        if let Some(v) = get("ADS_API_BASE") {
            self.ads.api_base = v;
        }
        if let Some(v) = get("AMAZON_ADS_PROFILE_ID") {
            self.ads.profile_id = Some(v);
        }
        if let Some(v) = get("FRONTEND_ORIGIN") {
            self.frontend_origin = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = get("ADBROKER_LISTEN") {
            self.listen_addr = v
                .parse()
                .with_context(|| format!("Invalid ADBROKER_LISTEN address {:?}", v))?;
        }
        if let Some(v) = get("ADBROKER_DATABASE") {
            self.store.backend = StoreKind::Sqlite;
            self.store.path = Some(PathBuf::from(v));
        }

        Ok(())
    }

    /// OAuth provider settings for the core library.
    pub fn provider_config(&self) -> ProviderConfig {
        let mut provider = ProviderConfig::new(&self.oauth.auth_url, &self.oauth.token_url)
            .with_scopes(self.oauth.scopes.clone())
            .with_client_id(&self.oauth.client_id);
        if let Some(secret) = &self.oauth.client_secret {
            provider = provider.with_client_secret(secret);
        }
        if let Some(uri) = &self.oauth.redirect_uri {
            provider = provider.with_redirect_uri(uri);
        }
        provider
    }

    /// Storage backend selected by the `[store]` section.
    pub fn store_backend(&self) -> StoreBackend {
        match self.store.backend {
            StoreKind::Sqlite => StoreBackend::Sqlite {
                path: self
                    .store
                    .path
                    .clone()
                    .unwrap_or_else(|| self.data_dir.join("adbroker.db")),
            },
            StoreKind::Keyring => StoreBackend::Keyring {
                service: KEYRING_SERVICE.to_string(),
            },
            StoreKind::Memory => StoreBackend::Memory,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth.request_timeout_secs)
    }

    /// Lifetime of a pending authorization nonce.
    pub fn state_ttl(&self) -> Result<chrono::Duration> {
        let secs = self.oauth.state_ttl_secs;
        anyhow::ensure!(
            (1..=MAX_STATE_TTL_SECS).contains(&secs),
            "oauth.state_ttl_secs must be between 1 and {}, got {}",
            MAX_STATE_TTL_SECS,
            secs
        );
        chrono::Duration::try_seconds(secs).context("oauth.state_ttl_secs is out of range")
    }

    /// Reject settings that would make every exchange or callback fail.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.oauth.request_timeout_secs > 0,
            "oauth.request_timeout_secs must be greater than zero"
        );
        self.state_ttl()?;
        Ok(())
    }
}

/// Default location of `daemon.toml`.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("daemon.toml"))
        .unwrap_or_else(|| PathBuf::from("adbroker-daemon.toml"))
}

/// Load configuration from the default location, `.env` and the environment.
pub fn load_config() -> Result<DaemonConfig> {
    load_config_at(&default_config_path())
}

/// Load configuration from `config_path`, `.env` and the environment.
pub fn load_config_at(config_path: &Path) -> Result<DaemonConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e).context("Failed to load .env file"),
    }

    let mut config = load_config_from(config_path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", config.data_dir))?;

    Ok(config)
}

/// Read `path` if it exists, otherwise return defaults.
pub fn load_config_from(path: &Path) -> Result<DaemonConfig> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?
    } else {
        DaemonConfig::default()
    };

    config.config_path = path.to_path_buf();
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {:?}", path))?;
    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "adbroker", "adbroker")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();

        assert_eq!(config.listen_addr.port(), 8000);
        assert_eq!(config.oauth.token_url, LWA_TOKEN_URL);
        assert_eq!(config.oauth.scopes, vec![ADS_CAMPAIGN_SCOPE]);
        assert_eq!(config.ads.api_base, ADS_API_BASE);
        assert_eq!(config.store.backend, StoreKind::Sqlite);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daemon.toml");

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.config_path, path);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_load_partial_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daemon.toml");
        std::fs::write(
            &path,
            r#"
listen_addr = "0.0.0.0:9000"
frontend_origin = "https://app.example.com"

[oauth]
client_id = "amzn1.application-oa2-client.test"
redirect_uri = "https://broker.example.com/auth/callback"
request_timeout_secs = 5

[store]
backend = "memory"
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(
            config.frontend_origin.as_deref(),
            Some("https://app.example.com")
        );
        assert_eq!(config.oauth.client_id, "amzn1.application-oa2-client.test");
        assert_eq!(config.oauth.token_url, LWA_TOKEN_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.store_backend(), StoreBackend::Memory);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daemon.toml");
        std::fs::write(&path, "listen_addr = 12").unwrap();

        assert!(load_config_from(&path).is_err());
    }

    #[test]
    fn test_zero_request_timeout_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daemon.toml");
        std::fs::write(&path, "[oauth]\nrequest_timeout_secs = 0\n").unwrap();

        let error = load_config_from(&path).unwrap_err();
        assert!(format!("{:#}", error).contains("request_timeout_secs"));
    }

    #[test]
    fn test_state_ttl_out_of_range_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("daemon.toml");

        for ttl in ["-1", "0", "9223372036854775807"] {
            std::fs::write(&path, format!("[oauth]\nstate_ttl_secs = {}\n", ttl)).unwrap();
            let error = load_config_from(&path).unwrap_err();
            assert!(format!("{:#}", error).contains("state_ttl_secs"), "{}", ttl);
        }
    }

    #[test]
    fn test_state_ttl() {
        let mut config = DaemonConfig::default();
        assert_eq!(config.state_ttl().unwrap(), chrono::Duration::minutes(10));

        config.oauth.state_ttl_secs = i64::MIN;
        assert!(config.state_ttl().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LWA_CLIENT_ID", "env-client"),
            ("LWA_CLIENT_SECRET", "env-secret"),
            ("LWA_REDIRECT_URI", "http://localhost:8000/auth/callback"),
            ("AMAZON_ADS_PROFILE_ID", "123"),
            ("FRONTEND_ORIGIN", "http://localhost:3000/"),
            ("ADBROKER_LISTEN", "127.0.0.1:8100"),
            ("ADBROKER_DATABASE", "/var/lib/adbroker/tokens.db"),
            ("ADS_API_BASE", ""),
        ]);

        let mut config = DaemonConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.oauth.client_id, "env-client");
        assert_eq!(config.ads.profile_id.as_deref(), Some("123"));
        assert_eq!(
            config.frontend_origin.as_deref(),
            Some("http://localhost:3000")
        );
        assert_eq!(config.listen_addr.port(), 8100);
        assert_eq!(config.ads.api_base, ADS_API_BASE);
        assert_eq!(
            config.store_backend(),
            StoreBackend::Sqlite {
                path: PathBuf::from("/var/lib/adbroker/tokens.db")
            }
        );

        let provider = config.provider_config();
        assert_eq!(provider.require_client_secret().unwrap().expose(), "env-secret");
        assert_eq!(
            provider.require_redirect_uri().unwrap(),
            "http://localhost:8000/auth/callback"
        );
    }

    #[test]
    fn test_invalid_listen_override() {
        let mut config = DaemonConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == "ADBROKER_LISTEN").then(|| "not-an-address".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_sqlite_path_defaults_to_data_dir() {
        let config = DaemonConfig {
            data_dir: PathBuf::from("/data"),
            ..DaemonConfig::default()
        };

        assert_eq!(
            config.store_backend(),
            StoreBackend::Sqlite {
                path: PathBuf::from("/data/adbroker.db")
            }
        );
    }
}
