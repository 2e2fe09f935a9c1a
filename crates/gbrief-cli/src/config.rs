//! Client configuration.
//!
//! Settings live in an optional `config.toml` at
//! `~/.config/gbrief/config.toml` by default. Every value has a default, so
//! the tools run without any config file; flags override what the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gbrief_google::calendar::DEFAULT_CALENDAR_ID;
use gbrief_google::scopes;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Configuration shared by `gcalendar` and `gmail-today`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Exit with status 2 when the API reports an error.
    pub fail_on_api_error: bool,

    /// Credential file and consent settings.
    pub auth: AuthSettings,

    /// HTTP client settings.
    pub http: HttpSettings,

    /// `gcalendar` settings.
    pub calendar: CalendarSettings,

    /// `gmail-today` settings.
    pub gmail: GmailSettings,
}

/// Where credentials live and how consent is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// OAuth client secret downloaded from Google Cloud Console.
    pub credentials_path: PathBuf,

    /// Cached credential, rewritten after refresh or consent.
    pub token_path: PathBuf,

    /// Open the consent page in the default browser.
    pub open_browser: bool,

    /// Ports tried for the consent redirect listener; `[0, 0]` lets the OS pick.
    pub callback_port_range: (u16, u16),
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            open_browser: true,
            callback_port_range: (0, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    /// Number of events to list.
    pub events: u32,

    /// Calendar to query.
    pub calendar_id: String,

    /// OAuth scopes requested on consent.
    pub scopes: Vec<String>,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            events: 10,
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            scopes: scopes::calendar_defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailSettings {
    /// OAuth scopes requested on consent.
    pub scopes: Vec<String>,
}

impl Default for GmailSettings {
    fn default() -> Self {
        Self {
            scopes: scopes::gmail_defaults(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path, which must exist.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let config: Self =
            toml::from_str(content).map_err(|e| format!("failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> Result<(), String> {
        if self.calendar.events == 0 {
            return Err("calendar.events must be at least 1".to_string());
        }
        if self.calendar.calendar_id.is_empty() {
            return Err("calendar.calendar_id must not be empty".to_string());
        }
        if self.calendar.scopes.is_empty() || self.gmail.scopes.is_empty() {
            return Err("scope lists must not be empty".to_string());
        }
        if self.http.timeout_secs == 0 {
            return Err("http.timeout_secs must be at least 1".to_string());
        }
        let (low, high) = self.auth.callback_port_range;
        if low > high {
            return Err(format!(
                "auth.callback_port_range start {} is above end {}",
                low, high
            ));
        }
        Ok(())
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gbrief")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.auth.token_path, PathBuf::from("token.json"));
        assert_eq!(config.auth.credentials_path, PathBuf::from("credentials.json"));
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert_eq!(config.calendar.events, 10);
        assert_eq!(config.calendar.calendar_id, "primary");
        assert!(!config.fail_on_api_error);
    }

    #[test]
    fn full_file() {
        let config = ClientConfig::from_toml(
            r#"
            fail_on_api_error = true

            [auth]
            credentials_path = "/etc/gbrief/client.json"
            token_path = "/var/lib/gbrief/token.json"
            open_browser = false
            callback_port_range = [8080, 8090]

            [http]
            timeout_secs = 5

            [calendar]
            events = 3
            calendar_id = "team@group.calendar.google.com"
            scopes = ["https://www.googleapis.com/auth/calendar.readonly"]

            [gmail]
            scopes = ["https://www.googleapis.com/auth/gmail.modify"]
            "#,
        )
        .unwrap();

        assert!(config.fail_on_api_error);
        assert!(!config.auth.open_browser);
        assert_eq!(config.auth.callback_port_range, (8080, 8090));
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.calendar.events, 3);
        assert_eq!(config.calendar.scopes.len(), 1);
        assert_eq!(config.gmail.scopes, vec![scopes::GMAIL_MODIFY.to_string()]);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = ClientConfig::from_toml("[auth]\nopen_browser = false\n").unwrap();
        assert!(!config.auth.open_browser);
        assert_eq!(config.auth.token_path, PathBuf::from("token.json"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(ClientConfig::from_toml("[calendar]\nevents = 0\n").is_err());
        assert!(ClientConfig::from_toml("[http]\ntimeout_secs = 0\n").is_err());
        assert!(ClientConfig::from_toml("[gmail]\nscopes = []\n").is_err());
        assert!(ClientConfig::from_toml("[auth]\ncallback_port_range = [9000, 8000]\n").is_err());
        assert!(ClientConfig::from_toml("[calendar]\nevents = \"ten\"\n").is_err());
    }

    #[test]
    fn load_from_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load_from(&dir.path().join("config.toml")).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[calendar]\nevents = 25\n").unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.calendar.events, 25);
    }

    #[test]
    fn default_path_is_under_gbrief() {
        assert!(ClientConfig::default_path().ends_with("gbrief/config.toml"));
    }
}
