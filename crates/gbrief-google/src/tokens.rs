//! Cached OAuth credentials and their storage.
//!
//! A [`Credential`] is persisted in Google's "authorized user" JSON shape, so
//! token files written by other Google client libraries load unchanged.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::scopes;
use crate::secrets::{ClientSecret, GOOGLE_TOKEN_URL};

/// A token is treated as expired this many seconds before its recorded expiry.
pub const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// An OAuth credential plus what is needed to refresh it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token for API requests.
    #[serde(default, alias = "access_token")]
    pub token: Option<String>,

    /// The refresh token for obtaining new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token endpoint used for refreshes.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// The OAuth scopes that were granted.
    #[serde(default, deserialize_with = "deserialize_scopes")]
    pub scopes: Vec<String>,

    /// When the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

/// Accepts scopes as a list or as one space-separated string.
fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scopes {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<Scopes>::deserialize(deserializer)? {
        Some(Scopes::List(list)) => list,
        Some(Scopes::Joined(joined)) => joined.split_whitespace().map(String::from).collect(),
        None => Vec::new(),
    })
}

impl Credential {
    /// Creates a credential from a token endpoint response.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            token: Some(access_token.into()),
            refresh_token,
            token_uri: default_token_uri(),
            client_id: None,
            client_secret: None,
            scopes,
            expiry: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    /// Records the OAuth client that issued this credential.
    pub fn with_client(mut self, secret: &ClientSecret) -> Self {
        self.client_id = Some(secret.client_id.clone());
        self.client_secret = Some(secret.client_secret.clone());
        self.token_uri = secret.token_uri.clone();
        self
    }

    /// Returns the access token, if one is present.
    pub fn access_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns true if the access token is expired or about to expire at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry - Duration::seconds(EXPIRY_SKEW_SECS),
            // No recorded expiry: trust the token until the API rejects it
            None => false,
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if an access token is present and unexpired.
    pub fn is_valid(&self) -> bool {
        self.access_token().is_some() && !self.is_expired()
    }

    /// Returns true if the granted scopes cover every required scope.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        scopes::satisfies(&self.scopes, required)
    }

    /// Applies a successful refresh response.
    ///
    /// The previous refresh token is kept when the response omits one, and
    /// the granted scopes change only when the response names them.
    pub fn apply_refresh(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
        refresh_token: Option<String>,
        granted_scope: Option<&str>,
    ) {
        self.token = Some(access_token.into());
        self.expiry = expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs));
        if let Some(refresh_token) = refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = granted_scope {
            self.scopes = scope.split_whitespace().map(String::from).collect();
        }
    }
}

/// Persistence for credentials, keyed by the scope set they were requested for.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored credential, or `None` if nothing is stored.
    fn load(&self, scopes: &[String]) -> ProviderResult<Option<Credential>>;

    /// Stores a credential, replacing any previous one.
    fn save(&self, scopes: &[String], credential: &Credential) -> ProviderResult<()>;
}

/// Stores one credential as a JSON file.
///
/// The file holds a single credential whatever scopes are asked for; callers
/// check the granted scopes themselves.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, _scopes: &[String]) -> ProviderResult<Option<Credential>> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to read token file: {}", e)).with_source(e)
        })?;

        let credential: Credential = serde_json::from_str(&content).map_err(|e| {
            ProviderError::configuration(format!("failed to parse token file: {}", e))
                .with_source(e)
        })?;

        debug!("loaded credential from {:?}", self.path);
        Ok(Some(credential))
    }

    fn save(&self, _scopes: &[String], credential: &Credential) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(credential).map_err(|e| {
            ProviderError::internal(format!("failed to serialize credential: {}", e))
        })?;

        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {}", e))
                .with_source(e)
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to rename token file: {}", e))
                .with_source(e)
        })?;

        debug!("saved credential to {:?}", self.path);
        Ok(())
    }
}

/// Writes `contents` to `path`, readable by the owner only on Unix.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;

    // A leftover temp file keeps the mode it was created with.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            warn!("failed to restrict permissions on {:?}: {}", path, e);
        }
    }
    Ok(())
}

/// Keeps credentials in memory, one per scope set.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: Mutex<HashMap<Vec<String>, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a store pre-seeded with one credential.
    pub fn with_credential(scopes: &[String], credential: Credential) -> Self {
        let mut map = HashMap::new();
        map.insert(scopes::canonical(scopes), credential);
        Self {
            credentials: Mutex::new(map),
        }
    }

    fn lock(&self) -> ProviderResult<std::sync::MutexGuard<'_, HashMap<Vec<String>, Credential>>> {
        self.credentials
            .lock()
            .map_err(|_| ProviderError::internal("credential store lock poisoned"))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, scopes: &[String]) -> ProviderResult<Option<Credential>> {
        Ok(self.lock()?.get(&scopes::canonical(scopes)).cloned())
    }

    fn save(&self, scopes: &[String], credential: &Credential) -> ProviderResult<()> {
        self.lock()?
            .insert(scopes::canonical(scopes), credential.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::scopes::{CALENDAR, CALENDAR_READONLY, GMAIL_MODIFY, GMAIL_READONLY};

    fn owned(scopes: &[&str]) -> Vec<String> {
        scopes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn credential_expiry_skew() {
        let now = Utc::now();
        let mut credential = Credential::new("access", None, None, vec![]);

        credential.expiry = Some(now + Duration::seconds(30));
        assert!(credential.is_expired_at(now));

        credential.expiry = Some(now + Duration::seconds(120));
        assert!(!credential.is_expired_at(now));

        credential.expiry = None;
        assert!(!credential.is_expired_at(now));
    }

    #[test]
    fn credential_validity() {
        let credential = Credential::new("access", None, Some(3600), vec![]);
        assert!(credential.is_valid());

        let expired = Credential::new("access", None, Some(-10), vec![]);
        assert!(!expired.is_valid());

        let mut empty = Credential::new("", None, Some(3600), vec![]);
        assert!(!empty.is_valid());
        empty.token = None;
        assert!(!empty.is_valid());
    }

    #[test]
    fn credential_scope_implication() {
        let credential = Credential::new("a", None, None, owned(&[GMAIL_MODIFY, CALENDAR]));
        assert!(credential.has_scopes(&owned(&[GMAIL_READONLY])));
        assert!(credential.has_scopes(&owned(&[CALENDAR_READONLY])));
        assert!(!credential.has_scopes(&owned(&["https://www.googleapis.com/auth/drive"])));
    }

    #[test]
    fn apply_refresh_keeps_previous_refresh_token() {
        let mut credential =
            Credential::new("old", Some("refresh-1".into()), Some(-10), owned(&[GMAIL_READONLY]));

        credential.apply_refresh("new", Some(3600), None, None);
        assert_eq!(credential.access_token(), Some("new"));
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(credential.scopes, owned(&[GMAIL_READONLY]));
        assert!(credential.is_valid());

        credential.apply_refresh("newer", Some(3600), Some("refresh-2".into()), Some(GMAIL_MODIFY));
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh-2"));
        assert_eq!(credential.scopes, owned(&[GMAIL_MODIFY]));
    }

    #[test]
    fn parses_authorized_user_json() {
        let json = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/gmail.readonly"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2030-01-01T12:00:00.123456Z"
        }"#;

        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.access_token(), Some("ya29.a0"));
        assert_eq!(credential.client_id.as_deref(), Some("id.apps.googleusercontent.com"));
        assert_eq!(credential.scopes, owned(&[GMAIL_READONLY]));
        assert!(credential.is_valid());
    }

    #[test]
    fn parses_joined_scopes_and_access_token_alias() {
        let json = r#"{"access_token": "abc", "scopes": "a b  c"}"#;
        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.access_token(), Some("abc"));
        assert_eq!(credential.scopes, owned(&["a", "b", "c"]));
        assert_eq!(credential.token_uri, GOOGLE_TOKEN_URL);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("token.json"));
        let scopes = owned(&[GMAIL_READONLY]);

        assert!(store.load(&scopes).unwrap().is_none());

        let credential =
            Credential::new("access", Some("refresh".into()), Some(3600), scopes.clone())
                .with_client(&ClientSecret::new("id.apps.googleusercontent.com", "s"));
        store.save(&scopes, &credential).unwrap();

        let loaded = store.load(&scopes).unwrap().unwrap();
        assert_eq!(loaded, credential);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("token.json"));
        store
            .save(&[], &Credential::new("access", None, None, vec![]))
            .unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn file_store_tightens_stale_temp_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("token.json"));
        let temp = store.path().with_extension("json.tmp");
        fs::write(&temp, "stale").unwrap();
        fs::set_permissions(&temp, fs::Permissions::from_mode(0o644)).unwrap();

        store
            .save(&[], &Credential::new("access", None, None, vec![]))
            .unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load(&[]).unwrap().unwrap().access_token(), Some("access"));
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileCredentialStore::new(&path).load(&[]).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn memory_store_keys_by_scope_set() {
        let store = MemoryCredentialStore::new();
        let credential = Credential::new("access", None, None, owned(&[CALENDAR, GMAIL_MODIFY]));

        store
            .save(&owned(&[GMAIL_MODIFY, CALENDAR]), &credential)
            .unwrap();

        assert_eq!(
            store.load(&owned(&[CALENDAR, GMAIL_MODIFY])).unwrap(),
            Some(credential)
        );
        assert!(store.load(&owned(&[GMAIL_READONLY])).unwrap().is_none());
    }
}
