//! OAuth client configuration.
//!
//! Loads the provider client registration from a `credentials.json` in
//! either the Google "web" or "installed" shape. Resolution order:
//! an explicit path, then `~/.sheetboard/credentials.json`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// The only capability the dashboard requests: read-only sheet access.
pub const SPREADSHEETS_READONLY_SCOPE: &str =
    "https://www.googleapis.com/auth/spreadsheets.readonly";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("credentials not found at {0}")]
    NotFound(PathBuf),
    #[error("invalid credentials format: {0}")]
    Invalid(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolved OAuth client configuration used by the credential manager.
#[derive(Debug, Clone)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
    /// Fixed return address registered with the provider. The consent flow
    /// rebinds this to the captured localhost port before use.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

// ============================================================================
// credentials.json shapes
// ============================================================================

/// Top-level credentials file. Google writes the client entry under
/// "web" for server-side apps and "installed" for desktop apps; both
/// carry the same fields we need.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(alias = "web")]
    installed: ClientEntry,
}

#[derive(Debug, Deserialize)]
struct ClientEntry {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl OauthConfig {
    /// Parse a credentials.json payload into a ready-to-use config with the
    /// read-only sheets scope.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let file: CredentialsFile =
            serde_json::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let entry = file.installed;

        Ok(OauthConfig {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            auth_uri: entry
                .auth_uri
                .unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: entry
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            redirect_uri: entry
                .redirect_uris
                .into_iter()
                .next()
                .unwrap_or_else(|| "http://localhost".to_string()),
            scopes: vec![SPREADSHEETS_READONLY_SCOPE.to_string()],
        })
    }

    /// Load from an explicit file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| match e {
            ConfigError::Invalid(msg) => {
                ConfigError::Invalid(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Load from the default location, `~/.sheetboard/credentials.json`.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&default_credentials_path())
    }
}

/// Canonical path to the client credentials file.
pub fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".sheetboard")
        .join("credentials.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_credentials_parsing() {
        let json = r#"{
            "web": {
                "client_id": "12345.apps.googleusercontent.com",
                "client_secret": "secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost:8501/"]
            }
        }"#;

        let cfg = OauthConfig::from_json(json).unwrap();
        assert_eq!(cfg.client_id, "12345.apps.googleusercontent.com");
        assert_eq!(cfg.client_secret.as_deref(), Some("secret"));
        assert_eq!(cfg.redirect_uri, "http://localhost:8501/");
        assert_eq!(cfg.scopes, vec![SPREADSHEETS_READONLY_SCOPE.to_string()]);
    }

    #[test]
    fn test_installed_credentials_parsing() {
        let json = r#"{
            "installed": {
                "client_id": "desktop.apps.googleusercontent.com",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]
            }
        }"#;

        let cfg = OauthConfig::from_json(json).unwrap();
        assert_eq!(cfg.client_id, "desktop.apps.googleusercontent.com");
        assert!(cfg.client_secret.is_none());
    }

    #[test]
    fn test_missing_endpoints_use_defaults() {
        let json = r#"{"web": {"client_id": "c"}}"#;
        let cfg = OauthConfig::from_json(json).unwrap();
        assert_eq!(cfg.auth_uri, DEFAULT_AUTH_URI);
        assert_eq!(cfg.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(cfg.redirect_uri, "http://localhost");
    }

    #[test]
    fn test_malformed_credentials_rejected() {
        assert!(matches!(
            OauthConfig::from_json("{}"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            OauthConfig::from_json("not json"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"web": {"client_id": "file-client", "client_secret": "s"}}"#,
        )
        .unwrap();

        let cfg = OauthConfig::load(&path).unwrap();
        assert_eq!(cfg.client_id, "file-client");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(matches!(
            OauthConfig::load(&path),
            Err(ConfigError::NotFound(_))
        ));
    }
}
