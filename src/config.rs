//! Client configuration and service credentials
//!
//! Credentials are validated once, at construction, and are read-only
//! afterwards so a single `Arc<RequestCredentials>` can back any number of
//! concurrent sessions.

use crate::error::{Result, SigaError};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Default signature profile (timestamp based, long-term)
pub const DEFAULT_SIGNATURE_PROFILE: &str = "LT";

/// Default extension of the assembled artifact
pub const DEFAULT_EXTENSION: &str = "asice";

/// Service identity used to authenticate every request
#[derive(Clone, Deserialize)]
pub struct RequestCredentials {
    /// Service UUID issued by the gateway operator
    pub service_uuid: String,
    /// Registered service name
    pub service_name: String,
    /// HMAC shared secret
    pub shared_secret: String,
    /// Gateway base URL, e.g. `https://siga.example.com/siga`
    pub base_url: String,
}

impl RequestCredentials {
    /// Build validated credentials
    pub fn new(
        service_uuid: impl Into<String>,
        service_name: impl Into<String>,
        shared_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Self {
            service_uuid: service_uuid.into(),
            service_name: service_name.into(),
            shared_secret: shared_secret.into(),
            base_url: base_url.into(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Fail fast on any empty field
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("base_url", &self.base_url),
            ("service_name", &self.service_name),
            ("service_uuid", &self.service_uuid),
            ("shared_secret", &self.shared_secret),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SigaError::Configuration(format!("{} is missing", field)));
            }
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

// Never print the shared secret.
impl fmt::Debug for RequestCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCredentials")
            .field("service_uuid", &self.service_uuid)
            .field("service_name", &self.service_name)
            .field("shared_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Client configuration
///
/// Loaded from TOML:
///
/// ```toml
/// signature_profile = "LT"
/// extension = "asice"
/// timeout_secs = 30
///
/// [credentials]
/// service_uuid = "a7fd7728-a3ea-4975-bfab-f240a67e894f"
/// service_name = "demo"
/// shared_secret = "746573745365637265744b6579303031"
/// base_url = "https://siga-demo.example.com/siga"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Service credentials
    pub credentials: RequestCredentials,
    /// Signature profile sent with every signing request (default: LT)
    #[serde(default = "default_signature_profile")]
    pub signature_profile: String,
    /// Extension of the assembled artifact (default: asice)
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_signature_profile() -> String {
    DEFAULT_SIGNATURE_PROFILE.to_string()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClientConfig {
    /// Configuration with default profile, extension and timeout
    pub fn new(credentials: RequestCredentials) -> Self {
        Self {
            credentials,
            signature_profile: default_signature_profile(),
            extension: default_extension(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(input)
            .map_err(|e| SigaError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let input = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        if self.signature_profile.trim().is_empty() {
            return Err(SigaError::Configuration(
                "signature_profile is missing".to_string(),
            ));
        }
        let extension = self.extension.trim();
        if extension.is_empty() || extension.contains(['/', '\\', '.']) {
            return Err(SigaError::Configuration(format!(
                "invalid artifact extension: {:?}",
                self.extension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_TOML: &str = r#"
signature_profile = "LTA"
extension = "bdoc"
timeout_secs = 10

[credentials]
service_uuid = "uuid-1"
service_name = "demo"
shared_secret = "secret"
base_url = "https://siga.example.com/"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = ClientConfig::from_toml_str(FULL_TOML).unwrap();
        assert_eq!(config.signature_profile, "LTA");
        assert_eq!(config.extension, "bdoc");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.credentials.base_url(), "https://siga.example.com");
    }

    #[test]
    fn test_defaults_applied() {
        let config = ClientConfig::from_toml_str(
            r#"
[credentials]
service_uuid = "uuid-1"
service_name = "demo"
shared_secret = "secret"
base_url = "https://siga.example.com"
"#,
        )
        .unwrap();
        assert_eq!(config.signature_profile, DEFAULT_SIGNATURE_PROFILE);
        assert_eq!(config.extension, DEFAULT_EXTENSION);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_empty_secret_rejected() {
        let err = RequestCredentials::new("uuid", "demo", "", "https://x").unwrap_err();
        assert!(matches!(err, SigaError::Configuration(ref m) if m.contains("shared_secret")));
    }

    #[test]
    fn test_empty_field_in_toml_rejected() {
        let input = FULL_TOML.replace("service_uuid = \"uuid-1\"", "service_uuid = \"\"");
        let err = ClientConfig::from_toml_str(&input).unwrap_err();
        assert!(matches!(err, SigaError::Configuration(_)));
    }

    #[test]
    fn test_bad_extension_rejected() {
        let input = FULL_TOML.replace("extension = \"bdoc\"", "extension = \"../x\"");
        assert!(ClientConfig::from_toml_str(&input).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = RequestCredentials::new("uuid", "demo", "hunter2", "https://x").unwrap();
        let printed = format!("{:?}", credentials);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
