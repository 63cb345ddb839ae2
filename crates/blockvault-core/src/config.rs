//! Library configuration.

/// Default storage host.
pub const DEFAULT_BASE_URL: &str = "drive-api.proton.me";

/// Default locale for user-visible error messages.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Configuration recognized by the download stack.
#[derive(Clone, Debug)]
pub struct DriveConfig {
    /// Storage host the API adapter talks to.
    pub base_url: String,
    /// Locale for user-visible error messages.
    pub language: String,
    /// Caller identity used for draft reconciliation by upload flows. The
    /// download pipeline carries it but does not consume it.
    pub client_uid: Option<String>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            client_uid: None,
        }
    }
}

impl DriveConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the error message locale.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the caller identity.
    #[must_use]
    pub fn with_client_uid(mut self, client_uid: impl Into<String>) -> Self {
        self.client_uid = Some(client_uid.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DriveConfig::default();
        assert_eq!(config.base_url, "drive-api.proton.me");
        assert_eq!(config.language, "en");
        assert!(config.client_uid.is_none());
    }

    #[test]
    fn builders_override_fields() {
        let config = DriveConfig::new()
            .with_base_url("drive.example.test")
            .with_language("de")
            .with_client_uid("client-7");
        assert_eq!(config.base_url, "drive.example.test");
        assert_eq!(config.language, "de");
        assert_eq!(config.client_uid.as_deref(), Some("client-7"));
    }
}
