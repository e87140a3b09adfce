//! Process-wide fetch defaults
//!
//! Loaded once at startup from `.fetch-middleware.toml` and handed to the
//! middleware factory. Environment variables override file values.

use crate::Credentials;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ENV_BASE_URL: &str = "FETCH_BASE_URL";
const ENV_CREDENTIALS: &str = "FETCH_CREDENTIALS";
const ENV_AUTH: &str = "FETCH_AUTH";

/// Defaults applied to every fetch descriptor
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FetchDefaults {
    /// Base URL that relative descriptor URLs are resolved against.
    /// Also the origin for `same-origin` credentials.
    pub base_url: Option<String>,

    /// Default request headers, lower precedence than descriptor headers
    pub headers: BTreeMap<String, String>,

    /// Default credential policy, `omit` when unset
    pub credentials: Option<Credentials>,

    /// Attach an authorization header unless a descriptor disables it
    pub auth: bool,
}

impl FetchDefaults {
    /// Load defaults from the config file, then apply `.env` and environment overrides
    pub fn load() -> Self {
        let mut defaults = match crate::load_config_file() {
            Some(content) => match Self::from_toml_str(&content) {
                Ok(defaults) => {
                    log::info!("Loaded fetch defaults from file");
                    defaults
                }
                Err(e) => {
                    log::warn!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            None => {
                log::debug!("Using default fetch config");
                Self::default()
            }
        };

        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Failed to read .env file: {}", e);
            }
        }
        defaults.apply_overrides(|key| std::env::var(key).ok());
        defaults
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`)
    ///
    /// Values that don't parse are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            log::debug!("{} overrides base_url", ENV_BASE_URL);
            self.base_url = Some(base_url.trim().to_string());
        }

        if let Some(raw) = lookup(ENV_CREDENTIALS) {
            match raw.parse::<Credentials>() {
                Ok(credentials) => self.credentials = Some(credentials),
                Err(e) => log::warn!("Ignoring {}: {}", ENV_CREDENTIALS, e),
            }
        }

        if let Some(raw) = lookup(ENV_AUTH) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.auth = true,
                "0" | "false" | "no" | "off" => self.auth = false,
                other => log::warn!("Ignoring {}: not a boolean '{}'", ENV_AUTH, other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_defaults() {
        let defaults = FetchDefaults::default();
        assert!(defaults.base_url.is_none());
        assert!(defaults.headers.is_empty());
        assert!(!defaults.auth);
        assert!(defaults.credentials.is_none());
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            base_url = "https://api.example.com/v1/"
            credentials = "same-origin"
            auth = true

            [headers]
            X-App-Id = "config"
        "#;
        let defaults = FetchDefaults::from_toml_str(toml).unwrap();
        assert_eq!(
            defaults.base_url.as_deref(),
            Some("https://api.example.com/v1/")
        );
        assert_eq!(defaults.credentials, Some(Credentials::SameOrigin));
        assert!(defaults.auth);
        assert_eq!(defaults.headers.get("X-App-Id").map(String::as_str), Some("config"));
    }

    #[test]
    fn test_deserialize_partial() {
        let defaults = FetchDefaults::from_toml_str("auth = true").unwrap();
        assert!(defaults.auth);
        assert!(defaults.headers.is_empty());
        assert!(defaults.credentials.is_none());
    }

    #[test]
    fn test_deserialize_rejects_unknown_policy() {
        assert!(FetchDefaults::from_toml_str(r#"credentials = "cors""#).is_err());
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let mut defaults = FetchDefaults::from_toml_str(
            r#"
            base_url = "https://file.example.com"
            credentials = "omit"
        "#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            ("FETCH_BASE_URL", "https://env.example.com"),
            ("FETCH_CREDENTIALS", "include"),
            ("FETCH_AUTH", "yes"),
        ]
        .into_iter()
        .collect();

        defaults.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(defaults.base_url.as_deref(), Some("https://env.example.com"));
        assert_eq!(defaults.credentials, Some(Credentials::Include));
        assert!(defaults.auth);
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let mut defaults = FetchDefaults {
            credentials: Some(Credentials::SameOrigin),
            auth: true,
            ..Default::default()
        };
        let env: HashMap<&str, &str> =
            [("FETCH_CREDENTIALS", "sometimes"), ("FETCH_AUTH", "maybe"), ("FETCH_BASE_URL", " ")]
                .into_iter()
                .collect();

        defaults.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(defaults.credentials, Some(Credentials::SameOrigin));
        assert!(defaults.auth);
        assert!(defaults.base_url.is_none());
    }
}
