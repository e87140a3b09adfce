//! Credential inclusion policy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether cookies are attached to outgoing requests and stored from responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    /// Never send or store cookies
    #[default]
    Omit,

    /// Only for requests to the configured origin
    SameOrigin,

    /// Always send and store cookies
    Include,
}

impl Credentials {
    pub fn as_str(&self) -> &'static str {
        match self {
            Credentials::Omit => "omit",
            Credentials::SameOrigin => "same-origin",
            Credentials::Include => "include",
        }
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Credentials {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omit" => Ok(Credentials::Omit),
            "same-origin" => Ok(Credentials::SameOrigin),
            "include" => Ok(Credentials::Include),
            other => Err(anyhow::anyhow!("unknown credentials policy '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_omit() {
        assert_eq!(Credentials::default(), Credentials::Omit);
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!(
            "Same-Origin".parse::<Credentials>().unwrap(),
            Credentials::SameOrigin
        );
        assert_eq!(" INCLUDE ".parse::<Credentials>().unwrap(), Credentials::Include);
        assert!("cors".parse::<Credentials>().is_err());
    }

    #[test]
    fn test_display_matches_serde_spelling() {
        for policy in [Credentials::Omit, Credentials::SameOrigin, Credentials::Include] {
            let parsed: Credentials = policy.to_string().parse().unwrap();
            assert_eq!(parsed, policy);
        }
        assert_eq!(Credentials::SameOrigin.to_string(), "same-origin");
    }
}
