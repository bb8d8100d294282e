// Runtime settings read from the environment (and `.env`, loaded in main).

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::api::ApiClient;
use crate::credentials::CredentialStore;

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// `LMS_DOMAIN`, e.g. `school.instructure.com`.
    pub domain: Option<String>,
    /// `LMS_TOKEN`. Used for the session only, never written to disk.
    pub token: Option<String>,
    /// `LMS_BASE_URL`: full API base that replaces `https://{domain}/api/v1`.
    pub base_url: Option<String>,
    /// `LMS_CONFIG_DIR`: where saved credentials live.
    pub credentials_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            domain: non_empty("LMS_DOMAIN"),
            token: non_empty("LMS_TOKEN"),
            base_url: non_empty("LMS_BASE_URL"),
            credentials_dir: non_empty("LMS_CONFIG_DIR").map(PathBuf::from),
        }
    }

    /// Token and domain from the environment, when both are present.
    pub fn env_credentials(&self) -> Option<(String, String)> {
        Some((self.token.clone()?, self.domain.clone()?))
    }

    pub fn credential_store(&self) -> Result<CredentialStore> {
        match &self.credentials_dir {
            Some(dir) => Ok(CredentialStore::new(dir)),
            None => CredentialStore::default_location()
                .context("Failed to locate the credentials directory"),
        }
    }

    /// Builds the API client for a token and domain, honoring `LMS_BASE_URL`.
    pub fn client(&self, token: &str, domain: &str) -> Result<ApiClient> {
        let client = match &self.base_url {
            Some(base) => ApiClient::with_base_url(token, base),
            None => ApiClient::new(token, domain),
        };
        client.context("Failed to build HTTP client")
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_credentials_need_both_parts() {
        let mut config = Config {
            token: Some("t".into()),
            ..Config::default()
        };
        assert!(config.env_credentials().is_none());
        config.domain = Some("example.org".into());
        assert_eq!(
            config.env_credentials(),
            Some(("t".to_string(), "example.org".to_string()))
        );
    }

    #[test]
    fn base_url_overrides_domain() {
        let config = Config {
            base_url: Some("http://localhost:3000/api/v1/".into()),
            ..Config::default()
        };
        let client = config.client("t", "ignored.example").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api/v1");

        let client = Config::default().client("t", "school.example").unwrap();
        assert_eq!(client.base_url(), "https://school.example/api/v1");
    }

    #[test]
    fn explicit_credentials_dir_is_used() {
        let config = Config {
            credentials_dir: Some(PathBuf::from("/tmp/lms-cli-test")),
            ..Config::default()
        };
        let store = config.credential_store().unwrap();
        assert_eq!(store.path(), PathBuf::from("/tmp/lms-cli-test/credentials.json"));
    }
}
