//! Runtime configuration for the relay.
//!
//! Settings come from an optional `relay.toml` file with environment-variable
//! overrides on top (the env names match what the upstream platform's example
//! apps expect, e.g. `ONSHAPE_API_URL`, `WEBHOOK_CALLBACK_ROOT_URL`).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

const DEFAULT_API_URL: &str = "https://cad.onshape.com/api";
const DEFAULT_OAUTH_URL: &str = "https://oauth.onshape.com";
const DEFAULT_PORT: u16 = 3000;

/// Job store bounds; mirrors the lru settings the example apps shipped with.
const DEFAULT_STORE_CAPACITY: usize = 500;
const DEFAULT_STORE_TTL_SECS: u64 = 300;

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub dev_mode: bool,
    /// Base URL of the Onshape REST API, without a trailing slash.
    pub api_url: String,
    /// Base URL of the OAuth authority (token refresh endpoint lives here).
    pub oauth_url: String,
    pub auth: AuthScheme,
    /// When set, upstream calls are routed through the Flow proxy instead of
    /// hitting the platform directly.
    pub flow: Option<FlowConfig>,
    /// Public root URL of this app, used as the webhook callback target.
    pub callback_root_url: String,
    pub store_capacity: usize,
    pub store_ttl: Duration,
}

/// How outbound requests authenticate against the platform.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// OAuth bearer token, refreshable via the refresh-token grant.
    OAuth {
        client_id: String,
        client_secret: String,
        access_token: String,
        refresh_token: Option<String>,
    },
    /// Developer API keys sent as HTTP Basic.
    ApiKeys {
        access_key: String,
        secret_key: String,
    },
}

/// Settings for the Flow automation-proxy variant.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FlowConfig {
    /// Flow that forwards arbitrary Onshape API requests.
    pub proxy_url: String,
    /// Flow that performs webhook registration.
    pub register_webhook_url: String,
}

// ── File schema ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct RelayFile {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    onshape: OnshapeSection,
    #[serde(default)]
    auth: AuthSection,
    flow: Option<FlowConfig>,
    #[serde(default)]
    webhook: WebhookSection,
    #[serde(default)]
    store: StoreSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    port: Option<u16>,
    dev: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OnshapeSection {
    api_url: Option<String>,
    oauth_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthSection {
    access_key: Option<String>,
    secret_key: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookSection {
    callback_root_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoreSection {
    capacity: Option<usize>,
    ttl_secs: Option<u64>,
}

impl RelayConfig {
    /// Load configuration from the given file (if present) plus environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file {}", p.display()))?;
                Self::parse_file(&raw)?
            }
            None => {
                let default = Path::new("relay.toml");
                if default.exists() {
                    let raw = std::fs::read_to_string(default)
                        .context("Failed to read relay.toml")?;
                    Self::parse_file(&raw)?
                } else {
                    RelayFile::default()
                }
            }
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    fn parse_file(raw: &str) -> Result<RelayFile> {
        toml::from_str(raw).context("Invalid config file")
    }

    /// Merge file values with environment overrides and validate.
    fn resolve(file: RelayFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = env("PORT")
            .and_then(|v| v.parse().ok())
            .or(file.server.port)
            .unwrap_or(DEFAULT_PORT);

        let api_url = env("ONSHAPE_API_URL")
            .or(file.onshape.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let oauth_url = env("ONSHAPE_OAUTH_URL")
            .or(file.onshape.oauth_url)
            .unwrap_or_else(|| DEFAULT_OAUTH_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let callback_root_url = env("WEBHOOK_CALLBACK_ROOT_URL")
            .or(file.webhook.callback_root_url)
            .ok_or_else(|| anyhow!("webhook.callback_root_url (or WEBHOOK_CALLBACK_ROOT_URL) is required"))?
            .trim_end_matches('/')
            .to_string();

        let access_key = env("ONSHAPE_ACCESS_KEY").or(file.auth.access_key);
        let secret_key = env("ONSHAPE_SECRET_KEY").or(file.auth.secret_key);
        let client_id = env("OAUTH_CLIENT_ID").or(file.auth.client_id);
        let client_secret = env("OAUTH_CLIENT_SECRET").or(file.auth.client_secret);
        let access_token = env("OAUTH_ACCESS_TOKEN").or(file.auth.access_token);
        let refresh_token = env("OAUTH_REFRESH_TOKEN").or(file.auth.refresh_token);

        let auth = match (access_key, secret_key, access_token) {
            (Some(access_key), Some(secret_key), _) => AuthScheme::ApiKeys {
                access_key,
                secret_key,
            },
            (_, _, Some(access_token)) => AuthScheme::OAuth {
                client_id: client_id
                    .ok_or_else(|| anyhow!("auth.client_id is required for OAuth"))?,
                client_secret: client_secret
                    .ok_or_else(|| anyhow!("auth.client_secret is required for OAuth"))?,
                access_token,
                refresh_token,
            },
            _ => {
                return Err(anyhow!(
                    "No credentials configured: set auth.access_key/secret_key or an OAuth access_token"
                ));
            }
        };

        let flow = match env("FLOW_PROXY_URL") {
            Some(proxy_url) => Some(FlowConfig {
                proxy_url,
                register_webhook_url: env("FLOW_REGISTER_WEBHOOK_URL").ok_or_else(|| {
                    anyhow!("FLOW_REGISTER_WEBHOOK_URL is required when FLOW_PROXY_URL is set")
                })?,
            }),
            None => file.flow,
        };

        Ok(Self {
            port,
            dev_mode: file.server.dev.unwrap_or(false),
            api_url,
            oauth_url,
            auth,
            flow,
            callback_root_url,
            store_capacity: file.store.capacity.unwrap_or(DEFAULT_STORE_CAPACITY),
            store_ttl: Duration::from_secs(
                file.store.ttl_secs.unwrap_or(DEFAULT_STORE_TTL_SECS),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn resolve_with_api_keys_and_defaults() {
        let raw = r#"
            [auth]
            access_key = "ak"
            secret_key = "sk"

            [webhook]
            callback_root_url = "https://relay.example.com/"
        "#;
        let file = RelayConfig::parse_file(raw).unwrap();
        let config = RelayConfig::resolve(file, no_env).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        // trailing slash is normalized away
        assert_eq!(config.callback_root_url, "https://relay.example.com");
        assert_eq!(config.store_capacity, 500);
        assert_eq!(config.store_ttl, Duration::from_secs(300));
        assert!(matches!(config.auth, AuthScheme::ApiKeys { .. }));
    }

    #[test]
    fn resolve_oauth_requires_client_credentials() {
        let raw = r#"
            [auth]
            access_token = "tok"

            [webhook]
            callback_root_url = "https://relay.example.com"
        "#;
        let file = RelayConfig::parse_file(raw).unwrap();
        let err = RelayConfig::resolve(file, no_env).unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn resolve_without_credentials_fails() {
        let raw = r#"
            [webhook]
            callback_root_url = "https://relay.example.com"
        "#;
        let file = RelayConfig::parse_file(raw).unwrap();
        assert!(RelayConfig::resolve(file, no_env).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let raw = r#"
            [server]
            port = 3000

            [auth]
            access_key = "ak"
            secret_key = "sk"

            [webhook]
            callback_root_url = "https://file.example.com"
        "#;
        let file = RelayConfig::parse_file(raw).unwrap();
        let config = RelayConfig::resolve(file, |key| match key {
            "PORT" => Some("8080".to_string()),
            "WEBHOOK_CALLBACK_ROOT_URL" => Some("https://env.example.com".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.callback_root_url, "https://env.example.com");
    }

    #[test]
    fn flow_section_is_optional_but_complete() {
        let raw = r#"
            [auth]
            access_key = "ak"
            secret_key = "sk"

            [webhook]
            callback_root_url = "https://relay.example.com"

            [flow]
            proxy_url = "https://flow.example.com/proxy"
            register_webhook_url = "https://flow.example.com/register"
        "#;
        let file = RelayConfig::parse_file(raw).unwrap();
        let config = RelayConfig::resolve(file, no_env).unwrap();
        let flow = config.flow.expect("flow config");
        assert_eq!(flow.proxy_url, "https://flow.example.com/proxy");
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        fs::write(
            &path,
            r#"
                [server]
                port = 4321

                [auth]
                access_key = "ak"
                secret_key = "sk"

                [webhook]
                callback_root_url = "https://relay.example.com"

                [store]
                capacity = 16
                ttl_secs = 60
            "#,
        )
        .unwrap();
        let config = RelayConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store_capacity, 16);
        assert_eq!(config.store_ttl, Duration::from_secs(60));
    }
}
