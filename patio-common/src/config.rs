//! Configuration loading and backend resolution

use std::path::PathBuf;

use tracing::debug;

use crate::{Error, Result};

/// Default backend when nothing else is configured (local development API)
const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Resolved backend connection settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the request/response API, without trailing slash
    pub base_url: String,
    /// Bearer credential attached to every request and to the push
    /// subscription
    pub token: String,
}

/// Backend URL resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `PATIO_API_URL` environment variable
/// 3. `api_url` key in the TOML config file
/// 4. Compiled local-development default (fallback)
///
/// The bearer token follows the same order (CLI, `PATIO_API_TOKEN`,
/// `api_token` key) but has no default: a missing token is a
/// configuration error, since every request requires the credential.
pub fn resolve_backend(cli_url: Option<&str>, cli_token: Option<&str>) -> Result<BackendConfig> {
    let base_url = resolve_value(cli_url, "PATIO_API_URL", "api_url")
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let token = resolve_value(cli_token, "PATIO_API_TOKEN", "api_token")
        .ok_or_else(|| Error::Config("no API token configured".to_string()))?;

    Ok(BackendConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        token,
    })
}

fn resolve_value(cli_arg: Option<&str>, env_var: &str, file_key: &str) -> Option<String> {
    // Priority 1: Command-line argument
    if let Some(value) = cli_arg {
        debug!(key = file_key, "resolved from command line");
        return Some(value.to_string());
    }

    // Priority 2: Environment variable
    if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
            debug!(key = file_key, var = env_var, "resolved from environment");
            return Some(value);
        }
    }

    // Priority 3: TOML config file
    if let Some(config_path) = config_file_path() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(value) = config.get(file_key).and_then(|v| v.as_str()) {
                    debug!(key = file_key, path = %config_path.display(), "resolved from config file");
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}

/// Platform config file location: `<config dir>/patio/config.toml`
fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("patio").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let config =
            resolve_backend(Some("http://backend:9000/api/"), Some("secret")).unwrap();
        assert_eq!(config.base_url, "http://backend:9000/api");
        assert_eq!(config.token, "secret");
    }

    #[test]
    fn test_missing_token_is_config_error() {
        // No CLI token; env var unset in test environment unless exported
        if std::env::var("PATIO_API_TOKEN").is_ok() {
            return;
        }
        let err = resolve_backend(Some("http://backend:9000/api"), None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = resolve_backend(Some("http://x/api///"), Some("t")).unwrap();
        assert_eq!(config.base_url, "http://x/api");
    }
}
