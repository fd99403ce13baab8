//! Environment-backed runtime configuration for `logic-smoke`.

use std::env;

use logic_core::{
    AuthInfo, Device, LogicContext, RetryPolicy,
    context::{DEFAULT_BASE_URL, DEFAULT_MOCK_BASE_URL},
};
use thiserror::Error;
use url::Url;

const DEFAULT_PAGES: u32 = 3;
const DEFAULT_PAGE_SIZE: usize = 8;
const DEFAULT_FAIL_PAGE: u32 = 2;
const DEFAULT_MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 20;
const RETRY_MAX_DELAY_MS: u64 = 200;

/// Runtime configuration used by the smoke driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    /// Call context handed to the dispatcher.
    pub context: LogicContext,
    /// Pages served by the fake backend for every paged list.
    pub pages: u32,
    /// Items per page served by the fake backend.
    pub page_size: usize,
    /// Page whose first request fails with a transient error, if any.
    pub fail_page: Option<u32>,
    /// Backoff applied before retrying a failed list.
    pub retry: RetryPolicy,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            context: LogicContext::default(),
            pages: DEFAULT_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
            fail_page: Some(DEFAULT_FAIL_PAGE),
            retry: RetryPolicy::new(RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_MS, DEFAULT_MAX_RETRIES),
        }
    }
}

impl SmokeConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mock_api = parse_optional_bool("LOGIC_MOCK_API", &mut lookup)?.unwrap_or(false);
        let base_url = match optional_trimmed_env("LOGIC_BASE_URL", &mut lookup) {
            Some(value) => normalize_base_url("LOGIC_BASE_URL", value)?,
            None if mock_api => DEFAULT_MOCK_BASE_URL.to_owned(),
            None => DEFAULT_BASE_URL.to_owned(),
        };

        let device = match optional_trimmed_env("LOGIC_DEVICE", &mut lookup) {
            Some(value) => Device::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: "LOGIC_DEVICE",
                value,
                reason: "expected apple, android or desktop".to_owned(),
            })?,
            None => Device::default(),
        };

        let auth = match (
            optional_trimmed_env("LOGIC_AUTH_UID", &mut lookup),
            optional_trimmed_env("LOGIC_AUTH_TOKEN", &mut lookup),
        ) {
            (Some(uid), Some(token)) => Some(AuthInfo { uid, token }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::IncompleteAuth("LOGIC_AUTH_TOKEN")),
            (None, Some(_)) => return Err(ConfigError::IncompleteAuth("LOGIC_AUTH_UID")),
        };

        let pages = parse_optional_u32("LOGIC_SMOKE_PAGES", &mut lookup)?.unwrap_or(DEFAULT_PAGES);
        if pages == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LOGIC_SMOKE_PAGES",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        let page_size = parse_optional_u32("LOGIC_SMOKE_PAGE_SIZE", &mut lookup)?
            .map_or(DEFAULT_PAGE_SIZE, |size| size as usize);
        if page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LOGIC_SMOKE_PAGE_SIZE",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        // 0 disables the injected failure.
        let fail_page = match parse_optional_u32("LOGIC_SMOKE_FAIL_PAGE", &mut lookup)? {
            Some(0) => None,
            Some(page) => Some(page),
            None => Some(DEFAULT_FAIL_PAGE),
        };

        let max_retries = parse_optional_u32("LOGIC_SMOKE_MAX_RETRIES", &mut lookup)?
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let context = LogicContext {
            base_url,
            device,
            auth,
            ..LogicContext::default()
        };

        Ok(Self {
            context,
            pages,
            page_size,
            fail_page,
            retry: RetryPolicy::new(RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_MS, max_retries),
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    /// Only half of the credential pair was provided.
    #[error("incomplete credentials: {0} is missing")]
    IncompleteAuth(&'static str),
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_u32<F>(key: &'static str, lookup: &mut F) -> Result<Option<u32>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<u32>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_bool<F>(key: &'static str, lookup: &mut F) -> Result<Option<bool>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected a boolean".to_owned(),
        }),
    }
}

fn normalize_base_url(key: &'static str, value: String) -> Result<String, ConfigError> {
    let parsed = Url::parse(&value).map_err(|err| ConfigError::InvalidValue {
        key,
        value: value.clone(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "scheme must be http or https".to_owned(),
        });
    }
    Ok(parsed.as_str().trim_end_matches('/').to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<SmokeConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        SmokeConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = config_from_pairs(&[]).expect("config should parse");
        assert_eq!(cfg, SmokeConfig::default());
        assert_eq!(cfg.context.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.fail_page, Some(DEFAULT_FAIL_PAGE));
    }

    #[test]
    fn mock_api_switches_default_base_url() {
        let cfg = config_from_pairs(&[("LOGIC_MOCK_API", "true")]).expect("config should parse");
        assert_eq!(cfg.context.base_url, DEFAULT_MOCK_BASE_URL);

        let cfg = config_from_pairs(&[
            ("LOGIC_MOCK_API", "yes"),
            ("LOGIC_BASE_URL", "http://127.0.0.1:8080/api/"),
        ])
        .expect("config should parse");
        assert_eq!(cfg.context.base_url, "http://127.0.0.1:8080/api");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = config_from_pairs(&[("LOGIC_BASE_URL", "ftp://ngabbs.com")])
            .expect_err("ftp must be rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "LOGIC_BASE_URL",
                ..
            }
        ));
        assert!(config_from_pairs(&[("LOGIC_BASE_URL", "not a url")]).is_err());
    }

    #[test]
    fn parses_device_and_auth_pair() {
        let cfg = config_from_pairs(&[
            ("LOGIC_DEVICE", "android"),
            ("LOGIC_AUTH_UID", "42"),
            ("LOGIC_AUTH_TOKEN", " token "),
        ])
        .expect("config should parse");

        assert_eq!(cfg.context.device, Device::Android);
        let auth = cfg.context.auth.expect("auth should be present");
        assert_eq!(auth.uid, "42");
        assert_eq!(auth.token, "token");
    }

    #[test]
    fn half_an_auth_pair_is_an_error() {
        assert_eq!(
            config_from_pairs(&[("LOGIC_AUTH_UID", "42")]),
            Err(ConfigError::IncompleteAuth("LOGIC_AUTH_TOKEN"))
        );
        assert_eq!(
            config_from_pairs(&[("LOGIC_AUTH_TOKEN", "t")]),
            Err(ConfigError::IncompleteAuth("LOGIC_AUTH_UID"))
        );
    }

    #[test]
    fn parses_smoke_tuning() {
        let cfg = config_from_pairs(&[
            ("LOGIC_SMOKE_PAGES", "5"),
            ("LOGIC_SMOKE_PAGE_SIZE", "20"),
            ("LOGIC_SMOKE_FAIL_PAGE", "0"),
            ("LOGIC_SMOKE_MAX_RETRIES", "1"),
        ])
        .expect("config should parse");

        assert_eq!(cfg.pages, 5);
        assert_eq!(cfg.page_size, 20);
        assert_eq!(cfg.fail_page, None);
        assert_eq!(cfg.retry.max_attempts(), 1);
    }

    #[test]
    fn rejects_invalid_numbers() {
        let err = config_from_pairs(&[("LOGIC_SMOKE_PAGES", "many")])
            .expect_err("non-numeric pages must fail");
        assert!(err.to_string().starts_with("invalid LOGIC_SMOKE_PAGES='many'"));
        assert!(config_from_pairs(&[("LOGIC_SMOKE_PAGE_SIZE", "0")]).is_err());
        assert!(config_from_pairs(&[("LOGIC_DEVICE", "tv")]).is_err());
        assert!(config_from_pairs(&[("LOGIC_MOCK_API", "maybe")]).is_err());
    }
}
