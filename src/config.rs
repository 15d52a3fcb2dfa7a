//! Process configuration.
//!
//! Downstream credentials come from the environment and are required at startup. Network
//! placement comes from command-line flags:
//!
//! - `--bind <addr:port>`: address of the HTTP listener (default `0.0.0.0:5000`).
//! - `--store <url>`: base URL of a shared store node. Without it the relay keeps records in
//!   its own memory.
//! - `--serve-store`: also expose this process's in-memory store to other relays.

use std::net::SocketAddr;
use std::time::Duration;

use crate::forward::ForwardPolicy;

pub const ENV_API_TOKEN: &str = "GD_API_TOKEN";
pub const ENV_API_BASE: &str = "GD_API_BASE";
pub const ENV_FORWARD_ATTEMPTS: &str = "RELAY_FORWARD_ATTEMPTS";
pub const ENV_FORWARD_TIMEOUT_MS: &str = "RELAY_FORWARD_TIMEOUT_MS";
pub const ENV_STORE_TIMEOUT_MS: &str = "RELAY_STORE_TIMEOUT_MS";
pub const ENV_STORE_ATTEMPTS: &str = "RELAY_STORE_ATTEMPTS";
pub const ENV_CLAIM_LEASE_MS: &str = "RELAY_CLAIM_LEASE_MS";
pub const ENV_RECONCILE_INTERVAL_MS: &str = "RELAY_RECONCILE_INTERVAL_MS";

const DEFAULT_BIND: &str = "0.0.0.0:5000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Must define {0} environment variable")]
    MissingEnv(&'static str),
    #[error("Invalid value {value:?} for {name}")]
    InvalidValue { name: String, value: String },
    #[error("Flag {0} requires a value")]
    MissingFlagValue(String),
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub api_base: String,
    pub api_token: String,
    /// `None` means an in-process store.
    pub store_url: Option<String>,
    pub serve_store: bool,
    pub forward: ForwardPolicy,
    pub store_timeout: Duration,
    pub store_attempts: usize,
    pub claim_lease: Duration,
    /// Zero disables the reconciliation sweep.
    pub reconcile_interval: Duration,
}

impl RelayConfig {
    /// Reads the process environment and `std::env::args`.
    pub fn load() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::from_sources(|name| std::env::var(name).ok(), &args)
    }

    /// Builds a config from an environment lookup and the flags after the program name.
    pub fn from_sources<E>(env: E, args: &[String]) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let api_token = required(&env, ENV_API_TOKEN)?;
        let api_base = required(&env, ENV_API_BASE)?;

        let mut bind = DEFAULT_BIND.to_string();
        let mut store_url = None;
        let mut serve_store = false;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--bind" => {
                    bind = flag_value(args, i)?;
                    i += 2;
                }
                "--store" => {
                    store_url = Some(flag_value(args, i)?);
                    i += 2;
                }
                "--serve-store" => {
                    serve_store = true;
                    i += 1;
                }
                other => {
                    tracing::warn!("Ignoring unknown argument {}", other);
                    i += 1;
                }
            }
        }

        let bind_addr = parse_value("--bind", &bind)?;

        let defaults = ForwardPolicy::default();
        let forward = ForwardPolicy {
            attempts: optional(&env, ENV_FORWARD_ATTEMPTS)?.unwrap_or(defaults.attempts),
            timeout: optional(&env, ENV_FORWARD_TIMEOUT_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            ..defaults
        };

        // A lease that can run out mid-delivery lets a second submitter send the message again.
        let claim_lease = Duration::from_millis(
            optional(&env, ENV_CLAIM_LEASE_MS)?.unwrap_or(30_000),
        );
        let delivery_budget = forward.worst_case_duration();
        if claim_lease <= delivery_budget {
            tracing::error!(
                "Claim lease {:?} does not cover the worst-case delivery time {:?}",
                claim_lease,
                delivery_budget
            );
            return Err(ConfigError::InvalidValue {
                name: ENV_CLAIM_LEASE_MS.to_string(),
                value: format!(
                    "{} (must exceed {} ms of forward attempts)",
                    claim_lease.as_millis(),
                    delivery_budget.as_millis()
                ),
            });
        }

        Ok(Self {
            bind_addr,
            api_base,
            api_token,
            store_url,
            serve_store,
            forward,
            store_timeout: Duration::from_millis(
                optional(&env, ENV_STORE_TIMEOUT_MS)?.unwrap_or(500),
            ),
            store_attempts: optional(&env, ENV_STORE_ATTEMPTS)?.unwrap_or(3),
            claim_lease,
            reconcile_interval: Duration::from_millis(
                optional(&env, ENV_RECONCILE_INTERVAL_MS)?.unwrap_or(10_000),
            ),
        })
    }
}

fn required<E>(env: &E, name: &'static str) -> Result<String, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    match env(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

fn optional<E, T>(env: &E, name: &str) -> Result<Option<T>, ConfigError>
where
    E: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match env(name) {
        Some(value) => parse_value(name, &value).map(Some),
        None => Ok(None),
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn flag_value(args: &[String], i: usize) -> Result<String, ConfigError> {
    args.get(i + 1)
        .cloned()
        .ok_or_else(|| ConfigError::MissingFlagValue(args[i].clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let env = env_of(&[(ENV_API_BASE, "http://score.local")]);
        let err = RelayConfig::from_sources(env, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ENV_API_TOKEN)));
    }

    #[test]
    fn test_missing_base_is_fatal() {
        let env = env_of(&[(ENV_API_TOKEN, "secret")]);
        let err = RelayConfig::from_sources(env, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ENV_API_BASE)));
    }

    #[test]
    fn test_defaults() {
        let env = env_of(&[(ENV_API_TOKEN, "secret"), (ENV_API_BASE, "http://score.local")]);
        let config = RelayConfig::from_sources(env, &[]).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.api_token, "secret");
        assert!(config.store_url.is_none());
        assert!(!config.serve_store);
        assert_eq!(config.forward.attempts, 3);
        assert_eq!(config.claim_lease, Duration::from_secs(30));
    }

    #[test]
    fn test_flags_and_overrides() {
        let env = env_of(&[
            (ENV_API_TOKEN, "secret"),
            (ENV_API_BASE, "http://score.local"),
            (ENV_FORWARD_ATTEMPTS, "5"),
            (ENV_FORWARD_TIMEOUT_MS, "250"),
            (ENV_RECONCILE_INTERVAL_MS, "0"),
        ]);
        let config = RelayConfig::from_sources(
            env,
            &args(&[
                "--bind",
                "127.0.0.1:7000",
                "--store",
                "http://store:6000",
                "--serve-store",
            ]),
        )
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.store_url.as_deref(), Some("http://store:6000"));
        assert!(config.serve_store);
        assert_eq!(config.forward.attempts, 5);
        assert_eq!(config.forward.timeout, Duration::from_millis(250));
        assert_eq!(config.reconcile_interval, Duration::ZERO);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let env = env_of(&[
            (ENV_API_TOKEN, "secret"),
            (ENV_API_BASE, "http://score.local"),
            (ENV_FORWARD_ATTEMPTS, "three"),
        ]);
        let err = RelayConfig::from_sources(env, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_lease_shorter_than_delivery_budget_is_rejected() {
        // 3 attempts of 20 s each can outlive the default 30 s lease.
        let env = env_of(&[
            (ENV_API_TOKEN, "secret"),
            (ENV_API_BASE, "http://score.local"),
            (ENV_FORWARD_TIMEOUT_MS, "20000"),
        ]);
        let err = RelayConfig::from_sources(env, &[]).unwrap_err();
        match err {
            ConfigError::InvalidValue { name, .. } => assert_eq!(name, ENV_CLAIM_LEASE_MS),
            other => panic!("expected invalid lease, got {:?}", other),
        }
    }

    #[test]
    fn test_longer_lease_admits_slow_downstream() {
        let env = env_of(&[
            (ENV_API_TOKEN, "secret"),
            (ENV_API_BASE, "http://score.local"),
            (ENV_FORWARD_TIMEOUT_MS, "20000"),
            (ENV_CLAIM_LEASE_MS, "90000"),
        ]);
        let config = RelayConfig::from_sources(env, &[]).unwrap();

        assert!(config.claim_lease > config.forward.worst_case_duration());
    }

    #[test]
    fn test_flag_without_value() {
        let env = env_of(&[(ENV_API_TOKEN, "secret"), (ENV_API_BASE, "http://score.local")]);
        let err = RelayConfig::from_sources(env, &args(&["--bind"])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFlagValue(_)));
    }
}
