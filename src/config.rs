use crate::network::Network;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub network: Network,
    pub rpc_urls: Vec<String>,
    pub poa_compat: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub networks: Vec<NetworkConfig>,
    pub database_path: String,
    pub confirmation_depth: u64,
    pub poll_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub failure_threshold: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut networks = Vec::new();
        for (network, urls_var, poa_var, poa_default) in [
            (Network::Eth, "ETH_RPC_URLS", "ETH_POA_COMPAT", false),
            (Network::Bsc, "BSC_RPC_URLS", "BSC_POA_COMPAT", true),
        ] {
            let Ok(raw) = std::env::var(urls_var) else {
                warn!("{urls_var} not set, skipping {network}");
                continue;
            };

            let rpc_urls: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(String::from)
                .collect();
            if rpc_urls.is_empty() {
                warn!("{urls_var} is empty, skipping {network}");
                continue;
            }

            networks.push(NetworkConfig {
                network,
                rpc_urls,
                poa_compat: env_bool(poa_var, poa_default)?,
            });
        }

        if networks.is_empty() {
            anyhow::bail!("at least one of ETH_RPC_URLS or BSC_RPC_URLS must be set");
        }

        Ok(Config {
            networks,
            database_path: database_path(),
            confirmation_depth: env_parsed("CONFIRMATION_DEPTH", 3)?,
            poll_interval: Duration::from_secs(env_parsed("POLL_INTERVAL_SECS", 12)?),
            backoff_base: Duration::from_secs(env_parsed("BACKOFF_BASE_SECS", 5)?),
            backoff_cap: Duration::from_secs(env_parsed("BACKOFF_CAP_SECS", 60)?),
            failure_threshold: env_parsed("FAILURE_THRESHOLD", 10)?,
        })
    }
}

/// Store location alone, for the binaries that never touch a chain.
pub fn database_path() -> String {
    dotenv::dotenv().ok();
    std::env::var("DATABASE_PATH").unwrap_or_else(|_| "tokens.db".to_string())
}

fn env_parsed<T>(var: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {var}: {raw}")),
        Err(_) => Ok(default),
    }
}

fn env_bool(var: &str, default: bool) -> Result<bool> {
    match std::env::var(var) {
        Ok(raw) => {
            parse_bool(&raw).ok_or_else(|| anyhow::anyhow!("invalid value for {var}: {raw}"))
        }
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_values_parse_in_common_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool(" YES "), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
