use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const BIND_ADDR: &str = "HASHVAULT_BIND_ADDR";
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    // Block explorer (token transfers and balances)
    pub const EXPLORER_API_URL: &str = "EXPLORER_API_URL";
    pub const EXPLORER_API_KEY: &str = "EXPLORER_API_KEY";
    pub const TOKEN_CONTRACT_ADDRESS: &str = "TOKEN_CONTRACT_ADDRESS";
    pub const TOKEN_SYMBOL: &str = "TOKEN_SYMBOL";
    pub const TOKEN_DECIMALS: &str = "TOKEN_DECIMALS";
    // JSON-RPC node (native balance and transfers)
    pub const RPC_URL: &str = "RPC_URL";
    pub const CHAIN_ID: &str = "CHAIN_ID";
    // Custodial signing
    pub const KEYSTORE_PATH: &str = "KEYSTORE_PATH";
    pub const HOT_WALLET_ID: &str = "HOT_WALLET_ID";
    pub const GAS_TOPUP_THRESHOLD: &str = "GAS_TOPUP_THRESHOLD";
    pub const GAS_TOPUP_AMOUNT: &str = "GAS_TOPUP_AMOUNT";
    // Timeouts
    pub const TICK_TIMEOUT_SECS: &str = "TICK_TIMEOUT_SECS";
    pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
    pub const RECEIPT_TIMEOUT_SECS: &str = "RECEIPT_TIMEOUT_SECS";
    pub const REFERRAL_MAX_HOPS: &str = "REFERRAL_MAX_HOPS";
}

/// Default values
pub mod defaults {
    pub const BIND_ADDR: &str = "127.0.0.1";
    pub const PORT: u16 = 8080;
    pub const DATABASE_URL: &str = "./.db/hashvault.db";
    pub const TOKEN_SYMBOL: &str = "USDT";
    pub const TOKEN_DECIMALS: u32 = 18;
    pub const CHAIN_ID: u64 = 56;
    pub const KEYSTORE_PATH: &str = "./.keys/keystore.json";
    pub const GAS_TOPUP_THRESHOLD: f64 = 0.0002;
    pub const GAS_TOPUP_AMOUNT: f64 = 0.001;
    pub const TICK_TIMEOUT_SECS: u64 = 300;
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
    pub const RECEIPT_TIMEOUT_SECS: u64 = 120;
    pub const REFERRAL_MAX_HOPS: usize = 32;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, value: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{} must be set", var),
            ConfigError::Invalid { var, value, reason } => {
                write!(f, "{}={:?} is invalid: {}", var, value, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: String,
    pub explorer_api_url: String,
    pub explorer_api_key: String,
    pub token_contract_address: String,
    pub token_symbol: String,
    pub token_decimals: u32,
    pub rpc_url: String,
    pub chain_id: u64,
    pub keystore_path: String,
    /// Key store identifier of the company wallet that funds gas top-ups
    pub hot_wallet_id: String,
    pub gas_topup_threshold: f64,
    pub gas_topup_amount: f64,
    pub tick_timeout: Duration,
    pub http_timeout: Duration,
    pub receipt_timeout: Duration,
    pub referral_max_hops: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build from an arbitrary variable source. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let token_decimals: u32 = parse_or(get(env_vars::TOKEN_DECIMALS), env_vars::TOKEN_DECIMALS, defaults::TOKEN_DECIMALS)?;
        if token_decimals > 77 {
            return Err(ConfigError::Invalid {
                var: env_vars::TOKEN_DECIMALS,
                value: token_decimals.to_string(),
                reason: "10^decimals must fit in 256 bits".to_string(),
            });
        }

        let gas_topup_threshold: f64 =
            parse_or(get(env_vars::GAS_TOPUP_THRESHOLD), env_vars::GAS_TOPUP_THRESHOLD, defaults::GAS_TOPUP_THRESHOLD)?;
        let gas_topup_amount: f64 =
            parse_or(get(env_vars::GAS_TOPUP_AMOUNT), env_vars::GAS_TOPUP_AMOUNT, defaults::GAS_TOPUP_AMOUNT)?;
        for (var, value) in [
            (env_vars::GAS_TOPUP_THRESHOLD, gas_topup_threshold),
            (env_vars::GAS_TOPUP_AMOUNT, gas_topup_amount),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: value.to_string(),
                    reason: "must be a non-negative number".to_string(),
                });
            }
        }

        let positive = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            let value: u64 = parse_or(get(var), var, default)?;
            if value == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: value.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(value)
        };
        let tick_timeout_secs = positive(env_vars::TICK_TIMEOUT_SECS, defaults::TICK_TIMEOUT_SECS)?;
        let http_timeout_secs = positive(env_vars::HTTP_TIMEOUT_SECS, defaults::HTTP_TIMEOUT_SECS)?;
        let receipt_timeout_secs = positive(env_vars::RECEIPT_TIMEOUT_SECS, defaults::RECEIPT_TIMEOUT_SECS)?;
        let referral_max_hops = positive(env_vars::REFERRAL_MAX_HOPS, defaults::REFERRAL_MAX_HOPS as u64)? as usize;

        Ok(Self {
            bind_addr: get(env_vars::BIND_ADDR).unwrap_or_else(|| defaults::BIND_ADDR.to_string()),
            port: parse_or(get(env_vars::PORT), env_vars::PORT, defaults::PORT)?,
            database_url: get(env_vars::DATABASE_URL).unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            explorer_api_url: required(env_vars::EXPLORER_API_URL)?,
            explorer_api_key: get(env_vars::EXPLORER_API_KEY).unwrap_or_default(),
            token_contract_address: required(env_vars::TOKEN_CONTRACT_ADDRESS)?,
            token_symbol: get(env_vars::TOKEN_SYMBOL).unwrap_or_else(|| defaults::TOKEN_SYMBOL.to_string()),
            token_decimals,
            rpc_url: required(env_vars::RPC_URL)?,
            chain_id: parse_or(get(env_vars::CHAIN_ID), env_vars::CHAIN_ID, defaults::CHAIN_ID)?,
            keystore_path: get(env_vars::KEYSTORE_PATH).unwrap_or_else(|| defaults::KEYSTORE_PATH.to_string()),
            hot_wallet_id: required(env_vars::HOT_WALLET_ID)?,
            gas_topup_threshold,
            gas_topup_amount,
            tick_timeout: Duration::from_secs(tick_timeout_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            receipt_timeout: Duration::from_secs(receipt_timeout_secs),
            referral_max_hops,
        })
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    fn required_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            (env_vars::EXPLORER_API_URL, "https://api.bscscan.com/api"),
            (env_vars::TOKEN_CONTRACT_ADDRESS, "0x55d398326f99059ff775485246999027b3197955"),
            (env_vars::RPC_URL, "https://bsc-dataseed.binance.org"),
            (env_vars::HOT_WALLET_ID, "hot"),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&required_vars())).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.token_decimals, 18);
        assert_eq!(config.chain_id, 56);
        assert_eq!(config.gas_topup_threshold, 0.0002);
        assert_eq!(config.gas_topup_amount, 0.001);
        assert_eq!(config.tick_timeout, Duration::from_secs(300));
        assert_eq!(config.receipt_timeout, Duration::from_secs(120));
        assert_eq!(config.referral_max_hops, 32);
        assert!(config.explorer_api_key.is_empty());
    }

    #[test]
    fn test_missing_required_is_error() {
        let mut vars = required_vars();
        vars.retain(|(k, _)| *k != env_vars::RPC_URL);
        let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(env_vars::RPC_URL));

        // Blank counts as missing
        let mut vars = required_vars();
        vars.push((env_vars::HOT_WALLET_ID, "  "));
        vars.retain(|(k, v)| *k != env_vars::HOT_WALLET_ID || v.trim().is_empty());
        let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(env_vars::HOT_WALLET_ID));
    }

    #[test]
    fn test_malformed_values_rejected() {
        let mut vars = required_vars();
        vars.push((env_vars::PORT, "eighty"));
        let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == env_vars::PORT));

        let mut vars = required_vars();
        vars.push((env_vars::GAS_TOPUP_AMOUNT, "-1"));
        assert!(Config::from_lookup(lookup_from(&vars)).is_err());

        let mut vars = required_vars();
        vars.push((env_vars::TOKEN_DECIMALS, "78"));
        assert!(Config::from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn test_zero_timeouts_and_hops_rejected() {
        for var in [
            env_vars::TICK_TIMEOUT_SECS,
            env_vars::HTTP_TIMEOUT_SECS,
            env_vars::RECEIPT_TIMEOUT_SECS,
            env_vars::REFERRAL_MAX_HOPS,
        ] {
            let mut vars = required_vars();
            vars.push((var, "0"));
            let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { var: v, .. } if v == var), "{} accepted 0", var);
        }

        let mut vars = required_vars();
        vars.push((env_vars::REFERRAL_MAX_HOPS, "1"));
        assert_eq!(Config::from_lookup(lookup_from(&vars)).unwrap().referral_max_hops, 1);
    }
}
