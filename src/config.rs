// src/config.rs

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::plans::{Plan, PlanCatalog};

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env: Environment,
    pub bind_addr: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub frontend_url: String,
    pub stripe_key: String,
    pub stripe_sign_key: String,
    pub stripe_api_base: String,
    pub plans: PlanCatalog,
    /// Falls back to the superuser token when unset.
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub superuser_token_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let env = match get("ENV").as_deref() {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        };

        let bcrypt_cost: u32 = parse_or("BCRYPT_COST", get("BCRYPT_COST"), bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: "must be between 4 and 31".into(),
            });
        }

        let token_ttl_hours: i64 = parse_or("TOKEN_TTL_HOURS", get("TOKEN_TTL_HOURS"), 24)?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
                reason: "must be positive".into(),
            });
        }

        let plans = PlanCatalog::new([
            (Plan::Starter, get("STRIPE_PLAN_STARTER")),
            (Plan::Pro, get("STRIPE_PLAN_PRO")),
            (Plan::Plus, get("STRIPE_PLAN_PLUS")),
        ]);

        Ok(Self {
            env,
            bind_addr: get_or("BIND_ADDR", "0.0.0.0"),
            port: parse_or("PORT", get("PORT"), 8090)?,
            database_url: get("DATABASE_URL"),
            frontend_url: get_or("FRONTEND_URL", "http://localhost:5173")
                .trim_end_matches('/')
                .to_string(),
            stripe_key: get_or("STRIPE_KEY", ""),
            stripe_sign_key: get_or("STRIPE_SIGN_KEY", ""),
            stripe_api_base: get_or("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            plans,
            jwt_secret: get("JWT_SECRET"),
            token_ttl_hours,
            bcrypt_cost,
            superuser_token_path: PathBuf::from(get_or("SUPERUSER_TOKEN_PATH", ".superusertoken")),
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.port, 8090);
        assert_eq!(config.frontend_url, "http://localhost:5173");
        assert_eq!(config.stripe_api_base, DEFAULT_STRIPE_API_BASE);
        assert_eq!(config.token_ttl_hours, 24);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.database_url.is_none());
        assert!(config.plans.is_empty());
    }

    #[test]
    fn plan_prices_come_from_env() {
        let config = config_from(&[
            ("STRIPE_PLAN_STARTER", "price_s"),
            ("STRIPE_PLAN_PRO", "price_p"),
            ("STRIPE_PLAN_PLUS", ""),
        ])
        .unwrap();

        assert_eq!(config.plans.price_for(Plan::Pro), Some("price_p"));
        assert_eq!(config.plans.plan_for_price("price_s"), Some(Plan::Starter));
        assert_eq!(config.plans.price_for(Plan::Plus), None);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("BCRYPT_COST", "3")]).is_err());
        assert!(config_from(&[("TOKEN_TTL_HOURS", "0")]).is_err());
    }

    #[test]
    fn production_flag() {
        let config = config_from(&[("ENV", "production")]).unwrap();
        assert!(config.env.is_production());
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let config = config_from(&[("FRONTEND_URL", "https://pdnode.com/")]).unwrap();
        assert_eq!(config.frontend_url, "https://pdnode.com");
    }
}
