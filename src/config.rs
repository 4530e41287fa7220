use std::collections::BTreeMap;
use std::env;

use anyhow::{Context, Result, anyhow, bail};
use dotenvy::dotenv;

use crate::model::leave_balance::LeaveType;

pub const DEFAULT_ALLOTMENTS: &str = "casual=10,privilege=15,medical=90,other=0";

#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Balances provisioned when onboarding omits them.
    pub default_allotments: BTreeMap<LeaveType, u32>,
    pub bootstrap_admin: Option<BootstrapAdmin>,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} must be set"));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bootstrap_admin = match (
            lookup("BOOTSTRAP_ADMIN_USERNAME"),
            lookup("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            _ => bail!("BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_var("ACCESS_TOKEN_TTL", &or_default("ACCESS_TOKEN_TTL", "900"))?, // default 15 min

            rate_login_per_min: parse_var("RATE_LOGIN_PER_MIN", &or_default("RATE_LOGIN_PER_MIN", "60"))?,
            rate_protected_per_min: parse_var(
                "RATE_PROTECTED_PER_MIN",
                &or_default("RATE_PROTECTED_PER_MIN", "1000"),
            )?,

            api_prefix: or_default("API_PREFIX", "/api/v1"),

            default_allotments: parse_allotments(&or_default(
                "DEFAULT_LEAVE_ALLOTMENTS",
                DEFAULT_ALLOTMENTS,
            ))
            .context("DEFAULT_LEAVE_ALLOTMENTS")?,
            bootstrap_admin,

            log_dir: or_default("LOG_DIR", "logs"),
            log_level: parse_var("LOG_LEVEL", &or_default("LOG_LEVEL", "debug"))?,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("{key}: cannot parse `{raw}`: {e}"))
}

/// Parses `casual=10,medical=90` into a leave type → days map.
pub fn parse_allotments(raw: &str) -> Result<BTreeMap<LeaveType, u32>> {
    let mut allotments = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, days) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("expected `type=days`, got `{entry}`"))?;
        let leave_type = LeaveType::parse(name)?;
        let days: u32 = days
            .trim()
            .parse()
            .with_context(|| format!("invalid day count for `{leave_type}`"))?;
        if allotments.insert(leave_type.clone(), days).is_some() {
            bail!("leave type `{leave_type}` listed twice");
        }
    }
    if allotments.is_empty() {
        bail!("at least one leave type is required");
    }
    Ok(allotments)
}
