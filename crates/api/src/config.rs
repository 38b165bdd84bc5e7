//! Process configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `JWT_SECRET` | required |
//! | `ACCESS_TOKEN_TTL_SECS` | `900` (max one day) |
//! | `REFRESH_TOKEN_TTL_SECS` | `604800` (max 365 days) |
//! | `DATABASE_URL` | unset: in-memory stores |
//! | `ARGON2_MEMORY_KIB` / `ARGON2_ITERATIONS` / `ARGON2_PARALLELISM` | `19456` / `2` / `1` |
//! | `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` / `GOOGLE_REDIRECT_BASE` | unset: federation off |
//! | `FEDERATION_ADMIN_POLICY` | `disabled` (`allowlist`, `any`) |
//! | `FEDERATION_ADMIN_ALLOWLIST` | empty, comma separated |
//! | `BOOTSTRAP_ADMIN_EMAIL` / `BOOTSTRAP_ADMIN_PASSWORD` | unset |
//! | `LOG_FORMAT` | `json` (`pretty`) |

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use storefront_auth::{HashingParams, max_access_ttl};
use storefront_infra::{AdminFederation, GoogleConfig, max_refresh_ttl};
use storefront_observability::LogFormat;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub database_url: Option<String>,
    pub hashing: HashingParams,
    pub google: Option<GoogleConfig>,
    pub admin_federation: AdminFederation,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub log_format: LogFormat,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("database", &self.database_url.as_ref().map(|_| "postgres"))
            .field("hashing", &self.hashing)
            .field("google", &self.google.is_some())
            .field("admin_federation", &self.admin_federation)
            .field("bootstrap_admin", &self.bootstrap_admin.as_ref().map(|b| &b.email))
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = parse_or(&var, "BIND_ADDR", "0.0.0.0:8080".parse::<SocketAddr>().ok())?;
        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let access_ttl = ttl_secs(&var, "ACCESS_TOKEN_TTL_SECS", 900, max_access_ttl())?;
        let refresh_ttl = ttl_secs(&var, "REFRESH_TOKEN_TTL_SECS", 604_800, max_refresh_ttl())?;

        let hashing = HashingParams {
            memory_kib: parse_or(&var, "ARGON2_MEMORY_KIB", Some(19_456))?,
            iterations: parse_or(&var, "ARGON2_ITERATIONS", Some(2))?,
            parallelism: parse_or(&var, "ARGON2_PARALLELISM", Some(1))?,
        };

        let google = match (
            var("GOOGLE_CLIENT_ID"),
            var("GOOGLE_CLIENT_SECRET"),
            var("GOOGLE_REDIRECT_BASE"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_base)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_base,
            }),
            _ => None,
        };

        let admin_federation = match var("FEDERATION_ADMIN_POLICY").as_deref().map(str::trim) {
            None | Some("disabled") => AdminFederation::Disabled,
            Some("any") => AdminFederation::AnyVerified,
            Some("allowlist") => AdminFederation::AllowList(
                var("FEDERATION_ADMIN_ALLOWLIST")
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            Some(other) => {
                return Err(invalid(
                    "FEDERATION_ADMIN_POLICY",
                    other,
                    "expected 'disabled', 'allowlist' or 'any'",
                ));
            }
        };

        let bootstrap_admin = match (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("BOOTSTRAP_ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("BOOTSTRAP_ADMIN_EMAIL")),
        };

        let log_format = match var("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw
                .parse()
                .map_err(|e: storefront_observability::UnknownLogFormat| invalid("LOG_FORMAT", &raw, e))?,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            access_ttl,
            refresh_ttl,
            database_url: var("DATABASE_URL"),
            hashing,
            google,
            admin_federation,
            bootstrap_admin,
            log_format,
        })
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Whole seconds in `1..=max`.
fn ttl_secs(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: i64,
    max: Duration,
) -> Result<Duration, ConfigError> {
    let secs: i64 = parse_or(var, name, Some(default))?;
    if secs < 1 || secs > max.num_seconds() {
        return Err(invalid(name, secs, format!("must be between 1 and {}", max.num_seconds())));
    }
    Duration::try_seconds(secs).ok_or_else(|| invalid(name, secs, "out of range"))
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(name, &raw, e)),
        None => default.ok_or(ConfigError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_with_only_secret() {
        let cfg = config(&[("JWT_SECRET", "s")]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.access_ttl, Duration::minutes(15));
        assert_eq!(cfg.refresh_ttl, Duration::days(7));
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.google, None);
        assert_eq!(cfg.admin_federation, AdminFederation::Disabled);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.hashing.memory_kib, 19_456);
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("JWT_SECRET"));
        assert_eq!(
            config(&[("JWT_SECRET", "  ")]).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            config(&[("JWT_SECRET", "s"), ("ACCESS_TOKEN_TTL_SECS", "soon")]),
            Err(ConfigError::Invalid { name: "ACCESS_TOKEN_TTL_SECS", .. })
        ));
        assert!(matches!(
            config(&[("JWT_SECRET", "s"), ("ACCESS_TOKEN_TTL_SECS", "0")]),
            Err(ConfigError::Invalid { name: "ACCESS_TOKEN_TTL_SECS", .. })
        ));
    }

    #[test]
    fn rejects_ttls_beyond_the_cap() {
        assert!(matches!(
            config(&[("JWT_SECRET", "s"), ("ACCESS_TOKEN_TTL_SECS", "1000000000000000")]),
            Err(ConfigError::Invalid { name: "ACCESS_TOKEN_TTL_SECS", .. })
        ));
        assert!(matches!(
            config(&[("JWT_SECRET", "s"), ("REFRESH_TOKEN_TTL_SECS", "9223372036854775807")]),
            Err(ConfigError::Invalid { name: "REFRESH_TOKEN_TTL_SECS", .. })
        ));
        assert!(matches!(
            config(&[("JWT_SECRET", "s"), ("REFRESH_TOKEN_TTL_SECS", "-5")]),
            Err(ConfigError::Invalid { name: "REFRESH_TOKEN_TTL_SECS", .. })
        ));

        let cfg = config(&[("JWT_SECRET", "s"), ("ACCESS_TOKEN_TTL_SECS", "86400")]).unwrap();
        assert_eq!(cfg.access_ttl, max_access_ttl());
    }

    #[test]
    fn google_needs_all_three() {
        let partial = config(&[("JWT_SECRET", "s"), ("GOOGLE_CLIENT_ID", "id")]).unwrap();
        assert_eq!(partial.google, None);

        let full = config(&[
            ("JWT_SECRET", "s"),
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_REDIRECT_BASE", "http://localhost/cb"),
        ])
        .unwrap();
        assert_eq!(full.google.map(|g| g.client_id), Some("id".to_string()));
    }

    #[test]
    fn admin_allowlist() {
        let cfg = config(&[
            ("JWT_SECRET", "s"),
            ("FEDERATION_ADMIN_POLICY", "allowlist"),
            ("FEDERATION_ADMIN_ALLOWLIST", "a@x.com, b@x.com,"),
        ])
        .unwrap();
        assert_eq!(
            cfg.admin_federation,
            AdminFederation::AllowList(vec!["a@x.com".to_string(), "b@x.com".to_string()])
        );
        assert!(config(&[("JWT_SECRET", "s"), ("FEDERATION_ADMIN_POLICY", "everyone")]).is_err());
    }

    #[test]
    fn bootstrap_admin_needs_both_values() {
        assert_eq!(
            config(&[("JWT_SECRET", "s"), ("BOOTSTRAP_ADMIN_EMAIL", "a@x.com")]).unwrap_err(),
            ConfigError::Missing("BOOTSTRAP_ADMIN_PASSWORD")
        );
    }
}
