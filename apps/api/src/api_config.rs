use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use ecclesia_application::DEFAULT_EXPORT_MAX_ROWS;
use ecclesia_core::AppError;
use ipnet::IpNet;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub trusted_proxies: Vec<IpNet>,
    pub expose_error_details: bool,
    pub auth_token_ttl_hours: u32,
    pub audit_export_max_rows: usize,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_non_empty_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parsed_env("API_PORT", 3001_u16)?;

        let trusted_proxies = env::var("TRUSTED_PROXIES")
            .map(|value| parse_trusted_proxies(value.as_str()))
            .unwrap_or_else(|_| Ok(Vec::new()))?;

        let expose_error_details = env::var("EXPOSE_ERROR_DETAILS")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        let auth_token_ttl_hours = parsed_env("AUTH_TOKEN_TTL_HOURS", 24_u32)?;
        if auth_token_ttl_hours == 0 {
            return Err(AppError::Validation(
                "AUTH_TOKEN_TTL_HOURS must be greater than zero".to_owned(),
            ));
        }

        let audit_export_max_rows = parsed_env("AUDIT_EXPORT_MAX_ROWS", DEFAULT_EXPORT_MAX_ROWS)?;
        if audit_export_max_rows == 0 {
            return Err(AppError::Validation(
                "AUDIT_EXPORT_MAX_ROWS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            api_host,
            api_port,
            trusted_proxies,
            expose_error_details,
            auth_token_ttl_hours,
            audit_export_max_rows,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }

    pub fn auth_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.auth_token_ttl_hours))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Parses a comma-separated list of CIDR blocks. Bare addresses are treated
/// as single-host networks.
pub fn parse_trusted_proxies(value: &str) -> Result<Vec<IpNet>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            IpNet::from_str(entry)
                .or_else(|_| IpAddr::from_str(entry).map(IpNet::from))
                .map_err(|error| {
                    AppError::Validation(format!("invalid TRUSTED_PROXIES entry '{entry}': {error}"))
                })
        })
        .collect()
}

fn parsed_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        _ => Ok(default),
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::parse_trusted_proxies;

    #[test]
    fn trusted_proxies_accept_cidrs_and_bare_addresses() {
        let parsed = parse_trusted_proxies("10.0.0.0/8, 127.0.0.1,,::1").unwrap_or_default();
        let rendered = parsed.iter().map(ToString::to_string).collect::<Vec<_>>();

        assert_eq!(rendered, vec!["10.0.0.0/8", "127.0.0.1/32", "::1/128"]);
    }

    #[test]
    fn trusted_proxies_reject_garbage() {
        assert!(parse_trusted_proxies("10.0.0.0/8,not-an-ip").is_err());
    }
}
