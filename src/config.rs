use anyhow::Context;
use serde::Deserialize;

const DEFAULT_ORIGINS: &[&str] = &[
    "https://agri-connect-mern1.vercel.app",
    "http://localhost:5173",
    "http://localhost:5174",
    "http://localhost:3000",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub allowed_origins: Vec<String>,
    /// Append internal error text to 500 responses.
    pub expose_error_details: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("STORE_BACKEND") {
            Ok(v) => parse_backend(&v)?,
            Err(_) => StoreBackend::Postgres,
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "agriconnect".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "agriconnect-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };

        let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or_else(|_| default_origins());

        let expose_error_details = std::env::var("EXPOSE_ERROR_DETAILS")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        Ok(Self {
            store,
            database_url,
            jwt,
            allowed_origins,
            expose_error_details,
        })
    }
}

pub fn default_origins() -> Vec<String> {
    DEFAULT_ORIGINS.iter().map(|s| s.to_string()).collect()
}

fn parse_backend(v: &str) -> anyhow::Result<StoreBackend> {
    match v.trim().to_ascii_lowercase().as_str() {
        "postgres" | "pg" => Ok(StoreBackend::Postgres),
        "memory" | "mem" => Ok(StoreBackend::Memory),
        other => anyhow::bail!("unknown STORE_BACKEND: {other}"),
    }
}

fn parse_origins(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(v: &str) -> bool {
    !matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_split_and_trimmed() {
        let origins = parse_origins(" http://a.test/ ,http://b.test,, ");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn backend_names() {
        assert_eq!(parse_backend("Memory").unwrap(), StoreBackend::Memory);
        assert_eq!(parse_backend("pg").unwrap(), StoreBackend::Postgres);
        assert!(parse_backend("mongo").is_err());
    }

    #[test]
    fn flags_default_to_on() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" OFF "));
    }
}
