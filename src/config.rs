use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_env() -> Self {
        match std::env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub migrations_dir: PathBuf,
    pub jwt: JwtConfig,
    pub seed: SeedConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "sunshare".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "sunshare-admin".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let seed = SeedConfig {
            admin_email: std::env::var("SEED_ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@sunshare.local".into()),
            admin_password: std::env::var("SEED_ADMIN_PASSWORD")
                .unwrap_or_else(|_| "ChangeMe123!".into()),
        };
        Ok(Self {
            environment: Environment::from_env(),
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            backend_url: std::env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            migrations_dir: std::env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./migrations")),
            jwt,
            seed,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_missing_or_garbage() {
        std::env::remove_var("SUNSHARE_TEST_MISSING");
        assert_eq!(env_or("SUNSHARE_TEST_MISSING", 42u16), 42);

        std::env::set_var("SUNSHARE_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("SUNSHARE_TEST_GARBAGE", 7i64), 7);

        std::env::set_var("SUNSHARE_TEST_NUMBER", "15");
        assert_eq!(env_or("SUNSHARE_TEST_NUMBER", 7i64), 15);
    }
}
