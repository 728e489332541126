//! Startup configuration, loaded once from the environment. Missing
//! required variables are fatal at boot; nothing is silently defaulted.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw {
            "production" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitTiers {
    pub read_per_min: u32,
    pub write_per_min: u32,
    pub admin_per_min: u32,
    pub auth_per_min: u32,
    pub expensive_per_min: u32,
}

impl Default for RateLimitTiers {
    fn default() -> Self {
        Self {
            read_per_min: 300,
            write_per_min: 60,
            admin_per_min: 30,
            auth_per_min: 10,
            expensive_per_min: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub bootstrap_api_key: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_allowed_domains: Vec<String>,
    pub webhook_dns_timeout: Duration,
    pub redis_url: Option<String>,
    pub git_sync_path: Option<String>,
    pub environment: Environment,
    pub auth_disabled: bool,
    pub rate_limits: RateLimitTiers,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let environment = Environment::parse(&std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()));
        let auth_disabled = env_opt("AUTH_DISABLED").is_some() && !environment.is_production();

        let webhook_allowed_domains = env_opt("WEBHOOK_ALLOWED_DOMAINS")
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let webhook_dns_timeout = env_opt("WEBHOOK_DNS_TIMEOUT")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        Self {
            database_url,
            database_max_connections: env_opt("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            bind_addr: env_opt("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            bootstrap_api_key: env_opt("BOOTSTRAP_API_KEY"),
            webhook_url: env_opt("WEBHOOK_URL"),
            webhook_secret: env_opt("WEBHOOK_SECRET"),
            webhook_allowed_domains,
            webhook_dns_timeout,
            redis_url: env_opt("REDIS_URL"),
            git_sync_path: env_opt("GIT_SYNC_PATH"),
            environment,
            auth_disabled,
            rate_limits: RateLimitTiers::default(),
        }
    }

    /// One-line boot summary, printed instead of a dedicated CLI surface.
    pub fn summary(&self) -> String {
        format!(
            "bind={} env={:?} auth_disabled={} webhooks={} redis={}",
            self.bind_addr,
            self.environment,
            self.auth_disabled,
            self.webhook_url.is_some(),
            self.redis_url.is_some(),
        )
    }
}
