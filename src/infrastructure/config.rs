use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// How often the sweeper expires lapsed reservations and sends reminders
    pub sweep_interval: Duration,
    /// Days added by an extension when the request does not say
    pub default_extend_days: u32,
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://collectiva.db?mode=rwc".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            sweep_interval: Duration::from_secs(
                env::var("SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            default_extend_days: env::var("DEFAULT_EXTEND_DAYS")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(15),
            seed_demo: env::var("SEED_DEMO").is_ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            sweep_interval: Duration::from_secs(300),
            default_extend_days: 15,
            seed_demo: false,
        }
    }
}
