use std::env;

/// Process-wide configuration, read once at startup. Every key is optional
/// with a documented default, mirroring the teacher's `Config::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub daily_max: i32,
    pub worker_poll_interval_ms: u64,
    pub worker_message_delay_ms: u64,
    pub visibility_timeout_secs: i32,
    pub overflow_horizon_days: i64,
    pub janitor_retention_days: i64,
    pub janitor_timeout_secs: u64,
    pub test_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            daily_max: env_parsed("DAILY_MAX", 100),
            worker_poll_interval_ms: env_parsed("WORKER_POLL_INTERVAL", 5000),
            worker_message_delay_ms: env_parsed("WORKER_MESSAGE_DELAY", 2000),
            visibility_timeout_secs: env_parsed("VISIBILITY_TIMEOUT", 30),
            overflow_horizon_days: env_parsed("OVERFLOW_HORIZON", 30),
            janitor_retention_days: env_parsed("JANITOR_RETENTION", 7),
            janitor_timeout_secs: env_parsed("JANITOR_TIMEOUT", 10),
            test_mode: env::var("TEST_MODE")
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
