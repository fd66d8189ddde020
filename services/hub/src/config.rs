// Config (ambient, spec.md 9 supplement): everything the hub needs to
// start is read from the environment, mirroring the teacher's bare
// `env::var` startup style rather than introducing a config-file format.

use std::env;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_GRACE_SECS: u64 = 30;

pub struct Config {
    pub bind_addr: String,
    pub grace_period: Duration,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned());
        let grace_period_secs = env::var("SESSION_GRACE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_GRACE_SECS);
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
        Self {
            bind_addr,
            grace_period: Duration::from_secs(grace_period_secs),
            log_level,
        }
    }
}
