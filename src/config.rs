//! Runtime configuration (spec §6, §9).
//!
//! Grounded on the teacher's `storage::Config::get`, which reads
//! `CONWAY_SSID`/`CONWAY_HOST`/`CONWAY_PORT`/etc. via `option_env!` at
//! compile time. A hosted process has no flash image to bake values into,
//! so this reads the equivalent variables from the environment at startup
//! instead — same variable-per-concern shape, same fallback defaults,
//! resolved once at process start rather than at compile time. The
//! persistent key-value store the rest of the node's configuration lives
//! in is an external collaborator (spec §1 Non-goals) and isn't modeled
//! here at all.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub controller_host: String,
    pub controller_port: u16,
    pub listen_addr: String,
    pub listen_port: u16,
    pub door_one_momentary_ms: u64,
    pub door_two_momentary_ms: u64,
    pub heartbeat_interval: Duration,
    pub log_retry_interval: Duration,
    pub scheduler_tick_interval: Duration,
}

impl Config {
    /// Resolves configuration from the environment, falling back to the
    /// same defaults the teacher's firmware ships with for an
    /// out-of-the-box bench setup.
    pub fn from_env() -> Self {
        Self {
            controller_host: env::var("ACCESS_CONTROLLER_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            controller_port: env_parse("ACCESS_CONTROLLER_PORT", 8080),
            listen_addr: env::var("ACCESS_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            listen_port: env_parse("ACCESS_LISTEN_PORT", 8000),
            door_one_momentary_ms: env_parse("ACCESS_DOOR1_MOMENTARY_MS", 5_000),
            door_two_momentary_ms: env_parse("ACCESS_DOOR2_MOMENTARY_MS", 5_000),
            heartbeat_interval: Duration::from_secs(env_parse("ACCESS_HEARTBEAT_SECS", 60)),
            log_retry_interval: Duration::from_secs(env_parse("ACCESS_LOG_RETRY_SECS", 5)),
            scheduler_tick_interval: Duration::from_millis(env_parse(
                "ACCESS_SCHEDULER_TICK_MS",
                1_000,
            )),
        }
    }

    pub fn controller_base_url(&self) -> String {
        format!("http://{}:{}", self.controller_host, self.controller_port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
