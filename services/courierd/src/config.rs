use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub registry_url: String,
    pub geometry_url: String,
    pub upstream_timeout: Duration,
    pub node_radius_m: f64,
    pub passed_threshold_m: f64,
    pub window_max: usize,
    pub event_capacity: usize,
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            port: var_or("COURIERD_PORT", 8080),
            database_path: env::var("COURIERD_DB_PATH")
                .unwrap_or_else(|_| "data/courierd.db".to_string()),
            registry_url: env::var("COURIERD_REGISTRY_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            geometry_url: env::var("COURIERD_GEOMETRY_URL")
                .unwrap_or_else(|_| "http://localhost:8082".to_string()),
            upstream_timeout: Duration::from_secs(var_or("COURIERD_UPSTREAM_TIMEOUT_S", 30)),
            node_radius_m: var_or("COURIERD_NODE_RADIUS_M", 100.0),
            passed_threshold_m: var_or("COURIERD_PASSED_THRESHOLD_M", 50.0),
            window_max: var_or("COURIERD_WINDOW_MAX", 5),
            event_capacity: var_or("COURIERD_EVENT_CAPACITY", 1024),
        }
    }
}
