use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub reservations: ReservationRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationRules {
    /// How long a pending reservation lives before the sweeper expires it.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_ttl_hours() -> i64 {
    24
}

fn default_sweep_interval() -> u64 {
    60
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file is optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `PARKLINE__DATABASE__URL=...`
            .add_source(config::Environment::with_prefix("PARKLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
