use std::{env, fmt::Display, str::FromStr, time::Duration};

use gateway_tools::{DirectoryConfig, GatewayConfig};
use log::*;
use payment_engine::worker_pool::PoolConfig;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8083;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/payments.db";
const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_VALIDATION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_STALE_PAYMENT_AGE: Duration = Duration::from_secs(3600);
const DEFAULT_READ_WORKERS: usize = 8;
const DEFAULT_READ_QUEUE_MULTIPLIER: usize = 2;
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub gateway: GatewayConfig,
    pub directory: DirectoryConfig,
    /// How long a checkout may wait for both validation replies before it is abandoned.
    pub validation_timeout: Duration,
    pub validation_sweep_interval: Duration,
    /// How often pending payments are checked against their gateway expiry time.
    pub expiry_sweep_interval: Duration,
    /// Pending payments older than this are re-checked with the gateway on every expiry sweep.
    pub stale_payment_age: Duration,
    pub read_pool: PoolConfig,
    /// The deadline for a pooled read, measured from when it is submitted.
    pub read_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gateway: GatewayConfig::default(),
            directory: DirectoryConfig::default(),
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
            validation_sweep_interval: DEFAULT_VALIDATION_SWEEP_INTERVAL,
            expiry_sweep_interval: DEFAULT_EXPIRY_SWEEP_INTERVAL,
            stale_payment_age: DEFAULT_STALE_PAYMENT_AGE,
            read_pool: PoolConfig { workers: DEFAULT_READ_WORKERS, queue_multiplier: DEFAULT_READ_QUEUE_MULTIPLIER },
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    /// Reads the configuration from `CPG_*` environment variables. Never fails: anything missing or invalid is logged
    /// and replaced by its default.
    pub fn from_env_or_default() -> Self {
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = parse_env("CPG_PORT", DEFAULT_CPG_PORT);
        let database_url = env::var("CPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ CPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        let directory = DirectoryConfig::new_from_env_or_default();
        let validation_timeout = seconds_from_env("CPG_VALIDATION_TIMEOUT", DEFAULT_VALIDATION_TIMEOUT);
        let validation_sweep_interval =
            seconds_from_env("CPG_VALIDATION_SWEEP_INTERVAL", DEFAULT_VALIDATION_SWEEP_INTERVAL);
        let expiry_sweep_interval = seconds_from_env("CPG_EXPIRY_SWEEP_INTERVAL", DEFAULT_EXPIRY_SWEEP_INTERVAL);
        let stale_payment_age = seconds_from_env("CPG_STALE_PAYMENT_AGE", DEFAULT_STALE_PAYMENT_AGE);
        let read_pool = PoolConfig {
            workers: parse_env("CPG_READ_WORKERS", DEFAULT_READ_WORKERS).max(1),
            queue_multiplier: parse_env("CPG_READ_QUEUE_MULTIPLIER", DEFAULT_READ_QUEUE_MULTIPLIER).max(1),
        };
        let read_timeout = seconds_from_env("CPG_READ_TIMEOUT", DEFAULT_READ_TIMEOUT);
        info!(
            "🪛️ Gateway environment: {}. Read pool: {} workers, queue of {}.",
            gateway.environment,
            read_pool.workers,
            read_pool.queue_capacity()
        );
        Self {
            host,
            port,
            database_url,
            gateway,
            directory,
            validation_timeout,
            validation_sweep_interval,
            expiry_sweep_interval,
            stale_payment_age,
            read_pool,
            read_timeout,
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

fn seconds_from_env(name: &str, default: Duration) -> Duration {
    let secs = parse_env(name, default.as_secs());
    if secs == 0 {
        warn!("🪛️ {name} cannot be zero. Using the default of {}s.", default.as_secs());
        return default;
    }
    Duration::from_secs(secs)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8083);
        assert_eq!(config.validation_timeout, Duration::from_secs(600));
        assert_eq!(config.read_pool.queue_capacity(), 16);
    }

    #[test]
    fn invalid_values_fall_back() {
        env::set_var("CPG_TEST_PORT_VALUE", "not-a-port");
        assert_eq!(parse_env("CPG_TEST_PORT_VALUE", 8083u16), 8083);
        env::set_var("CPG_TEST_INTERVAL", "0");
        assert_eq!(seconds_from_env("CPG_TEST_INTERVAL", Duration::from_secs(60)), Duration::from_secs(60));
        env::set_var("CPG_TEST_INTERVAL_OK", "15");
        assert_eq!(seconds_from_env("CPG_TEST_INTERVAL_OK", Duration::from_secs(60)), Duration::from_secs(15));
    }
}
