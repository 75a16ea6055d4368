//! [`Config`]-related definitions.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// Maximum time to wait for a property, booking or payment lock.
    #[default(time::Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub lock_timeout: time::Duration,

    /// Time-to-live of the cached property snapshots and calendars.
    #[default(time::Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub cache_ttl: time::Duration,

    /// Maximum number of retried payments of a single booking.
    #[default(3)]
    pub payment_max_retries: u16,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            lock_timeout,
            cache_ttl,
            payment_max_retries,
            tasks: Tasks {
                retry_payment_events,
            },
        } = value;
        Self {
            lock_timeout,
            cache_ttl,
            payment_max_retries,
            retry_payment_events:
                service::task::retry_payment_events::Config {
                    interval: retry_payment_events.interval,
                    max_attempts: retry_payment_events.max_attempts,
                },
        }
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `RetryPaymentEvents` task configuration.
    pub retry_payment_events: RetryTask,
}

/// Configuration of a task retrying failed payment events.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct RetryTask {
    /// Delay before another attempt.
    #[default(time::Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,

    /// Maximum number of attempts, including the first one.
    #[default(5)]
    pub max_attempts: u8,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use config::{builder::DefaultState, ConfigBuilder, File, FileFormat};

    use super::Config;

    fn parse(toml: &str) -> Config {
        ConfigBuilder::<DefaultState>::default()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn fills_missing_fields_with_defaults() {
        let conf = parse("[server]\nport = 9000\n");

        assert_eq!(conf.server.port, 9000);
        assert_eq!(conf.server.host, "0.0.0.0");
        assert_eq!(conf.service.lock_timeout, Duration::from_secs(5));
        assert_eq!(conf.service.payment_max_retries, 3);
        assert_eq!(conf.postgres.port, 5432);
    }

    #[test]
    fn parses_human_durations() {
        let conf = parse(
            "[service]\n\
             lock_timeout = \"250ms\"\n\
             cache_ttl = \"1m\"\n\
             [service.tasks.retry_payment_events]\n\
             interval = \"3s\"\n\
             max_attempts = 2\n",
        );

        let service = service::Config::from(conf.service);
        assert_eq!(service.lock_timeout, Duration::from_millis(250));
        assert_eq!(service.cache_ttl, Duration::from_secs(60));
        assert_eq!(
            service.retry_payment_events.interval,
            Duration::from_secs(3),
        );
        assert_eq!(service.retry_payment_events.max_attempts, 2);
    }
}
