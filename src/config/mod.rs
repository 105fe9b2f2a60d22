mod settings;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use url::Url;

use crate::utils::error::{RelayError, Result};
use settings::PartialSettings;

pub use settings::{
    BrokerSettings, DEFAULT_QUEUE, LogSettings, RelaySettings, RetrySettings, ServerSettings,
    Settings, SinkSettings,
};

pub const DEFAULT_FILE: &str = "config/default";

/// Loads the configuration from `config/default.*` and the environment,
/// merges it over the defaults and validates the result.
pub fn load_config() -> Result<Settings> {
    load_config_from(DEFAULT_FILE)
}

/// Same as [`load_config`] with an explicit file; the file is optional.
pub fn load_config_from(file: &str) -> Result<Settings> {
    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = apply_legacy_env(builder)?.build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    validate(partial.merge_over(Settings::default()))
}

/// Flat variables understood by the deployed worker. They win over every
/// other source. Empty or unparsable values are ignored.
fn apply_legacy_env(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>> {
    let builder = builder
        .set_override_option("broker.url", legacy_var("RABBITMQ_URL"))?
        .set_override_option("broker.queue", legacy_var("RABBITMQ_QUEUE"))?
        .set_override_option("sink.base_url", legacy_var("NEST_API_URL"))?
        .set_override_option(
            "retry.max_retries",
            legacy_var("WORKER_RETRY_ATTEMPTS")
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .map(u64::from),
        )?
        .set_override_option(
            "retry.backoff_base_ms",
            legacy_var("WORKER_RETRY_BACKOFF_MS").and_then(|v| v.parse::<u64>().ok()),
        )?
        .set_override_option("log.level", legacy_var("LOG_LEVEL"))?;
    Ok(builder)
}

fn legacy_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Normalizes and checks a merged configuration.
pub fn validate(mut settings: Settings) -> Result<Settings> {
    let url = normalize_broker_url(&settings.broker.url);
    if !(url.starts_with("amqp://") || url.starts_with("amqps://")) {
        return Err(RelayError::InvalidSetting {
            key: "broker.url",
            reason: "must start with amqp:// or amqps://".to_string(),
        });
    }
    settings.broker.url = url;

    let queue = settings.broker.queue.trim();
    settings.broker.queue = if queue.is_empty() {
        DEFAULT_QUEUE.to_string()
    } else {
        queue.to_string()
    };

    if settings.retry.max_retries == 0 {
        return Err(RelayError::InvalidSetting {
            key: "retry.max_retries",
            reason: "must be at least 1".to_string(),
        });
    }
    if settings.retry.backoff_base_ms > settings.retry.backoff_max_ms {
        return Err(RelayError::InvalidSetting {
            key: "retry.backoff_base_ms",
            reason: format!(
                "{} exceeds retry.backoff_max_ms ({})",
                settings.retry.backoff_base_ms, settings.retry.backoff_max_ms
            ),
        });
    }

    require_positive("broker.reconnect_delay_ms", settings.broker.reconnect_delay_ms)?;
    require_positive(
        "broker.consume_retry_delay_ms",
        settings.broker.consume_retry_delay_ms,
    )?;
    require_positive("sink.timeout_ms", settings.sink.timeout_ms)?;

    let base = settings.sink.base_url.trim();
    match Url::parse(base) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => {
            return Err(RelayError::InvalidSetting {
                key: "sink.base_url",
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        Err(err) => {
            return Err(RelayError::InvalidSetting {
                key: "sink.base_url",
                reason: err.to_string(),
            });
        }
    }
    settings.sink.base_url = base.to_string();

    Ok(settings)
}

fn require_positive(key: &'static str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(RelayError::InvalidSetting {
            key,
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(())
}

/// Strips whitespace and the quotes left behind by some `.env` editors.
fn normalize_broker_url(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// `url` with any password replaced by `****`.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                // only fails for cannot-be-a-base URLs, which have no password
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => "****".to_string(),
    }
}

impl Settings {
    /// Copy safe to print or log.
    pub fn redacted(&self) -> Settings {
        let mut copy = self.clone();
        copy.broker.url = redact_url(&self.broker.url);
        copy
    }
}
