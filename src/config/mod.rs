mod settings;


use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, LoggingSettings, ServerSettings, Settings};

/// Prefix for environment overrides, e.g. `LINESUB__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "LINESUB";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the server, broker and logging configurations
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let server = partial.server.as_ref();
    let broker = partial.broker.as_ref();
    let logging = partial.logging.as_ref();

    Settings {
        server: ServerSettings {
            host: server
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server.and_then(|s| s.port).unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            max_connections: broker
                .and_then(|b| b.max_connections)
                .unwrap_or(default.broker.max_connections),
            read_timeout_ms: broker
                .and_then(|b| b.read_timeout_ms)
                .unwrap_or(default.broker.read_timeout_ms),
            max_line_bytes: broker
                .and_then(|b| b.max_line_bytes)
                .unwrap_or(default.broker.max_line_bytes),
            export_dir: broker
                .and_then(|b| b.export_dir.clone())
                .unwrap_or(default.broker.export_dir),
        },
        logging: LoggingSettings {
            level: logging
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    }
}
