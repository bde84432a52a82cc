mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LoggingSettings, ServerSettings, Settings};

/// Prefix for environment overrides, e.g. `HUBSUB_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "HUBSUB";

const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Loads the configuration from `config/default.*` (if present) and
/// `HUBSUB_`-prefixed environment variables, merged over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load(DEFAULT_CONFIG_FILE, false)
}

/// Same as [`load_config`] with an explicit file, which must exist. The
/// extension picks the format.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    load(path, true)
}

fn load(path: &str, required: bool) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = partial.merge_over(Settings::default());
    settings.broker.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests;
