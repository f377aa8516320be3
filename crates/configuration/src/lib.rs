use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    Config, DataSettings, ExecutionSettings, RetrySettings, RiskSettings, SimulationSettings,
    StrategyConfig,
};

/// Loads the application configuration from the `config.toml` file.
///
/// This function is the primary entry point for this crate. It reads the
/// configuration file, deserializes it into our strongly-typed `Config`
/// struct, validates every strategy record, and returns it. A config that
/// deserializes but fails validation is rejected here, before any
/// component is constructed from it.
pub fn load_config() -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        // Tells the builder to look for a file named `config.toml`
        .add_source(config::File::with_name("config.toml"))
        // Environment variables override file values (e.g. MERIDIAN__DATA__CACHE_DIR).
        .add_source(config::Environment::with_prefix("MERIDIAN").separator("__"))
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
