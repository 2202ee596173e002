/// Database configuration and connection management
pub mod database;

/// Reference data loading from config.toml
pub mod seed;

/// Runtime settings from environment variables
pub mod settings;

pub use settings::Settings;
