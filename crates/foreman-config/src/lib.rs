//! # Foreman Configuration
//!
//! Typed configuration for the foreman agent, loaded from TOML with
//! environment overrides.
//!
//! ```rust,no_run
//! use foreman_config::AgentConfig;
//!
//! # async fn example() -> Result<(), foreman_config::ConfigError> {
//! let mut config = AgentConfig::load_from_file("foreman.toml").await?;
//! config.apply_env_overrides()?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

mod components;
mod config;
mod loader;

pub use components::*;
pub use config::*;
