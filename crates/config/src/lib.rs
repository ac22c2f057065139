//! Configuration loading and env substitution for the trigger scheduler.
//!
//! Config file: `jobtick.toml`, searched in `./` then `~/.config/jobtick/`.
//! Supports `${ENV_VAR}` substitution in all string values and `JOBTICK_*`
//! environment overrides for credentials.

pub mod loader;
pub mod schema;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config, save_config},
    schema::{AuthConfig, JobtickConfig, SchedulerConfig},
};
