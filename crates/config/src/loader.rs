use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::schema::JobtickConfig;

const CONFIG_FILENAME: &str = "jobtick.toml";

/// Load config from the given path.
pub fn load_config(path: &Path) -> anyhow::Result<JobtickConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = expand_placeholders(&raw, |name| std::env::var(name).ok());
    let cfg = toml::from_str(&raw)?;
    Ok(cfg)
}

/// Expand `${NAME}` placeholders in the raw config text.
///
/// Unset variables and malformed placeholders pass through untouched, so
/// a literal `${...}` in a value survives when nothing matches it.
fn expand_placeholders(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            },
            // "${}" or no closing brace: keep the text as written.
            Some(_) => {
                out.push_str("${}");
                rest = &after[1..];
            },
            None => {
                out.push_str(&rest[start..]);
                return out;
            },
        }
    }
    out.push_str(rest);
    out
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./jobtick.toml` (project-local)
/// 2. `~/.config/jobtick/jobtick.toml` (user-global)
///
/// Falls back to defaults when no file is found, then applies environment
/// overrides either way.
#[must_use]
pub fn discover_and_load() -> JobtickConfig {
    let mut cfg = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                JobtickConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        JobtickConfig::default()
    };
    apply_env_overrides(&mut cfg);
    if cfg.auth.username.is_some() != cfg.auth.password.is_some() {
        warn!("basic auth needs both username and password, ignoring the one provided");
    }
    cfg
}

/// Apply `JOBTICK_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(cfg: &mut JobtickConfig) {
    if let Ok(username) = std::env::var("JOBTICK_USERNAME") {
        cfg.auth.username = Some(username);
    }
    if let Ok(password) = std::env::var("JOBTICK_PASSWORD") {
        cfg.auth.password = Some(Secret::new(password));
    }
    if let Ok(key) = std::env::var("JOBTICK_KEY") {
        cfg.auth.key = Some(Secret::new(key));
    }
    if let Ok(dir) = std::env::var("JOBTICK_LOCK_DIR") {
        cfg.scheduler.lock_dir = Some(PathBuf::from(dir));
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }

    if let Some(dir) = config_dir() {
        let p = dir.join(CONFIG_FILENAME);
        if p.exists() {
            return Some(p);
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/jobtick/`).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "jobtick").map(|d| d.config_dir().to_path_buf())
}

/// Serialize `config` to TOML and write it to `path`, creating parent
/// directories if needed.
pub fn save_config(config: &JobtickConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}
