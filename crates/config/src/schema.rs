//! Config schema for the trigger scheduler: auth credentials and the
//! runtime knobs of the trigger cycle.

use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobtickConfig {
    pub auth: AuthConfig,
    pub scheduler: SchedulerConfig,
}

/// Credentials guarding the trigger endpoints. Both mechanisms are
/// optional; an endpoint with neither configured accepts every request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
    /// Shared key accepted via header or query string, independent of
    /// basic auth.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<Secret<String>>,
}

impl AuthConfig {
    /// Basic auth is active only when both halves are configured.
    #[must_use]
    pub fn basic_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    #[must_use]
    pub fn check_basic(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => u == username && p.expose_secret() == password,
            _ => false,
        }
    }

    #[must_use]
    pub fn check_key(&self, key: &str) -> bool {
        self.key
            .as_ref()
            .is_some_and(|k| k.expose_secret() == key)
    }
}

/// Behavior of the trigger cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wall-clock budget per job body in seconds. 0 means unlimited.
    pub time_limit_secs: u64,
    /// Persist non-silent job outcomes as result rows.
    pub store_results: bool,
    /// Prune old result and task rows at the end of each trigger cycle.
    pub auto_clean: bool,
    /// Age in days past which rows are pruned.
    pub auto_clean_days: u32,
    /// Job ids skipped by the cron cycle regardless of their descriptor.
    pub disabled_jobs: Vec<String>,
    /// Log the uncleared-lock-marker warning before the staleness check.
    pub lock_warn_early: bool,
    /// Directory for lock marker files. Defaults to the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 300,
            store_results: true,
            auto_clean: false,
            auto_clean_days: 30,
            disabled_jobs: Vec::new(),
            lock_warn_early: false,
            lock_dir: None,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_secs > 0).then(|| Duration::from_secs(self.time_limit_secs))
    }

    #[must_use]
    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    #[must_use]
    pub fn is_job_disabled(&self, job_id: &str) -> bool {
        self.disabled_jobs.iter().any(|id| id == job_id)
    }
}

fn serialize_option_secret<S: Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_str(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
