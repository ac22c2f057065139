//! Lock-file mutual exclusion between overlapping trigger invocations.
//!
//! Single-host, best-effort: a marker file per scope holds the instant it
//! was created. A marker younger than the staleness window means a
//! genuinely concurrent run and the invocation is rejected; an older marker
//! means the previous run crashed or never cleaned up, so it is replaced.

use std::path::{Path, PathBuf};

use {
    chrono::{DateTime, Duration, Utc},
    tokio::fs,
    tracing::warn,
};

use crate::{Result, types::TriggerKind};

/// Minutes after which an uncleared marker is considered abandoned.
const STALE_AFTER_MINUTES: i64 = 5;

const MARKER_BASENAME: &str = "jobtick-lock";

pub struct ConcurrencyGate {
    dir: PathBuf,
    /// Log the uncleared-marker warning before the staleness check instead
    /// of only when the marker turns out to be stale.
    warn_early: bool,
}

impl ConcurrencyGate {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, warn_early: bool) -> Self {
        Self {
            dir: dir.into(),
            warn_early,
        }
    }

    fn marker_path(&self, scope: Option<TriggerKind>) -> PathBuf {
        match scope {
            Some(kind) => self.dir.join(format!("{MARKER_BASENAME}-{}", kind.as_str())),
            None => self.dir.join(MARKER_BASENAME),
        }
    }

    /// Try to take the gate for `scope` at `now`.
    ///
    /// Returns `Ok(true)` when the caller may proceed and `Ok(false)` when a
    /// fresh marker rejects the invocation. A stale marker is cleared with a
    /// warning and the gate is taken.
    pub async fn acquire(&self, scope: Option<TriggerKind>, now: DateTime<Utc>) -> Result<bool> {
        let path = self.marker_path(scope);

        if fs::try_exists(&path).await.unwrap_or(false) {
            let stamp_text = fs::read_to_string(&path).await?;
            let stamp = DateTime::parse_from_rfc3339(stamp_text.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc));

            if self.warn_early {
                warn!(marker = %path.display(), stamp = %stamp_text.trim(), "uncleared lock marker");
            }

            if let Some(stamp) = stamp
                && stamp > now - Duration::minutes(STALE_AFTER_MINUTES)
            {
                return Ok(false);
            }

            if !self.warn_early {
                warn!(marker = %path.display(), stamp = %stamp_text.trim(), "uncleared lock marker");
            }

            // Stale or unreadable stamp: the previous run is abandoned.
            fs::remove_file(&path).await?;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, now.to_rfc3339()).await?;
        Ok(true)
    }

    /// Clear the marker for `scope`, if it still exists. A stale marker may
    /// already have been replaced by a later invocation.
    pub async fn release(&self, scope: Option<TriggerKind>) -> Result<()> {
        let path = self.marker_path(scope);
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_acquire_when_unlocked() {
        let tmp = TempDir::new().unwrap();
        let gate = ConcurrencyGate::new(tmp.path(), false);
        assert!(gate.acquire(None, at("2026-03-01T10:00:00Z")).await.unwrap());
        assert!(tmp.path().join("jobtick-lock").exists());
    }

    #[tokio::test]
    async fn test_fresh_marker_rejects() {
        let tmp = TempDir::new().unwrap();
        let gate = ConcurrencyGate::new(tmp.path(), false);
        assert!(gate.acquire(None, at("2026-03-01T10:00:00Z")).await.unwrap());
        // Two minutes later: still within the staleness window.
        assert!(!gate.acquire(None, at("2026-03-01T10:02:00Z")).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_marker_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let gate = ConcurrencyGate::new(tmp.path(), false);
        assert!(gate.acquire(None, at("2026-03-01T10:00:00Z")).await.unwrap());
        // Six minutes later: the previous run is treated as abandoned.
        assert!(gate.acquire(None, at("2026-03-01T10:06:00Z")).await.unwrap());
        let stamp = std::fs::read_to_string(tmp.path().join("jobtick-lock")).unwrap();
        assert_eq!(stamp, at("2026-03-01T10:06:00Z").to_rfc3339());
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let tmp = TempDir::new().unwrap();
        let gate = ConcurrencyGate::new(tmp.path(), false);
        let now = at("2026-03-01T10:00:00Z");
        assert!(gate.acquire(Some(TriggerKind::Cron), now).await.unwrap());
        assert!(gate.acquire(Some(TriggerKind::Task), now).await.unwrap());
        assert!(!gate.acquire(Some(TriggerKind::Cron), now).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_clears_marker() {
        let tmp = TempDir::new().unwrap();
        let gate = ConcurrencyGate::new(tmp.path(), false);
        let now = at("2026-03-01T10:00:00Z");
        assert!(gate.acquire(None, now).await.unwrap());
        gate.release(None).await.unwrap();
        assert!(!tmp.path().join("jobtick-lock").exists());
        assert!(gate.acquire(None, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_marker() {
        let tmp = TempDir::new().unwrap();
        let gate = ConcurrencyGate::new(tmp.path(), false);
        gate.release(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_unparseable_stamp_treated_as_stale() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("jobtick-lock"), "garbage").unwrap();
        let gate = ConcurrencyGate::new(tmp.path(), false);
        assert!(gate.acquire(None, at("2026-03-01T10:00:00Z")).await.unwrap());
    }
}
