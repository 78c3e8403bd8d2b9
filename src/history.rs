//! history.rs: durable set of delivered record ids.
//!
//! File shape: `{ "ids": [...], "updated_at": "<RFC3339>" }`. The set only
//! grows; nothing here removes ids.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::HistoryError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryHistory {
    #[serde(default, alias = "processed_ids")]
    ids: BTreeSet<String>,
    #[serde(default, deserialize_with = "lenient_ts")]
    updated_at: Option<DateTime<Utc>>,
}

impl DeliveryHistory {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Add ids and bump `updated_at`. Returns how many ids were new.
    pub fn mark_delivered<I>(&mut self, ids: I, now: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.ids.len();
        self.ids.extend(ids);
        self.updated_at = Some(now);
        self.ids.len() - before
    }
}

// Older files carry a naive ISO timestamp without offset.
fn lenient_ts<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|n| n.and_utc())
            })
    }))
}

/// File-backed state store with an advisory lock for the run.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    lock_stale_after: Duration,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_stale_after: Duration::from_secs(1800),
        }
    }

    pub fn with_lock_stale_after(mut self, d: Duration) -> Self {
        self.lock_stale_after = d;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, |name| format!("{name}.lock"))
    }

    /// Read the file. A missing file is an empty history, not an error.
    pub fn read(&self) -> Result<DeliveryHistory, HistoryError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DeliveryHistory::default())
            }
            Err(e) => return Err(HistoryError::io(&self.path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| HistoryError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Read, falling back to an empty history on any error. An unreadable
    /// file is renamed aside first so a later save cannot overwrite it; if
    /// that rename fails the result is marked unsafe to save.
    pub fn load_or_empty(&self) -> LoadedHistory {
        let error = match self.read() {
            Ok(history) => {
                tracing::info!(ids = history.len(), path = %self.path.display(), "history loaded");
                return LoadedHistory {
                    history,
                    error: None,
                    quarantined: None,
                };
            }
            Err(e) => e,
        };
        tracing::warn!(
            error = %error,
            "history unreadable, starting empty; previously delivered items may repeat"
        );
        let quarantined = match self.quarantine(Utc::now()) {
            Ok(aside) => {
                tracing::warn!(aside = %aside.display(), "unreadable history moved aside");
                Some(aside)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "could not move unreadable history aside, saves disabled"
                );
                None
            }
        };
        LoadedHistory {
            history: DeliveryHistory::default(),
            error: Some(error),
            quarantined,
        }
    }

    /// Rename the current file to `<name>.corrupt-<timestamp>`.
    pub fn quarantine(&self, now: DateTime<Utc>) -> Result<PathBuf, HistoryError> {
        let stamp = now.format("%Y%m%dT%H%M%S%.9fZ");
        let aside = sibling(&self.path, |name| format!("{name}.corrupt-{stamp}"));
        fs::rename(&self.path, &aside).map_err(|e| HistoryError::io(&self.path, e))?;
        Ok(aside)
    }

    /// Atomic whole-file rewrite: temp file, fsync, rename.
    pub fn save(&self, history: &DeliveryHistory) -> Result<(), HistoryError> {
        let bytes = serde_json::to_vec_pretty(history)?;
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| HistoryError::io(&parent, e))?;

        let tmp = sibling(&self.path, |name| {
            format!(".{name}.tmp.{}", std::process::id())
        });
        {
            let mut f = fs::File::create(&tmp).map_err(|e| HistoryError::io(&tmp, e))?;
            f.write_all(&bytes).map_err(|e| HistoryError::io(&tmp, e))?;
            f.sync_all().map_err(|e| HistoryError::io(&tmp, e))?;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(HistoryError::io(&self.path, e));
        }
        if let Ok(dir) = fs::File::open(&parent) {
            let _ = dir.sync_all();
        }
        tracing::debug!(ids = history.len(), path = %self.path.display(), "history saved");
        Ok(())
    }

    /// Take the run lock. The lock file holds `<pid> <token>`; a lock is
    /// reclaimed only when it is older than the stale window and its pid is
    /// no longer running.
    pub fn lock(&self) -> Result<RunLock, HistoryError> {
        let path = self.lock_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| HistoryError::io(parent, e))?;
            }
        }

        for attempt in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut f) => {
                    let owner = lock_token();
                    if let Err(e) = f.write_all(owner.as_bytes()).and_then(|_| f.sync_all()) {
                        drop(f);
                        let _ = fs::remove_file(&path);
                        return Err(HistoryError::io(&path, e));
                    }
                    return Ok(RunLock { path, owner });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt == 0 && self.reclaim_stale(&path) {
                        continue;
                    }
                    return Err(HistoryError::Locked { path });
                }
                Err(e) => return Err(HistoryError::io(&path, e)),
            }
        }
        Err(HistoryError::Locked { path })
    }

    /// Move a dead holder's lock aside. The file is renamed before it is
    /// judged again, so a lock created by another run in between is put back
    /// instead of deleted.
    fn reclaim_stale(&self, path: &Path) -> bool {
        let Some(seen) = self.stale_lock_contents(path) else {
            return false;
        };
        let token = lock_token().replace(' ', ".");
        let aside = sibling(path, |name| format!("{name}.reclaim.{token}"));
        if fs::rename(path, &aside).is_err() {
            return false;
        }
        let moved = fs::read_to_string(&aside).unwrap_or_default();
        if moved != seen {
            // Someone else's fresh lock; restore it unless a third run got there.
            let _ = fs::hard_link(&aside, path);
            let _ = fs::remove_file(&aside);
            return false;
        }
        let _ = fs::remove_file(&aside);
        tracing::warn!(
            path = %path.display(),
            holder = %seen.trim(),
            "reclaimed stale history lock"
        );
        true
    }

    fn stale_lock_contents(&self, path: &Path) -> Option<String> {
        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())?;
        if age < self.lock_stale_after {
            return None;
        }
        let contents = fs::read_to_string(path).ok()?;
        let pid = contents.split_whitespace().next().and_then(|p| p.parse::<u32>().ok());
        match pid {
            Some(pid) if pid == std::process::id() => None,
            Some(pid) if pid_alive(pid) == Some(true) => None,
            _ => Some(contents),
        }
    }
}

/// Whether `pid` is running, where the platform lets us tell.
fn pid_alive(pid: u32) -> Option<bool> {
    let proc_root = Path::new("/proc");
    if !proc_root.join("self").exists() {
        return None;
    }
    Some(proc_root.join(pid.to_string()).exists())
}

fn lock_token() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{} {nanos:x}-{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Outcome of [`HistoryStore::load_or_empty`].
#[derive(Debug)]
pub struct LoadedHistory {
    pub history: DeliveryHistory,
    pub error: Option<HistoryError>,
    /// Where an unreadable file was moved to.
    pub quarantined: Option<PathBuf>,
}

impl LoadedHistory {
    /// False when an unreadable file is still in place.
    pub fn can_save(&self) -> bool {
        self.error.is_none() || self.quarantined.is_some()
    }
}

/// Held for the duration of a run; removes the lock file on drop if it is
/// still ours.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    owner: String,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let path = self.path.display();
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents == self.owner => {
                if let Err(e) = fs::remove_file(&self.path) {
                    tracing::warn!(error = %e, %path, "failed to release history lock");
                }
            }
            Ok(_) => tracing::warn!(%path, "history lock taken over by another run, leaving it"),
            Err(e) => tracing::warn!(error = %e, %path, "history lock vanished before release"),
        }
    }
}

fn sibling(path: &Path, name: impl FnOnce(&str) -> String) -> PathBuf {
    let file = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("history.json");
    path.with_file_name(name(file))
}
