// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persisted browser identity.
//!
//! A [`SessionState`] lives in two records under the session directory:
//! `cookies.json` (the cookie set) and `storage.json` (local and session
//! storage maps). Each save overwrites both records; nothing is merged. Writes
//! go to a sibling temp file first and are renamed into place, so a crash
//! mid-write leaves the previous record intact.

use crate::error::{FeedError, FeedResult};
use crate::renderer::{BrowserCookie, RenderContext};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const COOKIES_FILE: &str = "cookies.json";
const STORAGE_FILE: &str = "storage.json";

/// Browser session captured after a successful or human-resolved scrape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<BrowserCookie>,
    pub local_storage: BTreeMap<String, String>,
    pub session_storage: BTreeMap<String, String>,
}

impl SessionState {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.local_storage.is_empty() && self.session_storage.is_empty()
    }
}

/// On-disk shape of the storage record.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageRecord {
    #[serde(default)]
    local: BTreeMap<String, String>,
    #[serde(default)]
    session: BTreeMap<String, String>,
}

/// Reads both storage areas of the current origin.
const CAPTURE_STORAGE_JS: &str = r#"(() => {
  const out = { local: {}, session: {} };
  try {
    for (let i = 0; i < localStorage.length; i++) {
      const k = localStorage.key(i); out.local[k] = localStorage.getItem(k);
    }
    for (let i = 0; i < sessionStorage.length; i++) {
      const k = sessionStorage.key(i); out.session[k] = sessionStorage.getItem(k);
    }
  } catch (e) {}
  return out;
})()"#;

/// File-backed store for the single browser session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cookies_path(&self) -> PathBuf {
        self.dir.join(COOKIES_FILE)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.dir.join(STORAGE_FILE)
    }

    /// Load the persisted session. Missing records load as empty.
    pub fn load(&self) -> FeedResult<SessionState> {
        let cookies: Vec<BrowserCookie> = read_record(&self.cookies_path())?.unwrap_or_default();
        let storage: StorageRecord = read_record(&self.storage_path())?.unwrap_or_default();
        Ok(SessionState {
            cookies,
            local_storage: storage.local,
            session_storage: storage.session,
        })
    }

    /// Overwrite both records with `state`.
    pub fn save(&self, state: &SessionState) -> FeedResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| FeedError::SessionIo {
            path: self.dir.clone(),
            source,
        })?;
        write_record(&self.cookies_path(), &state.cookies)?;
        write_record(
            &self.storage_path(),
            &StorageRecord {
                local: state.local_storage.clone(),
                session: state.session_storage.clone(),
            },
        )
    }

    /// Remove both records. Missing files are not an error.
    pub fn clear(&self) -> FeedResult<()> {
        for path in [self.cookies_path(), self.storage_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(FeedError::SessionIo { path, source }),
            }
        }
        Ok(())
    }

    /// Install the persisted cookies into a fresh context before navigation.
    ///
    /// Failures are logged and the scrape proceeds without a restored session.
    pub async fn restore_cookies(&self, ctx: &dyn RenderContext) -> SessionState {
        let state = match self.load() {
            Ok(state) => state,
            Err(e) => {
                warn!("session restore skipped: {e}");
                return SessionState::default();
            }
        };
        if !state.cookies.is_empty() {
            match ctx.set_cookies(&state.cookies).await {
                Ok(()) => info!("restored {} session cookie(s)", state.cookies.len()),
                Err(e) => warn!("failed to restore session cookies: {e:#}"),
            }
        }
        state
    }

    /// Write the storage maps of `state` into the current origin.
    pub async fn restore_storage(&self, ctx: &dyn RenderContext, state: &SessionState) {
        if state.local_storage.is_empty() && state.session_storage.is_empty() {
            return;
        }
        let script = match restore_storage_script(state) {
            Ok(script) => script,
            Err(e) => {
                warn!("failed to encode session storage: {e}");
                return;
            }
        };
        match ctx.execute_js(&script).await {
            Ok(_) => info!(
                "restored session storage ({} local, {} session key(s))",
                state.local_storage.len(),
                state.session_storage.len()
            ),
            Err(e) => warn!("failed to restore session storage: {e:#}"),
        }
    }

    /// Capture cookies and storage from `ctx` and persist them.
    pub async fn capture(&self, ctx: &dyn RenderContext) -> anyhow::Result<SessionState> {
        let cookies = ctx.cookies().await?;
        let storage = ctx
            .execute_js(CAPTURE_STORAGE_JS)
            .await
            .context("failed to read page storage")?;
        let storage: StorageRecord = serde_json::from_value(storage).unwrap_or_default();
        let state = SessionState {
            cookies,
            local_storage: storage.local,
            session_storage: storage.session,
        };
        self.save(&state)?;
        Ok(state)
    }

    /// [`capture`](Self::capture) with failures logged and ignored.
    pub async fn persist(&self, ctx: &dyn RenderContext) {
        match self.capture(ctx).await {
            Ok(state) => info!(
                "session saved ({} cookie(s), {} storage key(s))",
                state.cookies.len(),
                state.local_storage.len() + state.session_storage.len()
            ),
            Err(e) => warn!("failed to save session: {e:#}"),
        }
    }
}

fn restore_storage_script(state: &SessionState) -> serde_json::Result<String> {
    let local = serde_json::to_string(&state.local_storage)?;
    let session = serde_json::to_string(&state.session_storage)?;
    Ok(format!(
        "(() => {{ try {{ \
         Object.entries({local}).forEach(([k, v]) => localStorage.setItem(k, v)); \
         Object.entries({session}).forEach(([k, v]) => sessionStorage.setItem(k, v)); \
         }} catch (e) {{}} return true; }})()"
    ))
}

fn read_record<T: serde::de::DeserializeOwned>(path: &Path) -> FeedResult<Option<T>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(FeedError::SessionIo {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| FeedError::SessionFormat {
            path: path.to_path_buf(),
            source,
        })
}

fn write_record<T: Serialize>(path: &Path, value: &T) -> FeedResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| FeedError::SessionFormat {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    let io_err = |source| FeedError::SessionIo {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&json).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SessionState {
        SessionState {
            cookies: vec![BrowserCookie {
                name: "cf_clearance".into(),
                value: "token".into(),
                domain: Some(".hltv.org".into()),
                path: Some("/".into()),
                expires: None,
                http_only: true,
                secure: true,
            }],
            local_storage: BTreeMap::from([("theme".to_string(), "dark".to_string())]),
            session_storage: BTreeMap::new(),
        }
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session"));
        let state = store.load().unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session"));
        store.save(&sample_state()).unwrap();

        assert!(store.cookies_path().exists());
        assert!(store.storage_path().exists());
        assert_eq!(store.load().unwrap(), sample_state());
    }

    #[test]
    fn test_save_overwrites_instead_of_merging() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save(&sample_state()).unwrap();

        let replacement = SessionState {
            session_storage: BTreeMap::from([("k".to_string(), "v".to_string())]),
            ..SessionState::default()
        };
        store.save(&replacement).unwrap();
        assert_eq!(store.load().unwrap(), replacement);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save(&sample_state()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_record_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(store.cookies_path(), b"{not json").unwrap();
        assert!(matches!(store.load(), Err(FeedError::SessionFormat { .. })));
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save(&sample_state()).unwrap();
        store.clear().unwrap();
        assert!(!store.cookies_path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_restore_script_embeds_entries() {
        let script = restore_storage_script(&sample_state()).unwrap();
        assert!(script.contains(r#"{"theme":"dark"}"#));
        assert!(script.contains("sessionStorage.setItem"));
    }
}
