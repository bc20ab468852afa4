// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed credential store with atomic writes.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::credential::{non_empty, Credential, CredentialStore};

/// Credential store persisted as JSON.
///
/// Every read goes to disk so separate processes sharing the file see each
/// other's writes. A missing or unreadable file reads as "not authenticated".
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Store at `<dir>/credentials.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Credential {
        match load(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %self.path.display(), "no stored credentials: {e}");
                Credential::default()
            }
        }
    }

    /// Delete the file. Caller holds `write_lock`.
    fn remove(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), err = %e, "failed to clear credentials"),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Credential)) {
        let _guard = self.write_lock.lock();
        let mut credential = self.read();
        f(&mut credential);
        if let Err(e) = save(&self.path, &credential) {
            warn!(path = %self.path.display(), err = %e, "failed to persist credentials");
        }
    }
}

impl CredentialStore for FileStore {
    fn access_token(&self) -> Option<String> {
        self.read().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token
    }

    fn set_access_token(&self, token: String) {
        self.update(|c| c.access_token = non_empty(token));
    }

    fn set_refresh_token(&self, token: String) {
        self.update(|c| c.refresh_token = non_empty(token));
    }

    fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.remove();
    }

    /// Replace the pair with one atomic write so readers never observe a
    /// half-stored login.
    fn set_credential(&self, credential: Credential) {
        let credential = Credential {
            access_token: credential.access_token.and_then(non_empty),
            refresh_token: credential.refresh_token.and_then(non_empty),
        };
        let _guard = self.write_lock.lock();
        if credential == Credential::default() {
            self.remove();
        } else if let Err(e) = save(&self.path, &credential) {
            warn!(path = %self.path.display(), err = %e, "failed to persist credentials");
        }
    }
}

/// Load a credential pair from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<Credential> {
    let contents = std::fs::read_to_string(path)?;
    let credential: Credential = serde_json::from_str(&contents)?;
    Ok(credential)
}

/// Save a credential pair atomically (write tmp + rename).
///
/// The temp name carries PID and a counter so concurrent saves never share a
/// `.tmp` file.
pub fn save(path: &Path, credential: &Credential) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let json = serde_json::to_string_pretty(credential)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
