use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use house_wallet_core::{PortError, WalletLinkStore};

type Links = BTreeMap<String, String>;

fn lock(links: &Mutex<Links>) -> Result<MutexGuard<'_, Links>, PortError> {
    links
        .lock()
        .map_err(|e| PortError::Transport(format!("link store lock poisoned: {e}")))
}

/// Process-local links; lost on exit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWalletLinkStore {
    links: Arc<Mutex<Links>>,
}

impl InMemoryWalletLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.links).map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WalletLinkStore for InMemoryWalletLinkStore {
    fn linked_user(&self, address: &str) -> Result<Option<String>, PortError> {
        Ok(lock(&self.links)?.get(address).cloned())
    }

    fn link(&self, address: &str, user_id: &str) -> Result<(), PortError> {
        lock(&self.links)?.insert(address.to_owned(), user_id.to_owned());
        Ok(())
    }

    fn unlink(&self, address: &str) -> Result<bool, PortError> {
        Ok(lock(&self.links)?.remove(address).is_some())
    }

    fn clear(&self) -> Result<(), PortError> {
        lock(&self.links)?.clear();
        Ok(())
    }
}

/// Links persisted as a JSON object (`{"0xabc…": "user-id"}`).
///
/// The file is read once on open and rewritten after every mutation.
#[derive(Debug)]
pub struct JsonFileWalletLinkStore {
    path: PathBuf,
    links: Mutex<Links>,
}

impl JsonFileWalletLinkStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PortError> {
        let path = path.into();
        let links = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| PortError::Transport(format!("{}: {e}", path.display())))?;
            if raw.trim().is_empty() {
                Links::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    PortError::Validation(format!("{} is not a link map: {e}", path.display()))
                })?
            }
        } else {
            Links::new()
        };
        debug!(path = %path.display(), count = links.len(), "opened wallet link store");
        Ok(Self {
            path,
            links: Mutex::new(links),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy, persist it, then publish it. Memory is left
    /// untouched when the write fails. `change` returns whether anything changed.
    fn update(&self, change: impl FnOnce(&mut Links) -> bool) -> Result<bool, PortError> {
        let mut links = lock(&self.links)?;
        let mut next = links.clone();
        if !change(&mut next) {
            return Ok(false);
        }
        self.flush(&next)?;
        *links = next;
        Ok(true)
    }

    fn flush(&self, links: &Links) -> Result<(), PortError> {
        let body = serde_json::to_string_pretty(links)
            .map_err(|e| PortError::Validation(format!("link map encode failed: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| PortError::Transport(format!("{}: {e}", self.path.display())))
    }
}

impl WalletLinkStore for JsonFileWalletLinkStore {
    fn linked_user(&self, address: &str) -> Result<Option<String>, PortError> {
        Ok(lock(&self.links)?.get(address).cloned())
    }

    fn link(&self, address: &str, user_id: &str) -> Result<(), PortError> {
        self.update(|links| {
            links.insert(address.to_owned(), user_id.to_owned());
            true
        })
        .map(|_| ())
    }

    fn unlink(&self, address: &str) -> Result<bool, PortError> {
        self.update(|links| links.remove(address).is_some())
    }

    fn clear(&self) -> Result<(), PortError> {
        self.update(|links| {
            links.clear();
            true
        })
        .map(|_| ())
    }
}
