use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::fs;
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// The two credentials a session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSlot {
    Access,
    Refresh,
}

impl TokenSlot {
    /// The key the slot is persisted under.
    pub fn key(self) -> &'static str {
        match self {
            TokenSlot::Access => "token",
            TokenSlot::Refresh => "refreshToken",
        }
    }
}

/// Storage for the access and refresh tokens of one session.
pub trait TokenStore: Send + Sync + Debug {
    fn get(&self, slot: TokenSlot) -> Option<String>;
    fn set(&self, slot: TokenSlot, value: &str) -> io::Result<()>;
    fn remove(&self, slot: TokenSlot) -> io::Result<()>;

    /// Remove both tokens.
    fn clear(&self) -> io::Result<()> {
        self.remove(TokenSlot::Access)?;
        self.remove(TokenSlot::Refresh)
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<TokenSlot, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let tokens = HashMap::from([
            (TokenSlot::Access, access.to_string()),
            (TokenSlot::Refresh, refresh.to_string()),
        ]);
        Self { tokens: Mutex::new(tokens) }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, slot: TokenSlot) -> Option<String> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).get(&slot).cloned()
    }

    fn set(&self, slot: TokenSlot, value: &str) -> io::Result<()> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).insert(slot, value.to_string());
        Ok(())
    }

    fn remove(&self, slot: TokenSlot) -> io::Result<()> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).remove(&slot);
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}

/// Tokens kept in a JSON object on disk, e.g. `{"token": "..", "refreshToken": ".."}`.
///
/// The file is read once on open and rewritten after every change. Writes go to a sibling temp
/// file that is renamed over the store, and memory only changes once the rename succeeded. On unix
/// the file is readable by its owner only.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    tokens: Mutex<BTreeMap<String, String>>,
}

impl FileTokenStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tokens = match fs::read(&path) {
            Ok(data) if data.is_empty() => BTreeMap::new(),
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        debug!(path = %path.display(), slots = tokens.len(), "opened token store");
        Ok(Self {
            path,
            tokens: Mutex::new(tokens),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn write(&self, tokens: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_vec_pretty(tokens)?;
        let tmp = self.temp_path();
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let written = options
            .open(&tmp)
            .and_then(|mut file| {
                file.write_all(&data)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, &self.path));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> io::Result<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = tokens.clone();
        f(&mut next);
        self.write(&next)?;
        *tokens = next;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, slot: TokenSlot) -> Option<String> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).get(slot.key()).cloned()
    }

    fn set(&self, slot: TokenSlot, value: &str) -> io::Result<()> {
        self.update(|tokens| {
            tokens.insert(slot.key().to_string(), value.to_string());
        })
    }

    fn remove(&self, slot: TokenSlot) -> io::Result<()> {
        self.update(|tokens| {
            tokens.remove(slot.key());
        })
    }

    fn clear(&self) -> io::Result<()> {
        self.update(BTreeMap::clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("budgetclient-{}-{}", std::process::id(), name)).join("tokens.json")
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_tokens("T1", "R1");
        assert_eq!(store.get(TokenSlot::Access).as_deref(), Some("T1"));
        store.set(TokenSlot::Access, "T2").unwrap();
        assert_eq!(store.get(TokenSlot::Access).as_deref(), Some("T2"));
        store.clear().unwrap();
        assert_eq!(store.get(TokenSlot::Access), None);
        assert_eq!(store.get(TokenSlot::Refresh), None);
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let path = temp_path("persist");
        let _ = fs::remove_file(&path);

        let store = FileTokenStore::open(&path).unwrap();
        assert_eq!(store.get(TokenSlot::Access), None);
        store.set(TokenSlot::Access, "T1").unwrap();
        store.set(TokenSlot::Refresh, "R1").unwrap();

        let contents: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(contents, serde_json::json!({"token": "T1", "refreshToken": "R1"}));

        let reopened = FileTokenStore::open(&path).unwrap();
        assert_eq!(reopened.get(TokenSlot::Refresh).as_deref(), Some("R1"));
        reopened.clear().unwrap();
        assert_eq!(FileTokenStore::open(&path).unwrap().get(TokenSlot::Access), None);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_failed_write_keeps_tokens() {
        let path = temp_path("failed-write");
        let dir = path.parent().unwrap().to_path_buf();
        let _ = fs::remove_dir_all(&dir);

        let store = FileTokenStore::open(&path).unwrap();
        store.set(TokenSlot::Access, "T1").unwrap();
        store.set(TokenSlot::Refresh, "R1").unwrap();

        // A plain file where the store's directory should be makes every write fail.
        fs::remove_dir_all(&dir).unwrap();
        fs::write(&dir, "blocker").unwrap();
        assert!(store.clear().is_err());
        assert!(store.set(TokenSlot::Access, "T2").is_err());
        assert_eq!(store.get(TokenSlot::Access).as_deref(), Some("T1"));
        assert_eq!(store.get(TokenSlot::Refresh).as_deref(), Some("R1"));

        fs::remove_file(&dir).unwrap();
        store.clear().unwrap();
        assert_eq!(store.get(TokenSlot::Access), None);
        assert_eq!(FileTokenStore::open(&path).unwrap().get(TokenSlot::Refresh), None);
        assert!(!store.temp_path().exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("mode");
        let _ = fs::remove_file(&path);
        let store = FileTokenStore::open(&path).unwrap();
        store.set(TokenSlot::Access, "T1").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let path = temp_path("garbage");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        let err = FileTokenStore::open(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
