use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

const APP_DIR: &str = "flowstrands";
const CONFIG_FILE: &str = "config.toml";
const SESSION_FILE: &str = "session.toml";

// Same core relays the bitchat clients connect to first
const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://relay.primal.net",
    "wss://offchain.pub",
    "wss://nostr21.com",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relays: Vec<String>,
    pub default_room: String,
    /// Written as the author photo when the session has none.
    pub placeholder_photo: String,
    pub notice_timeout_ms: u64,
    /// Upper bound on records requested by the initial history query.
    pub history_limit: usize,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            default_room: "1".to_string(),
            placeholder_photo: "/images/profile_placeholder.png".to_string(),
            notice_timeout_ms: 2000,
            history_limit: 1000,
            log_file: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `path` is `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_dir().join(CONFIG_FILE),
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "loaded config");
                Ok(toml::from_str(&content)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join(APP_DIR)
                .join("flowstrands.log")
        })
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(APP_DIR)
}

/// Persisted sign-in state, restored on the next start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub nsec: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Self {
        Self::new(config_dir().join(SESSION_FILE))
    }

    pub fn load(&self) -> Option<StoredSession> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match toml::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = %self.path.display(), "ignoring unreadable session file: {}", e);
                None
            }
        }
    }

    pub fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(session)?;

        // holds the secret key: owner read/write only
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // `mode` only applies when the file is created
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.notice_timeout_ms, 2000);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_room = \"7\"\nrelays = [\"wss://example.org\"]\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.default_room, "7");
        assert_eq!(config.relays, vec!["wss://example.org".to_string()]);
        assert_eq!(config.placeholder_photo, "/images/profile_placeholder.png");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "relays = 3").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn session_file_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("nested").join("session.toml"));
        assert!(file.load().is_none());

        let session = StoredSession {
            nsec: "nsec1xyz".to_string(),
            display_name: "ada".to_string(),
            photo_url: None,
        };
        file.save(&session).unwrap();
        assert_eq!(file.load(), Some(session));

        file.clear().unwrap();
        assert!(file.load().is_none());
        // clearing twice is fine
        file.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        // an older, world-readable file gets tightened on the next save
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let file = SessionFile::new(path.clone());
        file.save(&StoredSession {
            nsec: "nsec1xyz".to_string(),
            display_name: "ada".to_string(),
            photo_url: None,
        })
        .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(file.load().unwrap().nsec, "nsec1xyz");
    }

    #[cfg(unix)]
    #[test]
    fn fresh_session_file_is_created_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.toml"));
        file.save(&StoredSession {
            nsec: "nsec1abc".to_string(),
            display_name: "grace".to_string(),
            photo_url: None,
        })
        .unwrap();

        let mode = std::fs::metadata(dir.path().join("session.toml"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o077, 0);
    }
}
