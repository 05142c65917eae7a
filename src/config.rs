use std::{env, path::PathBuf};

use crate::state::{EphemeralStore, FileStore, StateStore};

/// Default permission bits of a newly created state file.
pub const DEFAULT_MODE: u32 = 0o644;

/// File name of the default state file.
const STATE_FILE_NAME: &str = "uuid1-state";

/// Generator configuration, fixed for the lifetime of a [`Generator`](crate::Generator).
///
/// # Examples
///
/// ```rust
/// use uuid1::Config;
///
/// let config = Config::with_state_file("/var/tmp/my-app-uuid").mode(0o600);
/// assert_eq!(config.mode, 0o600);
/// assert!(Config::ephemeral().state_file.is_none());
/// ```
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Config {
    /// Location of the state file, or `None` to keep the state in memory only.
    pub state_file: Option<PathBuf>,
    /// Permission bits applied when the state file is created.
    pub mode: u32,
}

impl Default for Config {
    /// Persists the state at [`default_state_file()`] with mode `0o644`.
    fn default() -> Self {
        Self::with_state_file(default_state_file())
    }
}

impl Config {
    /// Persists the state in the file at `path`.
    pub fn with_state_file(path: impl Into<PathBuf>) -> Self {
        Self {
            state_file: Some(path.into()),
            mode: DEFAULT_MODE,
        }
    }

    /// Keeps the state in memory only; no filesystem access takes place.
    pub fn ephemeral() -> Self {
        Self {
            state_file: None,
            mode: DEFAULT_MODE,
        }
    }

    /// Sets the permission bits of a newly created state file.
    pub fn mode(self, mode: u32) -> Self {
        Self { mode, ..self }
    }

    /// Builds the persistence strategy this configuration selects.
    pub(crate) fn open_store(&self) -> Box<dyn StateStore + Send> {
        match &self.state_file {
            Some(path) => Box::new(FileStore::new(path, self.mode)),
            None => Box::new(EphemeralStore),
        }
    }
}

/// Returns `$HOME/.uuid1-state` if `HOME` names an existing directory, or `uuid1-state` in the
/// temporary directory otherwise.
pub fn default_state_file() -> PathBuf {
    match env::var_os("HOME").map(PathBuf::from) {
        Some(home) if home.is_dir() => home.join(format!(".{}", STATE_FILE_NAME)),
        _ => env::temp_dir().join(STATE_FILE_NAME),
    }
}
