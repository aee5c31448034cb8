use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MEMORY_PATH: &str = ":memory:";

pub struct Config {
    pub path: PathBuf,
    pub readonly: bool,
    pub file_must_exist: bool,
    pub busy_timeout: Duration,
    pub max_iterators: u16,
    pub safe_integers: bool,
    pub unsafe_mode: bool,
}

impl Config {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            readonly: false,
            file_must_exist: false,
            busy_timeout: Duration::from_millis(5000),
            max_iterators: u16::MAX,
            safe_integers: false,
            unsafe_mode: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MEMORY_PATH)
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn file_must_exist(mut self, file_must_exist: bool) -> Self {
        self.file_must_exist = file_must_exist;
        self
    }

    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Ceiling on cursors that may be live on the connection at once.
    pub fn max_iterators(mut self, max_iterators: u16) -> Self {
        self.max_iterators = max_iterators;
        self
    }

    /// Default decoding policy for statements prepared on the connection.
    pub fn safe_integers(mut self, safe_integers: bool) -> Self {
        self.safe_integers = safe_integers;
        self
    }

    /// Allows writes through the connection while cursors are live.
    pub fn unsafe_mode(mut self, unsafe_mode: bool) -> Self {
        self.unsafe_mode = unsafe_mode;
        self
    }

    pub fn is_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH || self.path.as_os_str().is_empty()
    }
}
