use std::path::Path;
use std::rc::Rc;

use log::debug;
use rusqlite::{Connection, OpenFlags};

use crate::error::DbResult;
use crate::statement::Statement;

use super::state::{DbState, TraceHook};
use super::Config;

pub(crate) struct DatabaseInner {
    pub(crate) conn: Connection,
    pub(crate) state: DbState,
    name: String,
    readonly: bool,
}

/// A single SQLite connection plus the bookkeeping its cursors share.
///
/// Cloning is cheap and yields another handle to the same connection. The
/// connection closes once the last handle and the last statement are gone.
#[derive(Clone)]
pub struct Database {
    inner: Rc<DatabaseInner>,
}

impl Database {
    pub fn with_config(config: Config) -> DbResult<Self> {
        let conn = if config.is_memory() {
            Connection::open_in_memory()?
        } else {
            let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            if config.readonly {
                flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
            } else if config.file_must_exist {
                flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            } else {
                flags |= OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
            }
            Connection::open_with_flags(&config.path, flags)?
        };
        conn.busy_timeout(config.busy_timeout)?;

        let name = config.path.to_string_lossy().into_owned();
        debug!("opened database {}", name);

        Ok(Self {
            inner: Rc::new(DatabaseInner {
                conn,
                state: DbState::new(config.max_iterators, config.safe_integers, config.unsafe_mode),
                name,
                readonly: config.readonly,
            }),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::with_config(Config::new(path))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_config(Config::in_memory())
    }

    /// Compiles a single SQL statement.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement> {
        self.inner.state.require_not_busy()?;
        Statement::prepare(self.clone(), sql)
    }

    /// Runs one or more statements that return no rows.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.inner.state.require_not_busy()?;
        self.inner.state.require_no_iterators()?;
        let _guard = self.inner.state.enter();
        self.inner.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Installs the hook each cursor runs once before its first step.
    pub fn set_trace<F>(&self, hook: F)
    where
        F: FnMut(&str) -> DbResult<()> + 'static,
    {
        let hook: TraceHook = Box::new(hook);
        self.inner.state.set_trace(Some(hook));
    }

    pub fn clear_trace(&self) {
        self.inner.state.set_trace(None);
    }

    /// Default integer decoding for statements prepared after this call.
    pub fn set_safe_integers(&self, safe_integers: bool) {
        self.inner.state.set_safe_integers(safe_integers);
    }

    pub fn set_unsafe_mode(&self, unsafe_mode: bool) -> DbResult<()> {
        self.inner.state.require_not_busy()?;
        self.inner.state.set_unsafe_mode(unsafe_mode);
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.is_busy()
    }

    pub fn iterator_count(&self) -> u16 {
        self.inner.state.iterators()
    }

    pub fn in_transaction(&self) -> bool {
        !self.inner.conn.is_autocommit()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.readonly
    }

    pub(crate) fn state(&self) -> &DbState {
        &self.inner.state
    }

    pub(crate) fn raw_handle(&self) -> *mut rusqlite::ffi::sqlite3 {
        unsafe { self.inner.conn.handle() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::utils::testing_utils::temp_db;
    use tempfile::TempDir;

    #[test]
    fn test_open_file_database() -> DbResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");

        let db = Database::open(&path)?;
        db.execute_batch("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (1);")?;
        assert!(path.exists());
        assert_eq!(db.name(), path.to_string_lossy());
        assert!(!db.in_transaction());
        Ok(())
    }

    #[test]
    fn test_file_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.db");

        let result = Database::with_config(Config::new(&path).file_must_exist(true));
        assert!(matches!(result, Err(DbError::Sqlite(_))));
    }

    #[test]
    fn test_readonly_rejects_writes() -> DbResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ro.db");
        Database::open(&path)?.execute_batch("CREATE TABLE t (a INTEGER)")?;

        let db = Database::with_config(Config::new(&path).readonly(true))?;
        assert!(db.is_readonly());
        assert!(db.execute_batch("INSERT INTO t VALUES (1)").is_err());
        Ok(())
    }

    #[test]
    fn test_in_transaction() -> DbResult<()> {
        let db = temp_db()?;
        db.execute_batch("BEGIN")?;
        assert!(db.in_transaction());
        db.execute_batch("COMMIT")?;
        assert!(!db.in_transaction());
        Ok(())
    }

    #[test]
    fn test_prepare_rejects_multiple_statements() -> DbResult<()> {
        let db = temp_db()?;
        let result = db.prepare("SELECT 1; SELECT 2");
        assert!(matches!(result, Err(DbError::Engine { .. })));
        Ok(())
    }
}
