use std::ops::Deref;

use tempfile::TempDir;

use crate::{connection::Config, Database, DbResult};

/// Schema and rows of the `entries` table, shared with the integration tests.
pub const ENTRIES_FIXTURE: &str = include_str!("../../tests/fixtures/entries.sql");

/// Database newtype which carries the TempDir holding its file. The TempDir must
/// be dropped after the database.
pub struct TempDatabase {
    db: Option<Database>,
    _dir: TempDir,
}

impl Deref for TempDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        self.db.as_ref().expect("database already dropped")
    }
}

// Takes the database out first so the file is closed before the dir goes away.
impl Drop for TempDatabase {
    fn drop(&mut self) {
        self.db.take();
    }
}

pub fn temp_db() -> DbResult<TempDatabase> {
    temp_db_with_cfg(|cfg| cfg)
}

pub fn temp_db_with_cfg(cfg_updater: impl FnOnce(Config) -> Config) -> DbResult<TempDatabase> {
    let temp_dir = TempDir::new().expect("temp dir");
    let cfg = cfg_updater(Config::new(temp_dir.path().join("test.db")));

    let db = Database::with_config(cfg)?;
    Ok(TempDatabase { db: Some(db), _dir: temp_dir })
}

/// A temp database holding the `entries` fixture table.
pub fn entries_db() -> DbResult<TempDatabase> {
    let db = temp_db()?;
    db.execute_batch(ENTRIES_FIXTURE)?;
    Ok(db)
}
