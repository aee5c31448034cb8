use lazyrows::{Database, DbResult};
use tempfile::TempDir;

pub const ENTRIES_FIXTURE: &str = include_str!("../fixtures/entries.sql");

/// Opens `entries.db` inside `dir` and loads the `entries` table.
pub fn entries_db(dir: &TempDir) -> DbResult<Database> {
    let db = Database::open(dir.path().join("entries.db"))?;
    db.execute_batch(ENTRIES_FIXTURE)?;
    Ok(db)
}
