use std::cell::Cell;
use std::rc::Rc;

use crate::error::{DbError, DbResult};
use crate::query::Value;

use super::cursor::CursorState;

/// The one reusable handle to a cursor's current row.
///
/// The view holds no data. Reads decode straight from the statement, after
/// checking that the generation they are made against is still the cursor's
/// current one. A view that outlives its cursor is harmless: reads just fail.
pub struct RowView {
    cursor: Rc<CursorState>,
    generation: Cell<u64>,
}

impl RowView {
    pub(crate) fn new(cursor: Rc<CursorState>) -> Self {
        Self {
            cursor,
            generation: Cell::new(0),
        }
    }

    pub(crate) fn stamp(&self, generation: u64) {
        self.generation.set(generation);
    }

    /// The generation the view was last stamped with. 0 until the first row.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn is_valid(&self, generation: u64) -> bool {
        self.cursor.is_row_valid(generation)
    }

    /// Statement-wide constant; readable even after the cursor closed.
    pub fn column_count(&self) -> usize {
        self.cursor.column_count()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.cursor.column_index(name)
    }

    /// Reads column `index` of the row the view currently stands for.
    pub fn get(&self, index: usize) -> DbResult<Value> {
        self.read_at(self.generation.get(), index)
    }

    pub fn get_by_name(&self, name: &str) -> DbResult<Value> {
        self.read_by_name_at(self.generation.get(), name)
    }

    pub(crate) fn read_at(&self, generation: u64, index: usize) -> DbResult<Value> {
        if !self.is_valid(generation) {
            return Err(DbError::InvalidRowAccess);
        }
        let column_count = self.cursor.column_count();
        if index >= column_count {
            return Err(DbError::ColumnIndexOutOfRange { index, column_count });
        }
        Ok(self.cursor.decode(index))
    }

    pub(crate) fn read_by_name_at(&self, generation: u64, name: &str) -> DbResult<Value> {
        if !self.is_valid(generation) {
            return Err(DbError::InvalidRowAccess);
        }
        let index = self
            .cursor
            .column_index(name)
            .ok_or_else(|| DbError::ColumnNameNotFound(name.to_string()))?;
        Ok(self.cursor.decode(index))
    }
}

/// A row produced by one [`Cursor::advance`](super::Cursor::advance) call.
///
/// Holds the shared [`RowView`] and the generation it was produced at, so a
/// `Row` kept past the next advance fails with `InvalidRowAccess` instead of
/// silently reading the newer row.
#[derive(Clone)]
pub struct Row {
    view: Rc<RowView>,
    generation: u64,
}

impl Row {
    pub(crate) fn new(view: Rc<RowView>, generation: u64) -> Self {
        Self { view, generation }
    }

    pub fn get(&self, index: usize) -> DbResult<Value> {
        self.view.read_at(self.generation, index)
    }

    pub fn get_by_name(&self, name: &str) -> DbResult<Value> {
        self.view.read_by_name_at(self.generation, name)
    }

    pub fn column_count(&self) -> usize {
        self.view.column_count()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_valid(&self) -> bool {
        self.view.is_valid(self.generation)
    }

    pub fn view(&self) -> &Rc<RowView> {
        &self.view
    }

    /// Whether both rows came from the same cursor's view.
    pub fn same_view(&self, other: &Row) -> bool {
        Rc::ptr_eq(&self.view, &other.view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::Params;
    use crate::utils::testing_utils::{entries_db, temp_db};

    #[test]
    fn test_view_reads_follow_latest_row() -> DbResult<()> {
        let db = entries_db()?;
        let stmt = db.prepare("SELECT b FROM entries ORDER BY rowid")?;
        let mut cursor = stmt.iterate_lazy(Params::None)?;
        let view = Rc::clone(cursor.row_view());

        assert_eq!(view.generation(), 0);
        assert!(matches!(view.get(0), Err(DbError::InvalidRowAccess)));

        cursor.advance()?;
        assert_eq!(view.get(0)?, Value::Integer(1));
        cursor.advance()?;
        assert_eq!(view.get(0)?, Value::Integer(2));
        assert_eq!(view.generation(), 2);
        Ok(())
    }

    #[test]
    fn test_stale_row_rejected() -> DbResult<()> {
        let db = temp_db()?;
        db.execute_batch("CREATE TABLE t (a INTEGER, b TEXT); INSERT INTO t VALUES (1, 'x'), (2, 'y');")?;
        let stmt = db.prepare("SELECT a, b FROM t")?;
        let mut cursor = stmt.iterate_lazy(Params::None)?;

        let first = cursor.advance()?.into_row().expect("first row");
        assert_eq!(first.get(0)?, Value::Integer(1));
        assert_eq!(first.get(1)?, Value::text("x"));

        let second = cursor.advance()?.into_row().expect("second row");
        assert!(first.same_view(&second));
        assert_eq!(second.get(0)?, Value::Integer(2));
        assert!(matches!(first.get(0), Err(DbError::InvalidRowAccess)));
        assert!(matches!(first.get_by_name("a"), Err(DbError::InvalidRowAccess)));
        assert!(!first.is_valid());

        assert!(cursor.advance()?.done);
        assert!(matches!(second.get(0), Err(DbError::InvalidRowAccess)));
        Ok(())
    }

    #[test]
    fn test_index_and_name_errors_keep_state() -> DbResult<()> {
        let db = entries_db()?;
        let stmt = db.prepare("SELECT * FROM entries WHERE b = 1")?;
        let mut cursor = stmt.iterate_lazy(Params::None)?;
        let row = cursor.advance()?.into_row().expect("row");

        assert!(matches!(
            row.get(5),
            Err(DbError::ColumnIndexOutOfRange { index: 5, column_count: 5 })
        ));
        assert!(matches!(row.get(100), Err(DbError::ColumnIndexOutOfRange { .. })));
        assert!(matches!(row.get_by_name("nonexistent"), Err(DbError::ColumnNameNotFound(_))));
        assert!(matches!(row.get_by_name(""), Err(DbError::ColumnNameNotFound(_))));
        assert!(matches!(row.get_by_name("A"), Err(DbError::ColumnNameNotFound(_))));

        assert!(row.is_valid());
        assert!(cursor.is_alive());
        assert_eq!(row.get_by_name("a")?, Value::text("foo"));
        Ok(())
    }

    #[test]
    fn test_column_count_survives_close() -> DbResult<()> {
        let db = entries_db()?;
        let stmt = db.prepare("SELECT * FROM entries WHERE b = 1")?;
        let mut cursor = stmt.iterate_lazy(Params::None)?;
        let row = cursor.advance()?.into_row().expect("row");
        cursor.terminate()?;

        assert_eq!(row.column_count(), 5);
        assert_eq!(row.view().column_count(), 5);
        assert!(matches!(row.get(0), Err(DbError::InvalidRowAccess)));
        Ok(())
    }

    #[test]
    fn test_view_outlives_cursor() -> DbResult<()> {
        let db = entries_db()?;
        let stmt = db.prepare("SELECT * FROM entries")?;
        let mut cursor = stmt.iterate_lazy(Params::None)?;
        let row = cursor.advance()?.into_row().expect("row");
        drop(cursor);

        assert!(matches!(row.get(0), Err(DbError::InvalidRowAccess)));
        assert!(matches!(row.view().get(0), Err(DbError::InvalidRowAccess)));
        assert!(!stmt.is_busy());
        Ok(())
    }
}
