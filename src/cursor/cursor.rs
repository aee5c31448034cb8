use std::cell::{Cell, OnceCell};
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::error::{DbError, DbResult};
use crate::query::{column_value, Value};
use crate::statement::raw::StepStatus;
use crate::statement::StatementInner;

use super::column_map::ColumnMap;
use super::row_view::{Row, RowView};

/// Outcome of one iteration call, shaped like an iterator-protocol record.
///
/// `done == true` always comes with `value == None`.
#[derive(Clone)]
pub struct IterResult {
    pub value: Option<Row>,
    pub done: bool,
}

impl IterResult {
    fn row(row: Row) -> Self {
        Self { value: Some(row), done: false }
    }

    fn done() -> Self {
        Self { value: None, done: true }
    }

    pub fn into_row(self) -> Option<Row> {
        self.value
    }
}

/// State shared between a cursor and its row view.
///
/// Only the cursor mutates `alive` and `generation`; the view reads them.
pub(crate) struct CursorState {
    stmt: Rc<StatementInner>,
    column_count: usize,
    safe_integers: bool,
    bound: bool,
    alive: Cell<bool>,
    logged: Cell<bool>,
    generation: Cell<u64>,
    column_map: OnceCell<ColumnMap>,
}

impl CursorState {
    /// Generation 0 never names a row: the view is unreadable until the first step.
    pub(crate) fn is_row_valid(&self, generation: u64) -> bool {
        self.alive.get() && generation != 0 && generation == self.generation.get()
    }

    pub(crate) fn column_count(&self) -> usize {
        self.column_count
    }

    pub(crate) fn column_index(&self, name: &str) -> Option<usize> {
        self.column_map
            .get_or_init(|| ColumnMap::build(&self.stmt.raw))
            .get(name)
    }

    /// Decodes column `index` of the current row. Validity and range checks
    /// are the caller's job.
    pub(crate) fn decode(&self, index: usize) -> Value {
        column_value(&self.stmt.raw, index, self.safe_integers)
    }
}

/// Drives one prepared statement a row at a time.
///
/// Every produced [`Row`] refers to the same [`RowView`]; advancing or closing
/// the cursor invalidates rows produced earlier.
pub struct Cursor {
    state: Rc<CursorState>,
    row: Rc<RowView>,
}

impl Cursor {
    /// Takes the statement's lock and registers with the connection. The
    /// caller has already checked that both are available.
    pub(crate) fn new(stmt: Rc<StatementInner>) -> Self {
        debug_assert!(!stmt.is_locked());
        let db_state = stmt.db.state();
        let logged = !db_state.has_trace();
        stmt.set_locked(true);
        db_state.add_iterator();

        let state = Rc::new(CursorState {
            column_count: stmt.raw.column_count(),
            safe_integers: stmt.safe_integers(),
            bound: stmt.is_bound(),
            alive: Cell::new(true),
            logged: Cell::new(logged),
            generation: Cell::new(0),
            column_map: OnceCell::new(),
            stmt,
        });
        debug!(
            "cursor opened ({} columns): {}",
            state.column_count,
            state.stmt.source()
        );
        let row = Rc::new(RowView::new(Rc::clone(&state)));
        Self { state, row }
    }

    /// Steps the statement once.
    ///
    /// Returns the row view stamped for the new row, or `done` once the
    /// statement is exhausted. A failed step closes the cursor before the
    /// error is returned. Calls on a closed cursor return `done`.
    pub fn advance(&mut self) -> DbResult<IterResult> {
        let db_state = self.state.stmt.db.state();
        db_state.require_not_busy()?;
        if !self.state.alive.get() {
            return Ok(IterResult::done());
        }

        let raw = &self.state.stmt.raw;
        let status = {
            let guard = db_state.enter();
            if !self.state.logged.replace(true) {
                if let Err(e) = db_state.trace(&raw.expanded_sql()) {
                    drop(guard);
                    self.cleanup();
                    return Err(e);
                }
            }
            raw.step()
        };

        match status {
            StepStatus::Row => {
                let generation = self.state.generation.get() + 1;
                self.state.generation.set(generation);
                self.row.stamp(generation);
                trace!("cursor produced row generation {}", generation);
                Ok(IterResult::row(Row::new(Rc::clone(&self.row), generation)))
            }
            StepStatus::Done => {
                self.cleanup();
                Ok(IterResult::done())
            }
            StepStatus::Error(code) => {
                let err = DbError::Step {
                    code,
                    message: raw.last_message(),
                    sql: self.state.stmt.source().to_string(),
                };
                warn!("cursor step failed: {}", err);
                self.cleanup();
                Err(err)
            }
        }
    }

    /// Stops iteration early. Idempotent once the cursor is closed.
    pub fn terminate(&mut self) -> DbResult<IterResult> {
        self.state.stmt.db.state().require_not_busy()?;
        if self.state.alive.get() {
            self.cleanup();
        }
        Ok(IterResult::done())
    }

    /// Column index for `name`, or `None` when no result column has that name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.state.column_index(name)
    }

    pub fn column_count(&self) -> usize {
        self.state.column_count
    }

    pub fn generation(&self) -> u64 {
        self.state.generation.get()
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive.get()
    }

    /// The single view every produced row refers to.
    pub fn row_view(&self) -> &Rc<RowView> {
        &self.row
    }

    fn cleanup(&self) {
        debug_assert!(self.state.alive.get());
        self.state.alive.set(false);

        let stmt = &self.state.stmt;
        stmt.set_locked(false);
        stmt.db.state().remove_iterator();
        stmt.raw.reset();
        if !self.state.bound {
            stmt.raw.clear_bindings();
        }
        debug!(
            "cursor closed after {} rows: {}",
            self.state.generation.get(),
            stmt.source()
        );
    }
}

impl Iterator for Cursor {
    type Item = DbResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(IterResult { value: Some(row), .. }) => Some(Ok(row)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if self.state.alive.get() {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::Params;
    use crate::utils::testing_utils::{entries_db, temp_db};

    #[test]
    fn test_advance_until_done() -> DbResult<()> {
        let db = entries_db()?;
        let stmt = db.prepare("SELECT b FROM entries ORDER BY rowid")?;
        let mut cursor = stmt.iterate_lazy(Params::None)?;
        assert_eq!(db.iterator_count(), 1);

        let mut count = 0;
        loop {
            let result = cursor.advance()?;
            if result.done {
                assert!(result.value.is_none());
                break;
            }
            count += 1;
            let row = result.value.expect("row");
            assert_eq!(row.get(0)?, Value::Integer(count));
            assert_eq!(cursor.generation(), count as u64);
        }
        assert_eq!(count, 10);
        assert!(!cursor.is_alive());
        assert!(!stmt.is_busy());
        assert_eq!(db.iterator_count(), 0);
        Ok(())
    }

    #[test]
    fn test_closed_cursor_is_idempotent() -> DbResult<()> {
        let db = entries_db()?;
        let stmt = db.prepare("SELECT * FROM entries")?;
        let mut cursor = stmt.iterate_lazy(Params::None)?;

        assert!(cursor.terminate()?.done);
        assert_eq!(db.iterator_count(), 0);
        assert!(cursor.terminate()?.done);
        assert!(cursor.advance()?.done);
        assert!(cursor.advance()?.value.is_none());
        assert_eq!(db.iterator_count(), 0);
        assert_eq!(cursor.generation(), 0);
        Ok(())
    }

    #[test]
    fn test_step_failure_closes_cursor() -> DbResult<()> {
        let db = temp_db()?;
        db.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2), (3);")?;
        // no ORDER BY: a sorter would evaluate every row before yielding the first
        let stmt =
            db.prepare("SELECT CASE WHEN x = 2 THEN abs(-9223372036854775808) ELSE x END FROM t")?;
        let mut cursor = stmt.iterate_lazy(Params::None)?;

        let row = cursor.advance()?.value.expect("first row");
        assert_eq!(row.get(0)?, Value::Integer(1));

        match cursor.advance() {
            Err(DbError::Step { message, sql, .. }) => {
                assert!(message.contains("integer overflow"));
                assert!(sql.starts_with("SELECT CASE"));
            }
            _ => panic!("expected a step failure"),
        }
        assert!(!cursor.is_alive());
        assert!(!stmt.is_busy());
        assert!(!db.is_busy());
        assert_eq!(db.iterator_count(), 0);
        assert!(matches!(row.get(0), Err(DbError::InvalidRowAccess)));
        assert!(cursor.advance()?.done);
        Ok(())
    }

    #[test]
    fn test_column_index_is_lazy_and_stable() -> DbResult<()> {
        let db = entries_db()?;
        let stmt = db.prepare("SELECT a, b, a FROM entries")?;
        let cursor = stmt.iterate_lazy(Params::None)?;

        assert_eq!(cursor.column_index("a"), Some(0));
        assert_eq!(cursor.column_index("b"), Some(1));
        assert_eq!(cursor.column_index("nonexistent"), None);
        assert!(cursor.is_alive());
        assert_eq!(cursor.generation(), 0);
        Ok(())
    }

    #[test]
    fn test_drop_releases_statement() -> DbResult<()> {
        let db = entries_db()?;
        let stmt = db.prepare("SELECT * FROM entries")?;
        {
            let mut cursor = stmt.iterate_lazy(Params::None)?;
            cursor.advance()?;
            assert!(stmt.is_busy());
        }
        assert!(!stmt.is_busy());
        assert_eq!(db.iterator_count(), 0);
        assert_eq!(stmt.iterate_lazy(Params::None)?.count(), 10);
        Ok(())
    }

    #[test]
    fn test_for_loop() -> DbResult<()> {
        let db = entries_db()?;
        let stmt = db.prepare("SELECT b FROM entries ORDER BY rowid")?;

        let mut total = 0;
        for row in stmt.iterate_lazy(Params::None)? {
            total += row?.get(0)?.as_integer().unwrap_or(0);
        }
        assert_eq!(total, 55);
        Ok(())
    }
}
