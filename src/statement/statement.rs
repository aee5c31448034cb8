use std::cell::Cell;
use std::rc::Rc;

use log::debug;
use rusqlite::ffi;

use crate::connection::Database;
use crate::cursor::Cursor;
use crate::error::{DbError, DbResult};
use crate::query::Value;

use super::binder::{self, Params};
use super::raw::{RawStatement, StepStatus};
use super::scan_status::{self, ScanStatusOp};

/// Column metadata reported by a prepared statement.
///
/// `column`, `table` and `database` are `None` for expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column: Option<String>,
    pub table: Option<String>,
    pub database: Option<String>,
    pub decl_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub changes: u64,
    pub last_insert_rowid: i64,
}

pub(crate) struct StatementInner {
    // dropped before `db` so the handle is finalized while the connection lives
    pub(crate) raw: RawStatement,
    pub(crate) db: Database,
    source: String,
    reader: bool,
    locked: Cell<bool>,
    bound: Cell<bool>,
    safe_integers: Cell<bool>,
}

impl StatementInner {
    pub(crate) fn is_locked(&self) -> bool {
        self.locked.get()
    }

    pub(crate) fn set_locked(&self, locked: bool) {
        self.locked.set(locked);
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.bound.get()
    }

    pub(crate) fn safe_integers(&self) -> bool {
        self.safe_integers.get()
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }
}

/// A prepared statement.
///
/// Cloning yields another handle to the same compiled statement; a cursor
/// keeps one of these for as long as it is live.
#[derive(Clone)]
pub struct Statement {
    inner: Rc<StatementInner>,
}

impl Statement {
    pub(crate) fn prepare(db: Database, sql: &str) -> DbResult<Self> {
        let (raw, has_tail) = unsafe { RawStatement::prepare(db.raw_handle(), sql)? };
        if has_tail {
            return Err(DbError::Engine {
                code: ffi::SQLITE_MISUSE,
                message: "The supplied SQL string contains more than one statement".to_string(),
            });
        }

        let reader = raw.column_count() > 0;
        let safe_integers = db.state().safe_integers();
        Ok(Self {
            inner: Rc::new(StatementInner {
                raw,
                db,
                source: sql.to_string(),
                reader,
                locked: Cell::new(false),
                bound: Cell::new(false),
                safe_integers: Cell::new(safe_integers),
            }),
        })
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Whether the statement returns rows.
    pub fn is_reader(&self) -> bool {
        self.inner.reader
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.raw.readonly()
    }

    /// Whether a live cursor currently holds the statement.
    pub fn is_busy(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.is_bound()
    }

    pub fn column_count(&self) -> usize {
        self.inner.raw.column_count()
    }

    pub fn columns(&self) -> Vec<ColumnInfo> {
        let raw = &self.inner.raw;
        (0..raw.column_count())
            .map(|i| ColumnInfo {
                name: raw.column_name(i).unwrap_or_default().to_string(),
                column: raw.column_origin_name(i).map(str::to_string),
                table: raw.column_table_name(i).map(str::to_string),
                database: raw.column_database_name(i).map(str::to_string),
                decl_type: raw.column_decltype(i).map(str::to_string),
            })
            .collect()
    }

    /// Runtime statistics for query loop `index`, or `None` past the last loop.
    ///
    /// With `complex` set, loops that are not plain table or index scans
    /// (sorters, subqueries) are counted too.
    pub fn scan_status(&self, index: usize, op: ScanStatusOp, complex: bool) -> Option<Value> {
        scan_status::read(&self.inner.raw, index, op, complex)
    }

    /// Zeroes the counters behind [`scan_status`](Self::scan_status).
    pub fn scan_status_reset(&self) -> &Self {
        scan_status::reset(&self.inner.raw);
        self
    }

    /// Sets the integer decoding policy used by cursors opened from now on.
    pub fn safe_integers(&self, safe_integers: bool) -> DbResult<&Self> {
        self.require_not_locked()?;
        self.inner.safe_integers.set(safe_integers);
        Ok(self)
    }

    /// Binds parameters permanently. Only allowed once per statement.
    pub fn bind(&self, params: Params) -> DbResult<&Self> {
        self.require_not_locked()?;
        if self.inner.is_bound() {
            return Err(DbError::Bind(
                "The bind() method can only be invoked once per statement object".to_string(),
            ));
        }
        binder::bind(&self.inner.raw, &params)?;
        self.inner.bound.set(true);
        Ok(self)
    }

    /// Opens a lazy cursor over the statement's rows.
    pub fn iterate_lazy(&self, params: Params) -> DbResult<Cursor> {
        if !self.inner.reader {
            return Err(DbError::refused(
                "This statement does not return data. Use run() instead",
            ));
        }
        let state = self.inner.db.state();
        state.require_not_busy()?;
        if self.inner.is_locked() {
            return Err(DbError::refused("This statement is busy executing a query"));
        }
        if !state.has_iterator_room() {
            return Err(DbError::refused("Too many active database iterators"));
        }
        self.bind_for_execution(&params)
            .map_err(|e| DbError::refused(e.to_string()))?;

        Ok(Cursor::new(Rc::clone(&self.inner)))
    }

    /// Executes the statement to completion and reports what it changed.
    pub fn run(&self, params: Params) -> DbResult<RunResult> {
        let state = self.inner.db.state();
        state.require_not_busy()?;
        self.require_not_locked()?;
        state.require_no_iterators()?;
        self.bind_for_execution(&params)?;

        let raw = &self.inner.raw;
        let result = {
            let _guard = state.enter();
            state.trace(&raw.expanded_sql()).and_then(|_| loop {
                match raw.step() {
                    StepStatus::Row => continue,
                    StepStatus::Done => break Ok(()),
                    StepStatus::Error(code) => {
                        break Err(DbError::Step {
                            code,
                            message: raw.last_message(),
                            sql: self.inner.source.clone(),
                        });
                    }
                }
            })
        };
        let run_result = result.map(|_| unsafe {
            let db = raw.db_handle();
            RunResult {
                changes: ffi::sqlite3_changes(db).max(0) as u64,
                last_insert_rowid: ffi::sqlite3_last_insert_rowid(db),
            }
        });

        raw.reset();
        if !self.inner.is_bound() {
            raw.clear_bindings();
        }
        debug!("ran statement: {}", self.inner.source);
        run_result
    }

    fn require_not_locked(&self) -> DbResult<()> {
        if self.inner.is_locked() {
            return Err(DbError::Busy);
        }
        Ok(())
    }

    fn bind_for_execution(&self, params: &Params) -> DbResult<()> {
        if self.inner.is_bound() {
            if !params.is_empty() {
                return Err(DbError::Bind(
                    "This statement already has bound parameters".to_string(),
                ));
            }
            return Ok(());
        }
        binder::bind(&self.inner.raw, params)
    }
}
