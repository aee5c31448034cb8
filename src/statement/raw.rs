use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr::NonNull;

use rusqlite::ffi;

use crate::error::{DbError, DbResult};

/// Result of a single `sqlite3_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Row,
    Done,
    Error(i32),
}

/// Owning wrapper around a prepared `sqlite3_stmt`.
///
/// The handle is finalized on drop. Every other method leaves it usable:
/// `reset` only rewinds execution so the same handle can run again.
pub struct RawStatement {
    ptr: NonNull<ffi::sqlite3_stmt>,
}

impl RawStatement {
    /// Compiles the first statement in `sql`. Returns the statement and whether
    /// any non-blank SQL follows it.
    ///
    /// # Safety
    ///
    /// `db` must be a valid, open connection handle that outlives the returned
    /// statement.
    pub unsafe fn prepare(db: *mut ffi::sqlite3, sql: &str) -> DbResult<(RawStatement, bool)> {
        let len = c_int::try_from(sql.len())
            .map_err(|_| DbError::Bind("SQL string is too long".to_string()))?;
        let csql = CString::new(sql)
            .map_err(|_| DbError::Bind("SQL string contains NUL".to_string()))?;

        let mut stmt: *mut ffi::sqlite3_stmt = std::ptr::null_mut();
        let mut tail: *const c_char = std::ptr::null();
        let rc = unsafe { ffi::sqlite3_prepare_v2(db, csql.as_ptr(), len, &mut stmt, &mut tail) };
        if rc != ffi::SQLITE_OK {
            return Err(unsafe { engine_error(db, rc) });
        }

        let ptr = NonNull::new(stmt).ok_or_else(|| DbError::Engine {
            code: ffi::SQLITE_MISUSE,
            message: "The supplied SQL string contains no statements".to_string(),
        })?;

        let consumed = if tail.is_null() {
            sql.len()
        } else {
            (tail as usize).saturating_sub(csql.as_ptr() as usize)
        };
        let has_tail = sql.get(consumed..).map(|rest| !is_blank_tail(rest)).unwrap_or(false);

        Ok((RawStatement { ptr }, has_tail))
    }

    pub fn as_ptr(&self) -> *mut ffi::sqlite3_stmt {
        self.ptr.as_ptr()
    }

    pub fn step(&self) -> StepStatus {
        match unsafe { ffi::sqlite3_step(self.ptr.as_ptr()) } {
            ffi::SQLITE_ROW => StepStatus::Row,
            ffi::SQLITE_DONE => StepStatus::Done,
            code => StepStatus::Error(code),
        }
    }

    pub fn reset(&self) {
        unsafe {
            ffi::sqlite3_reset(self.ptr.as_ptr());
        }
    }

    pub fn clear_bindings(&self) {
        unsafe {
            ffi::sqlite3_clear_bindings(self.ptr.as_ptr());
        }
    }

    pub fn column_count(&self) -> usize {
        let n = unsafe { ffi::sqlite3_column_count(self.ptr.as_ptr()) };
        n.max(0) as usize
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        let p = unsafe { ffi::sqlite3_column_name(self.ptr.as_ptr(), index as c_int) };
        unsafe { str_from_ptr(p) }
    }

    pub fn column_decltype(&self, index: usize) -> Option<&str> {
        let p = unsafe { ffi::sqlite3_column_decltype(self.ptr.as_ptr(), index as c_int) };
        unsafe { str_from_ptr(p) }
    }

    /// Table column a result column is drawn from, if it is a plain column reference.
    pub fn column_origin_name(&self, index: usize) -> Option<&str> {
        let p = unsafe { ffi::sqlite3_column_origin_name(self.ptr.as_ptr(), index as c_int) };
        unsafe { str_from_ptr(p) }
    }

    pub fn column_table_name(&self, index: usize) -> Option<&str> {
        let p = unsafe { ffi::sqlite3_column_table_name(self.ptr.as_ptr(), index as c_int) };
        unsafe { str_from_ptr(p) }
    }

    pub fn column_database_name(&self, index: usize) -> Option<&str> {
        let p = unsafe { ffi::sqlite3_column_database_name(self.ptr.as_ptr(), index as c_int) };
        unsafe { str_from_ptr(p) }
    }

    pub fn parameter_count(&self) -> usize {
        let n = unsafe { ffi::sqlite3_bind_parameter_count(self.ptr.as_ptr()) };
        n.max(0) as usize
    }

    /// Name of the 1-based parameter slot, including its prefix (`:`, `@`, `$`,
    /// or `?` for numbered slots). `None` for anonymous `?` slots.
    pub fn parameter_name(&self, slot: usize) -> Option<&str> {
        let p = unsafe { ffi::sqlite3_bind_parameter_name(self.ptr.as_ptr(), slot as c_int) };
        unsafe { str_from_ptr(p) }
    }

    pub fn readonly(&self) -> bool {
        unsafe { ffi::sqlite3_stmt_readonly(self.ptr.as_ptr()) != 0 }
    }

    pub fn sql(&self) -> String {
        let p = unsafe { ffi::sqlite3_sql(self.ptr.as_ptr()) };
        unsafe { str_from_ptr(p) }.unwrap_or_default().to_string()
    }

    /// SQL text with the currently bound parameters substituted.
    pub fn expanded_sql(&self) -> String {
        let p = unsafe { ffi::sqlite3_expanded_sql(self.ptr.as_ptr()) };
        if p.is_null() {
            return self.sql();
        }
        let s = unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned();
        unsafe { ffi::sqlite3_free(p as *mut _) };
        s
    }

    pub fn db_handle(&self) -> *mut ffi::sqlite3 {
        unsafe { ffi::sqlite3_db_handle(self.ptr.as_ptr()) }
    }

    /// Builds the error for a failed call on this statement's connection.
    pub fn last_error(&self, code: i32) -> DbError {
        unsafe { engine_error(self.db_handle(), code) }
    }

    /// Error message currently reported by the owning connection.
    pub fn last_message(&self) -> String {
        unsafe { errmsg(self.db_handle()) }
    }
}

impl Drop for RawStatement {
    fn drop(&mut self) {
        unsafe {
            ffi::sqlite3_finalize(self.ptr.as_ptr());
        }
    }
}

/// Whether `rest` holds nothing but whitespace, semicolons and comments.
fn is_blank_tail(rest: &str) -> bool {
    let mut rest = rest;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        if let Some(comment) = rest.strip_prefix("--") {
            match comment.find('\n') {
                Some(end) => rest = &comment[end + 1..],
                None => return true,
            }
        } else if let Some(comment) = rest.strip_prefix("/*") {
            match comment.find("*/") {
                Some(end) => rest = &comment[end + 2..],
                // sqlite also treats an unterminated block comment as blank
                None => return true,
            }
        } else {
            return rest.is_empty();
        }
    }
}

unsafe fn str_from_ptr<'a>(p: *const c_char) -> Option<&'a str> {
    if p.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(p) }.to_str().ok()
}

unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    if db.is_null() {
        return String::new();
    }
    let p = unsafe { ffi::sqlite3_errmsg(db) };
    if p.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
}

pub(crate) unsafe fn engine_error(db: *mut ffi::sqlite3, code: i32) -> DbError {
    let code = if db.is_null() {
        code
    } else {
        unsafe { ffi::sqlite3_extended_errcode(db) }
    };
    DbError::Engine {
        code,
        message: unsafe { errmsg(db) },
    }
}
