use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};

use rusqlite::ffi;

use crate::query::Value;

use super::raw::RawStatement;

/// Metric reported for one query loop by `sqlite3_stmt_scanstatus_v2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatusOp {
    /// Times the loop ran.
    Loops,
    /// Rows visited across all runs.
    Visits,
    /// Planner's estimate of rows per run.
    Estimate,
    /// Table or index the loop scans.
    Name,
    /// `EXPLAIN QUERY PLAN` text of the loop.
    Explain,
    SelectId,
    ParentId,
    Cycles,
}

impl ScanStatusOp {
    fn code(self) -> c_int {
        match self {
            ScanStatusOp::Loops => ffi::SQLITE_SCANSTAT_NLOOP,
            ScanStatusOp::Visits => ffi::SQLITE_SCANSTAT_NVISIT,
            ScanStatusOp::Estimate => ffi::SQLITE_SCANSTAT_EST,
            ScanStatusOp::Name => ffi::SQLITE_SCANSTAT_NAME,
            ScanStatusOp::Explain => ffi::SQLITE_SCANSTAT_EXPLAIN,
            ScanStatusOp::SelectId => ffi::SQLITE_SCANSTAT_SELECTID,
            ScanStatusOp::ParentId => ffi::SQLITE_SCANSTAT_PARENTID,
            ScanStatusOp::Cycles => ffi::SQLITE_SCANSTAT_NCYCLE,
        }
    }
}

/// Reads one metric of loop `index`. `None` when the statement has no such
/// loop. Counts are `Integer`, the estimate is `Real`, and names are `Text`
/// or `Null`.
pub(crate) fn read(stmt: &RawStatement, index: usize, op: ScanStatusOp, complex: bool) -> Option<Value> {
    let index = c_int::try_from(index).ok()?;
    let flags = if complex { ffi::SQLITE_SCANSTAT_COMPLEX } else { 0 };
    let ptr = stmt.as_ptr();

    match op {
        ScanStatusOp::Loops | ScanStatusOp::Visits | ScanStatusOp::Cycles => {
            let mut out: i64 = 0;
            let rc = unsafe {
                ffi::sqlite3_stmt_scanstatus_v2(ptr, index, op.code(), flags, &mut out as *mut i64 as *mut c_void)
            };
            (rc == 0).then_some(Value::Integer(out))
        }
        ScanStatusOp::SelectId | ScanStatusOp::ParentId => {
            let mut out: c_int = 0;
            let rc = unsafe {
                ffi::sqlite3_stmt_scanstatus_v2(ptr, index, op.code(), flags, &mut out as *mut c_int as *mut c_void)
            };
            (rc == 0).then_some(Value::Integer(out as i64))
        }
        ScanStatusOp::Estimate => {
            let mut out: f64 = 0.0;
            let rc = unsafe {
                ffi::sqlite3_stmt_scanstatus_v2(ptr, index, op.code(), flags, &mut out as *mut f64 as *mut c_void)
            };
            (rc == 0).then_some(Value::Real(out))
        }
        ScanStatusOp::Name | ScanStatusOp::Explain => {
            let mut out: *const c_char = std::ptr::null();
            let rc = unsafe {
                ffi::sqlite3_stmt_scanstatus_v2(
                    ptr,
                    index,
                    op.code(),
                    flags,
                    &mut out as *mut *const c_char as *mut c_void,
                )
            };
            if rc != 0 {
                return None;
            }
            if out.is_null() {
                return Some(Value::Null);
            }
            let text = unsafe { CStr::from_ptr(out) }.to_string_lossy().into_owned();
            Some(Value::Text(text))
        }
    }
}

pub(crate) fn reset(stmt: &RawStatement) {
    unsafe { ffi::sqlite3_stmt_scanstatus_reset(stmt.as_ptr()) }
}
