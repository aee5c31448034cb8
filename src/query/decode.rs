use std::os::raw::c_int;

use rusqlite::ffi;

use crate::query::Value;
use crate::statement::raw::RawStatement;

/// Largest integer a double represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Decodes column `index` of the row `stmt` is currently positioned on.
///
/// Without `safe_integers`, integers a double cannot hold exactly come back as
/// lossy `Value::Real`.
pub fn column_value(stmt: &RawStatement, index: usize, safe_integers: bool) -> Value {
    let raw = stmt.as_ptr();
    let col = index as c_int;
    unsafe {
        match ffi::sqlite3_column_type(raw, col) {
            ffi::SQLITE_INTEGER => {
                let value = ffi::sqlite3_column_int64(raw, col);
                if safe_integers || (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&value) {
                    Value::Integer(value)
                } else {
                    Value::Real(value as f64)
                }
            }
            ffi::SQLITE_FLOAT => Value::Real(ffi::sqlite3_column_double(raw, col)),
            ffi::SQLITE_TEXT => {
                // text pointer first, byte count second
                let p = ffi::sqlite3_column_text(raw, col);
                let len = ffi::sqlite3_column_bytes(raw, col).max(0) as usize;
                if p.is_null() || len == 0 {
                    Value::Text(String::new())
                } else {
                    let bytes = std::slice::from_raw_parts(p, len);
                    Value::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            }
            ffi::SQLITE_BLOB => {
                let p = ffi::sqlite3_column_blob(raw, col);
                let len = ffi::sqlite3_column_bytes(raw, col).max(0) as usize;
                if p.is_null() || len == 0 {
                    Value::Blob(Vec::new())
                } else {
                    Value::Blob(std::slice::from_raw_parts(p as *const u8, len).to_vec())
                }
            }
            _ => Value::Null,
        }
    }
}
