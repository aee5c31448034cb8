use std::collections::HashMap;
use std::os::raw::{c_char, c_int};

use rusqlite::ffi;

use crate::error::{DbError, DbResult};
use crate::query::Value;

use super::raw::RawStatement;

/// Parameters for a single execution of a statement.
#[derive(Debug, Clone, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(HashMap<String, Value>),
}

impl Params {
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(values.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(values) => values.is_empty(),
            Params::Named(values) => values.is_empty(),
        }
    }
}

/// Binds `params` to every parameter slot of `stmt`.
///
/// Anonymous `?` and numbered `?NNN` slots consume positional values in
/// order; `:name`, `@name` and `$name` slots are looked up without their
/// prefix. On failure the statement's bindings are cleared.
pub fn bind(stmt: &RawStatement, params: &Params) -> DbResult<()> {
    let result = bind_all(stmt, params);
    if result.is_err() {
        stmt.clear_bindings();
    }
    result
}

fn bind_all(stmt: &RawStatement, params: &Params) -> DbResult<()> {
    let (positional, named): (&[Value], Option<&HashMap<String, Value>>) = match params {
        Params::None => (&[], None),
        Params::Positional(values) => (values.as_slice(), None),
        Params::Named(values) => (&[], Some(values)),
    };

    let mut next_positional = 0;
    for slot in 1..=stmt.parameter_count() {
        match stmt.parameter_name(slot) {
            Some(name) if !name.starts_with('?') => {
                let key = &name[1..];
                let value = named
                    .and_then(|map| map.get(key))
                    .ok_or_else(|| DbError::Bind(format!("Missing named parameter \"{}\"", key)))?;
                bind_value(stmt, slot, value)?;
            }
            _ => {
                let value = positional.get(next_positional).ok_or_else(|| {
                    DbError::Bind("Too few parameter values were provided".to_string())
                })?;
                bind_value(stmt, slot, value)?;
                next_positional += 1;
            }
        }
    }

    if next_positional < positional.len() {
        return Err(DbError::Bind("Too many parameter values were provided".to_string()));
    }
    Ok(())
}

fn bind_value(stmt: &RawStatement, slot: usize, value: &Value) -> DbResult<()> {
    let raw = stmt.as_ptr();
    let col = slot as c_int;
    let rc = unsafe {
        match value {
            Value::Null => ffi::sqlite3_bind_null(raw, col),
            Value::Integer(i) => ffi::sqlite3_bind_int64(raw, col, *i),
            Value::Real(f) => ffi::sqlite3_bind_double(raw, col, *f),
            Value::Text(s) => {
                let len = c_int::try_from(s.len())
                    .map_err(|_| DbError::Bind(format!("Text parameter {} is too large", slot)))?;
                ffi::sqlite3_bind_text(
                    raw,
                    col,
                    s.as_ptr() as *const c_char,
                    len,
                    ffi::SQLITE_TRANSIENT(),
                )
            }
            Value::Blob(b) => {
                let len = c_int::try_from(b.len())
                    .map_err(|_| DbError::Bind(format!("Blob parameter {} is too large", slot)))?;
                ffi::sqlite3_bind_blob(raw, col, b.as_ptr() as *const _, len, ffi::SQLITE_TRANSIENT())
            }
        }
    };
    if rc != ffi::SQLITE_OK {
        return Err(stmt.last_error(rc));
    }
    Ok(())
}
