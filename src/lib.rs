pub mod connection;
pub mod cursor;
pub mod error;
pub mod query;
pub mod statement;

#[cfg(test)]
mod utils;

pub use crate::connection::{Config, Database};
pub use crate::cursor::{CachedRow, Cursor, IterResult, Row, RowView};
pub use crate::error::{DbError, DbResult};
pub use crate::query::Value;
pub use crate::statement::{ColumnInfo, Params, RunResult, ScanStatusOp, Statement};
