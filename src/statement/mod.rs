pub mod binder;
pub mod raw;
pub mod scan_status;
pub mod statement;

pub use binder::Params;
pub use scan_status::ScanStatusOp;
pub use statement::{ColumnInfo, RunResult, Statement};
pub(crate) use statement::StatementInner;
