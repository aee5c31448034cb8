pub mod cached_row;
pub mod column_map;
pub mod cursor;
pub mod row_view;

pub use cached_row::CachedRow;
pub use column_map::ColumnMap;
pub use cursor::{Cursor, IterResult};
pub use row_view::{Row, RowView};
