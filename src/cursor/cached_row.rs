use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{DbError, DbResult};
use crate::query::Value;

use super::row_view::RowView;

struct Memo {
    generation: u64,
    values: Vec<Option<Value>>,
}

/// Memoizes decoded values of the current row.
///
/// Repeated reads of one column within a generation decode once. The memo is
/// dropped as soon as the view moves to another generation, and nothing is
/// served once the view is no longer valid.
pub struct CachedRow {
    view: Rc<RowView>,
    memo: RefCell<Memo>,
}

impl CachedRow {
    pub fn new(view: Rc<RowView>) -> Self {
        let column_count = view.column_count();
        Self {
            view,
            memo: RefCell::new(Memo {
                generation: 0,
                values: vec![None; column_count],
            }),
        }
    }

    pub fn get(&self, index: usize) -> DbResult<Value> {
        let generation = self.view.generation();
        if !self.view.is_valid(generation) {
            return Err(DbError::InvalidRowAccess);
        }

        let mut memo = self.memo.borrow_mut();
        if memo.generation != generation {
            memo.generation = generation;
            memo.values.iter_mut().for_each(|v| *v = None);
        }
        if let Some(Some(value)) = memo.values.get(index) {
            return Ok(value.clone());
        }

        let value = self.view.get(index)?;
        memo.values[index] = Some(value.clone());
        Ok(value)
    }

    pub fn get_by_name(&self, name: &str) -> DbResult<Value> {
        if !self.view.is_valid(self.view.generation()) {
            return Err(DbError::InvalidRowAccess);
        }
        let index = self
            .view
            .column_index(name)
            .ok_or_else(|| DbError::ColumnNameNotFound(name.to_string()))?;
        self.get(index)
    }

    pub fn column_count(&self) -> usize {
        self.view.column_count()
    }

    pub fn cached_len(&self) -> usize {
        self.memo.borrow().values.iter().filter(|v| v.is_some()).count()
    }
}
